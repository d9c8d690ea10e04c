//! Blog pages, mounted under `/blog`.

use axum::{
    extract::{
        rejection::{FormRejection, PathRejection, QueryRejection},
        Extension, Form, Path, Query,
    },
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use husky_auth::set_flash;
use husky_blog::{create_post, delete_post, get_post, list_posts, BlogError, NewPost};
use husky_types::{Flash, FlashKind};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::{CurrentUser, SessionContext},
    templates::{self, PostFormValues},
    AppState,
};

/// Routes for the blog section.
pub fn routes() -> Router {
    Router::new()
        .route("/blog", get(|| async { Redirect::permanent("/blog/") }))
        .route("/blog/", get(index))
        .route("/blog/post/new", get(new_post_form).post(new_post))
        .route("/blog/post/{id}", get(show_post))
        .route("/blog/post/{id}/delete", post(remove_post))
}

/// Query string for the index page.
#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    /// Kept as text so a malformed value falls back to the first page.
    pub page: Option<String>,
}

/// Form body for `POST /blog/post/new`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub body: String,
}

fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1)
}

/// Handler for `GET /blog/`.
pub async fn index(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    query: Result<Query<IndexQuery>, QueryRejection>,
) -> Result<Html<String>, AppError> {
    let page = parse_page(query.ok().and_then(|Query(q)| q.page).as_deref());
    let per_page = state.posts_per_page;

    let posts = state
        .with_conn(move |conn| Ok(list_posts(conn, page, per_page)?))
        .await?;

    if posts.is_out_of_range() {
        return Err(AppError::NotFound);
    }

    Ok(Html(templates::index_page(&ctx.page(&state), &posts)))
}

/// Handler for `GET /blog/post/{id}`.
pub async fn show_post(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Html<String>, AppError> {
    let Path(id) = id.map_err(|_| AppError::NotFound)?;

    let post = state.with_conn(move |conn| Ok(get_post(conn, id)?)).await?;

    let can_delete = match (&ctx.user, post.author_id) {
        (Some(user), Some(author)) => user.id == author,
        _ => false,
    };
    Ok(Html(templates::post_page(&ctx.page(&state), &post, can_delete)))
}

/// Handler for `GET /blog/post/new`.
pub async fn new_post_form(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    CurrentUser(_user): CurrentUser,
) -> Html<String> {
    Html(templates::new_post_page(
        &ctx.page(&state),
        &PostFormValues::default(),
        &[],
    ))
}

/// Handler for `POST /blog/post/new`.
pub async fn new_post(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    CurrentUser(user): CurrentUser,
    form: Result<Form<PostForm>, FormRejection>,
) -> Result<Response, AppError> {
    let Form(form) = form.map_err(|e| AppError::BadRequest(e.to_string()))?;

    let new = NewPost {
        title: form.title.clone(),
        body: form.body.clone(),
    };
    let token_hash = ctx.token_hash.clone();

    let outcome = state
        .with_conn(move |conn| match create_post(conn, user.id, &new) {
            Ok(post) => {
                set_flash(
                    conn,
                    &token_hash,
                    &Flash::new(FlashKind::Success, "Post created."),
                )?;
                Ok(Ok(post.id))
            }
            Err(BlogError::Validation(errors)) => Ok(Err(errors)),
            Err(e) => Err(AppError::from(e)),
        })
        .await?;

    match outcome {
        Ok(id) => Ok(Redirect::to(&format!("/blog/post/{id}")).into_response()),
        Err(errors) => {
            let values = PostFormValues {
                title: &form.title,
                body: &form.body,
            };
            Ok(Html(templates::new_post_page(&ctx.page(&state), &values, &errors)).into_response())
        }
    }
}

/// Handler for `POST /blog/post/{id}/delete`. Only the author may delete.
pub async fn remove_post(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Redirect, AppError> {
    let Path(id) = id.map_err(|_| AppError::NotFound)?;
    let token_hash = ctx.token_hash.clone();

    state
        .with_conn(move |conn| {
            delete_post(conn, id, user.id)?;
            set_flash(
                conn,
                &token_hash,
                &Flash::new(FlashKind::Info, "Post deleted."),
            )?;
            Ok(())
        })
        .await?;

    Ok(Redirect::to("/blog/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_parameter_falls_back_to_first_page() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("3")), 3);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-2")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
    }
}
