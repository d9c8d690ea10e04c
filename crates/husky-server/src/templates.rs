//! Server-side HTML rendering.
//!
//! Pages are assembled with `format!` around a shared layout. Every value
//! that originates from a user or the database goes through [`escape_html`]
//! before it is interpolated.

use chrono::{DateTime, Utc};
use husky_types::{error_for, FieldError, Flash, Page, Post, User};

/// Characters of post body shown on the index page.
const EXCERPT_CHARS: usize = 200;

/// Per-request values every page needs.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub site_title: &'a str,
    pub user: Option<&'a User>,
    pub csrf_token: &'a str,
    pub flash: Option<&'a Flash>,
}

/// Escapes text for safe inclusion in HTML bodies and quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders a timestamp the way the post list and detail pages show it.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%B %-d, %Y %H:%M UTC").to_string()
}

fn csrf_field(csrf_token: &str) -> String {
    format!(
        r#"<input type="hidden" name="csrf_token" value="{}">"#,
        escape_html(csrf_token)
    )
}

fn nav(ctx: &PageContext) -> String {
    match ctx.user {
        Some(user) => format!(
            r#"<a href="/blog/post/new">New Post</a>
<span class="user">{name}</span>
<form class="inline" method="post" action="/auth/logout">{csrf}<button type="submit">Logout</button></form>"#,
            name = escape_html(&user.name),
            csrf = csrf_field(ctx.csrf_token),
        ),
        None => r#"<a href="/auth/login">Login</a> <a href="/auth/register">Register</a>"#
            .to_string(),
    }
}

/// Wraps page content in the site layout.
pub fn layout(ctx: &PageContext, title: &str, content: &str) -> String {
    let flash = ctx
        .flash
        .map(|f| {
            format!(
                r#"<div class="alert alert-{}">{}</div>"#,
                f.kind.as_str(),
                escape_html(&f.message)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="csrf-token" content="{csrf}">
<title>{title} - {site}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<header><a class="brand" href="/blog/">{site}</a><nav>{nav}</nav></header>
<main>
{flash}
{content}
</main>
<footer><small>&copy; {year} {site}</small></footer>
</body>
</html>
"#,
        csrf = escape_html(ctx.csrf_token),
        title = escape_html(title),
        site = escape_html(ctx.site_title),
        nav = nav(ctx),
        year = Utc::now().format("%Y"),
    )
}

/// Splits a body on blank lines into escaped `<p>` blocks.
fn paragraphs(body: &str) -> String {
    body.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn excerpt(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

fn byline(post: &Post) -> String {
    format!(
        r#"<small class="byline">{} &middot; <time datetime="{}">{}</time></small>"#,
        escape_html(post.author_name.as_deref().unwrap_or("Anonymous")),
        post.timestamp.to_rfc3339(),
        format_timestamp(&post.timestamp),
    )
}

fn pagination<T>(page: &Page<T>) -> String {
    let prev = if page.has_prev() {
        format!(
            r#"<a rel="prev" href="/blog/?page={}">&larr; Newer</a> "#,
            page.page - 1
        )
    } else {
        String::new()
    };
    let next = if page.has_next() {
        format!(
            r#" <a rel="next" href="/blog/?page={}">Older &rarr;</a>"#,
            page.page + 1
        )
    } else {
        String::new()
    };
    format!(
        r#"<nav class="pagination">{prev}<span>Page {} of {}</span>{next}</nav>"#,
        page.page,
        page.pages()
    )
}

/// The paginated post list.
pub fn index_page(ctx: &PageContext, page: &Page<Post>) -> String {
    let mut content = String::from("<h1>Posts</h1>\n");

    if page.items.is_empty() {
        content.push_str(r#"<p class="empty">No posts yet.</p>"#);
    }
    for post in &page.items {
        content.push_str(&format!(
            r#"<article class="post">
<h2><a href="/blog/post/{id}">{title}</a></h2>
{byline}
<p>{excerpt}</p>
</article>
"#,
            id = post.id,
            title = escape_html(&post.title),
            byline = byline(post),
            excerpt = escape_html(&excerpt(&post.body)),
        ));
    }

    if page.pages() > 1 {
        content.push_str(&pagination(page));
    }

    layout(ctx, "Blog", &content)
}

/// A single post. `can_delete` adds the delete button for the author.
pub fn post_page(ctx: &PageContext, post: &Post, can_delete: bool) -> String {
    let delete = if can_delete {
        format!(
            r#"<form method="post" action="/blog/post/{id}/delete">{csrf}<button type="submit" class="danger">Delete</button></form>"#,
            id = post.id,
            csrf = csrf_field(ctx.csrf_token),
        )
    } else {
        String::new()
    };

    let content = format!(
        r#"<article class="post">
<h1>{title}</h1>
{byline}
{body}
</article>
{delete}
<p><a href="/blog/">&larr; Back to posts</a></p>"#,
        title = escape_html(&post.title),
        byline = byline(post),
        body = paragraphs(&post.body),
    );

    layout(ctx, &post.title, &content)
}

fn field_error(errors: &[FieldError], field: &str) -> String {
    error_for(errors, field)
        .map(|msg| format!(r#"<div class="field-error">{}</div>"#, escape_html(msg)))
        .unwrap_or_default()
}

/// Values echoed back into the new-post form after a failed submission.
#[derive(Debug, Clone, Default)]
pub struct PostFormValues<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

/// The new-post form.
pub fn new_post_page(ctx: &PageContext, values: &PostFormValues, errors: &[FieldError]) -> String {
    let content = format!(
        r#"<h1>New Post</h1>
<form method="post" action="/blog/post/new">
{csrf}
<label for="title">Title</label>
<input id="title" name="title" type="text" maxlength="{max_title}" value="{title}" required>
{title_error}
<label for="body">Body</label>
<textarea id="body" name="body" rows="12" required>{body}</textarea>
{body_error}
<button type="submit">Publish</button>
</form>"#,
        csrf = csrf_field(ctx.csrf_token),
        max_title = husky_types::MAX_TITLE_LEN,
        title = escape_html(values.title),
        title_error = field_error(errors, "title"),
        body = escape_html(values.body),
        body_error = field_error(errors, "body"),
    );
    layout(ctx, "New Post", &content)
}

/// The login form. `next` is carried through a hidden field.
pub fn login_page(
    ctx: &PageContext,
    username: &str,
    remember: bool,
    next: Option<&str>,
    error: Option<&str>,
) -> String {
    let error = error
        .map(|msg| format!(r#"<div class="form-error">{}</div>"#, escape_html(msg)))
        .unwrap_or_default();
    let next = next
        .map(|n| format!(r#"<input type="hidden" name="next" value="{}">"#, escape_html(n)))
        .unwrap_or_default();

    let content = format!(
        r#"<h1>Login</h1>
{error}
<form method="post" action="/auth/login">
{csrf}
{next}
<label for="username">Username</label>
<input id="username" name="username" type="text" value="{username}" required>
<label for="password">Password</label>
<input id="password" name="password" type="password" required>
<label><input name="remember" type="checkbox" value="y"{checked}> Remember me</label>
<button type="submit">Log in</button>
</form>
<p>New here? <a href="/auth/register">Register</a></p>"#,
        csrf = csrf_field(ctx.csrf_token),
        username = escape_html(username),
        checked = if remember { " checked" } else { "" },
    );
    layout(ctx, "Login", &content)
}

/// Values echoed back into the registration form. Passwords are never
/// echoed.
#[derive(Debug, Clone, Default)]
pub struct RegisterFormValues<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub name: &'a str,
}

/// The registration form.
pub fn register_page(
    ctx: &PageContext,
    values: &RegisterFormValues,
    errors: &[FieldError],
) -> String {
    let content = format!(
        r#"<h1>Register</h1>
<form method="post" action="/auth/register">
{csrf}
<label for="username">Username</label>
<input id="username" name="username" type="text" value="{username}" required>
{username_error}
<label for="email">Email</label>
<input id="email" name="email" type="email" value="{email}" required>
{email_error}
<label for="name">Name</label>
<input id="name" name="name" type="text" value="{name}" required>
{name_error}
<label for="password">Password</label>
<input id="password" name="password" type="password" required>
{password_error}
<label for="password2">Confirm password</label>
<input id="password2" name="password2" type="password" required>
{password2_error}
<button type="submit">Register</button>
</form>
<p>Already registered? <a href="/auth/login">Log in</a></p>"#,
        csrf = csrf_field(ctx.csrf_token),
        username = escape_html(values.username),
        username_error = field_error(errors, "username"),
        email = escape_html(values.email),
        email_error = field_error(errors, "email"),
        name = escape_html(values.name),
        name_error = field_error(errors, "name"),
        password_error = field_error(errors, "password"),
        password2_error = field_error(errors, "password2"),
    );
    layout(ctx, "Register", &content)
}

/// A standalone error page. Rendered without session data so it works even
/// when the session layer itself failed.
pub fn error_page(code: u16, heading: &str, description: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{code} {heading}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<main class="error">
<h1>{code} {heading}</h1>
<p>{description}</p>
<p><a href="/blog/">Go back home</a></p>
</main>
</body>
</html>
"#,
        heading = escape_html(heading),
        description = escape_html(description),
    )
}
