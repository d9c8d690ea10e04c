//! Fake post generation for `husky forge`.

use chrono::{Duration, Utc};
use husky_types::MAX_TITLE_LEN;
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;

use crate::posts::insert_post;
use crate::BlogError;

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip", "ex", "ea", "commodo", "consequat", "duis", "aute", "irure", "in",
    "reprehenderit", "voluptate", "velit", "esse", "cillum", "fugiat", "nulla", "pariatur",
    "excepteur", "sint", "occaecat", "cupidatat", "non", "proident", "sunt", "culpa", "qui",
    "officia", "deserunt", "mollit", "anim", "id", "est", "laborum",
];

/// How far back generated timestamps may reach.
const MAX_AGE_DAYS: i64 = 365;

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A capitalized sentence of `min..=max` words, without trailing punctuation.
fn words<R: Rng>(rng: &mut R, min: usize, max: usize) -> String {
    let count = rng.gen_range(min..=max);
    let picked: Vec<&str> = (0..count)
        .filter_map(|_| WORDS.choose(rng).copied())
        .collect();
    capitalize(&picked.join(" "))
}

/// A fake post title, trimmed to whole words within the title limit.
pub fn fake_title<R: Rng>(rng: &mut R) -> String {
    let mut title = String::new();
    for word in words(rng, 3, 7).split(' ') {
        let extra = if title.is_empty() { 0 } else { 1 };
        if title.len() + extra + word.len() > MAX_TITLE_LEN {
            break;
        }
        if extra == 1 {
            title.push(' ');
        }
        title.push_str(word);
    }
    title
}

/// A fake post body: several paragraphs separated by blank lines.
pub fn fake_body<R: Rng>(rng: &mut R) -> String {
    let paragraphs = rng.gen_range(2..=5);
    (0..paragraphs)
        .map(|_| {
            let sentences = rng.gen_range(3..=6);
            (0..sentences)
                .map(|_| format!("{}.", words(rng, 6, 14)))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Inserts `count` anonymous fake posts with timestamps scattered over the
/// past year, inside a single transaction.
pub fn fake_posts(conn: &Connection, count: u32) -> Result<u32, BlogError> {
    fake_posts_with(conn, count, &mut rand::thread_rng())
}

/// [`fake_posts`] with a caller-supplied random source.
pub fn fake_posts_with<R: Rng>(conn: &Connection, count: u32, rng: &mut R) -> Result<u32, BlogError> {
    let now = Utc::now();
    let tx = conn.unchecked_transaction()?;
    for _ in 0..count {
        let age = Duration::seconds(rng.gen_range(0..MAX_AGE_DAYS * 24 * 60 * 60));
        insert_post(&tx, &fake_title(rng), &fake_body(rng), now - age, None)?;
    }
    tx.commit()?;
    tracing::info!(count, "generated fake posts");
    Ok(count)
}
