//! URL slug normalization and collision-free allocation.
//!
//! [`allocate`] checks existence through a caller-supplied lookup, so the
//! same algorithm runs against PostgreSQL, the in-memory store, or a test
//! double. The check is read-then-write: two requests allocating the same
//! slug at once can both see it free. The posts table's unique constraint
//! turns the loser into a conflict the post service retries.

use std::future::Future;

use thiserror::Error;

/// Suffixed candidates tried after a collision before giving up.
pub const MAX_SLUG_PROBES: u32 = 1000;

/// Maximum slug length in bytes.
const MAX_SLUG_LEN: usize = 128;

/// Used when a candidate contains nothing URL-safe.
const FALLBACK_SLUG: &str = "post";

/// Slug allocation errors.
#[derive(Debug, Error)]
pub enum SlugError {
    #[error("no free slug for \"{0}\" after {MAX_SLUG_PROBES} attempts")]
    Exhausted(String),

    #[error("failed to check slug availability")]
    Lookup(#[source] anyhow::Error),
}

/// Normalize text into a URL-safe slug.
///
/// Lowercases, maps every non-ASCII-alphanumeric character to `-`,
/// collapses runs of separators and trims them from both ends. Long slugs
/// are cut back to the last separator within [`MAX_SLUG_LEN`].
pub fn slugify(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_hyphen = true; // skips leading separators
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            prev_was_hyphen = false;
        } else if !prev_was_hyphen {
            result.push('-');
            prev_was_hyphen = true;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    if result.len() > MAX_SLUG_LEN {
        // ASCII only, so any byte index is a char boundary
        let truncated = &result[..MAX_SLUG_LEN];
        let cut = match truncated.rfind('-') {
            Some(i) if i > 0 => &truncated[..i],
            _ => truncated,
        };
        return cut.trim_end_matches('-').to_string();
    }

    result
}

/// [`slugify`], falling back to `post` when nothing URL-safe is left.
pub fn normalize(text: &str) -> String {
    let slug = slugify(text);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Split a trailing `-<integer>` off a slug.
///
/// Returns the base and the number when the last segment is numeric and
/// something precedes it.
fn split_numeric_suffix(slug: &str) -> Option<(&str, u32)> {
    let (base, last) = slug.rsplit_once('-')?;
    if base.is_empty() {
        return None;
    }
    let number = last.parse::<u32>().ok()?;
    Some((base, number))
}

/// Normalize `candidate` and find a slug for which `exists` reports false.
///
/// A free normalized slug is returned untouched. On collision, a trailing
/// numeric segment resumes counting after that number (`post-5` probes
/// `post-6` first, `best-of-2024` probes `best-of-2025`); otherwise probing
/// starts at `-2`. Fails with [`SlugError::Exhausted`] after
/// [`MAX_SLUG_PROBES`] suffixed candidates are taken.
pub async fn allocate<F, Fut>(candidate: &str, mut exists: F) -> Result<String, SlugError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let slug = normalize(candidate);

    if !exists(slug.clone()).await.map_err(SlugError::Lookup)? {
        return Ok(slug);
    }

    let (base, start) = match split_numeric_suffix(&slug) {
        Some((base, n)) => (base.to_string(), n.saturating_add(1)),
        None => (slug.clone(), 2),
    };

    for offset in 0..MAX_SLUG_PROBES {
        let Some(counter) = start.checked_add(offset) else {
            break;
        };
        let probe = format!("{base}-{counter}");
        if !exists(probe.clone()).await.map_err(SlugError::Lookup)? {
            return Ok(probe);
        }
    }

    Err(SlugError::Exhausted(slug))
}
