//! Word-boundary excerpt generation.

/// Default excerpt length in characters.
pub const DEFAULT_EXCERPT_LEN: usize = 160;

/// Appended to every truncated excerpt.
const TRUNCATION_MARKER: &str = "...";

/// Longest entity name looked for after `&`, e.g. `#x1F600` or `nbsp`.
const MAX_ENTITY_NAME: usize = 10;

/// Byte length of the HTML entity at the start of `s`, if there is one.
fn entity_len(s: &str) -> Option<usize> {
    let name = s.strip_prefix('&')?;
    let end = name.bytes().take(MAX_ENTITY_NAME + 1).position(|b| b == b';')?;
    let valid = end > 0
        && name.as_bytes()[..end]
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'#');
    valid.then_some(end + 2)
}

/// Byte offsets at which each visible character of escaped `text` starts.
fn visible_chars(text: &str) -> impl Iterator<Item = usize> + '_ {
    let mut next = 0;
    text.char_indices().filter_map(move |(i, c)| {
        if i < next {
            return None;
        }
        next = i + entity_len(&text[i..]).unwrap_or(c.len_utf8());
        Some(i)
    })
}

/// Shorten escaped `text` to at most `max_len` characters, cutting at the last space.
///
/// An HTML entity such as `&amp;` counts as one character and is never
/// split. Text that already fits is returned unchanged. When the first
/// `max_len` characters contain no space the cut falls exactly at `max_len`.
/// Truncated output always ends in `...`, which is not counted against
/// `max_len`.
pub fn excerpt(text: &str, max_len: usize) -> String {
    let Some(cut) = visible_chars(text).nth(max_len) else {
        return text.to_string();
    };

    let prefix = &text[..cut];
    let trimmed = match prefix.rfind(' ') {
        Some(space) if space > 0 => prefix[..space].trim_end(),
        _ => prefix,
    };

    format!("{trimmed}{TRUNCATION_MARKER}")
}
