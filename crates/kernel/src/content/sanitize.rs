//! HTML sanitization policies for user-submitted text.
//!
//! Two policies cover every input the site accepts:
//! - [`Policy::Permissive`] keeps basic formatting, lists and safe links
//!   (post and comment bodies).
//! - [`Policy::Strict`] removes every tag and yields escaped plain text
//!   (excerpts and any field that must never carry markup).
//!
//! `script` and `style` elements are removed together with their content
//! under both policies.

use std::collections::HashSet;
use std::sync::LazyLock;

use ammonia::Builder;

/// Tags kept by the permissive policy.
const PERMISSIVE_TAGS: &[&str] = &[
    "a",
    "b",
    "blockquote",
    "br",
    "code",
    "em",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "i",
    "li",
    "ol",
    "p",
    "pre",
    "s",
    "strong",
    "u",
    "ul",
];

/// URL schemes allowed in links.
const SAFE_URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Elements dropped together with everything inside them.
const REMOVED_WITH_CONTENT: &[&str] = &["script", "style"];

static PERMISSIVE: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::default();
    builder
        .tags(PERMISSIVE_TAGS.iter().copied().collect())
        .url_schemes(SAFE_URL_SCHEMES.iter().copied().collect())
        .link_rel(Some("noopener noreferrer nofollow"))
        .clean_content_tags(REMOVED_WITH_CONTENT.iter().copied().collect());
    builder
});

static STRICT: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::empty();
    builder
        .strip_comments(true)
        .clean_content_tags(REMOVED_WITH_CONTENT.iter().copied().collect::<HashSet<_>>());
    builder
});

/// A named sanitization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Permissive,
    Strict,
}

impl Policy {
    /// Sanitize `html` under this policy.
    ///
    /// Output is stable: sanitizing it again returns it unchanged.
    pub fn sanitize(self, html: &str) -> String {
        match self {
            Policy::Permissive => PERMISSIVE.clean(html).to_string(),
            Policy::Strict => STRICT.clean(html).to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn permissive_keeps_formatting() {
        let html = "<p>Hello <strong>world</strong></p><ul><li>one</li></ul>";
        assert_eq!(Policy::Permissive.sanitize(html), html);
    }

    #[test]
    fn permissive_removes_scripts_and_handlers() {
        let out = Policy::Permissive
            .sanitize("<p onclick=\"steal()\">hi</p><script>alert(1)</script><img src=x onerror=alert(1)>");
        assert_eq!(out, "<p>hi</p>");
    }

    #[test]
    fn permissive_drops_javascript_links() {
        let out = Policy::Permissive.sanitize("<a href=\"javascript:alert(1)\">click</a>");
        assert!(!out.contains("javascript"));
        assert!(out.contains("click"));
    }

    #[test]
    fn permissive_marks_links() {
        let out = Policy::Permissive.sanitize("<a href=\"https://example.com\">site</a>");
        assert_eq!(
            out,
            "<a href=\"https://example.com\" rel=\"noopener noreferrer nofollow\">site</a>"
        );
    }

    #[test]
    fn strict_strips_all_markup() {
        let out = Policy::Strict.sanitize("<p>Hello <em>there</em></p><style>p{}</style>");
        assert_eq!(out, "Hello there");
    }

    #[test]
    fn strict_escapes_text() {
        assert_eq!(Policy::Strict.sanitize("1 < 2 & 3"), "1 &lt; 2 &amp; 3");
    }

    const FRAGMENTS: &[&str] = &[
        "hello",
        " ",
        "world.",
        "1 < 2 & 3 > 0",
        "<p>",
        "</p>",
        "<b>bold</b>",
        "<em>",
        "</em>",
        "<ul><li>item</li></ul>",
        "<blockquote>quoted</blockquote>",
        "<a href=\"https://example.com\">link</a>",
        "<a href=\"javascript:alert(1)\">bad</a>",
        "<script>alert(1)</script>",
        "<style>body { color: red }</style>",
        "<img src=x onerror=alert(1)>",
        "<div onclick=\"steal()\">",
        "</div>",
        "<h2>title</h2>",
        "<br>",
        "&amp;",
        "&lt;script&gt;",
    ];

    fn markup() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(FRAGMENTS), 0..12).prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn permissive_is_idempotent(input in markup()) {
            let once = Policy::Permissive.sanitize(&input);
            prop_assert_eq!(Policy::Permissive.sanitize(&once), once);
        }

        #[test]
        fn strict_is_idempotent(input in markup()) {
            let once = Policy::Strict.sanitize(&input);
            prop_assert_eq!(Policy::Strict.sanitize(&once), once);
        }

        #[test]
        fn strict_is_idempotent_on_arbitrary_text(input in "[a-zA-Z0-9 <>&;=/!\"'-]{0,64}") {
            let once = Policy::Strict.sanitize(&input);
            prop_assert_eq!(Policy::Strict.sanitize(&once), once);
        }

        #[test]
        fn no_policy_lets_scripts_through(input in markup()) {
            for policy in [Policy::Permissive, Policy::Strict] {
                let out = policy.sanitize(&input).to_lowercase();
                prop_assert!(!out.contains("<script"), "{:?} kept a script: {}", policy, out);
                prop_assert!(!out.contains("onerror="), "{:?} kept onerror: {}", policy, out);
                prop_assert!(!out.contains("javascript:"), "{:?} kept a js url: {}", policy, out);
            }
        }
    }
}
