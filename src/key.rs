//! Metric key normalization (spec §3).
//!
//! Runs of whitespace become `_`, runs of `/` become `-`, and any character
//! outside `[A-Za-z0-9._-]` is dropped. Applied once, at ingest.

/// Normalizes a raw metric key into the flat, Graphite-safe form used as
/// the accumulator map key.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            out.push('_');
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
        } else if c == '/' {
            out.push('-');
            while chars.peek() == Some(&'/') {
                chars.next();
            }
        } else if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            out.push(c);
        }
        // anything else is dropped
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_and_rewrites() {
        assert_eq!(normalize_key("a b/c!d"), "a_b-cd");
    }

    #[test]
    fn collapses_runs() {
        assert_eq!(normalize_key("a   b///c"), "a_b-c");
    }

    #[test]
    fn idempotent() {
        let once = normalize_key("a b/c!d");
        assert_eq!(normalize_key(&once), once);
    }

    #[test]
    fn preserves_already_clean_keys() {
        assert_eq!(normalize_key("foo.bar-baz_qux123"), "foo.bar-baz_qux123");
    }

    #[test]
    fn empty_key() {
        assert_eq!(normalize_key(""), "");
    }
}
