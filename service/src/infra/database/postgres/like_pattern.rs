//! [`LikePattern`] definition.

use derive_more::Display;
use postgres_types::{FromSql, ToSql};

/// SQL `LIKE` pattern matching any string containing the input as is.
#[derive(Clone, Debug, Display, Eq, FromSql, PartialEq, ToSql)]
#[postgres(transparent)]
pub struct LikePattern(String);

impl LikePattern {
    /// Creates a new [`LikePattern`] out of the given `input`, escaping all the
    /// `LIKE` wildcards in it.
    #[must_use]
    pub fn contains(input: &str) -> Self {
        Self(format!(
            "%{}%",
            input
                .replace('\\', r"\\")
                .replace('%', r"\%")
                .replace('_', r"\_"),
        ))
    }
}

#[cfg(test)]
mod spec {
    use super::LikePattern;

    #[test]
    fn escapes_wildcards() {
        assert_eq!(LikePattern::contains("ann").to_string(), "%ann%");
        assert_eq!(
            LikePattern::contains(r"50%_a\b").to_string(),
            r"%50\%\_a\\b%",
        );
    }
}
