//! Image reference patterns

use regex::Regex;
use std::fmt;
use tracing::warn;

/// Pattern matched against a container image reference.
///
/// Patterns are regular expressions anchored at the start of the reference,
/// so `busybox:.*` matches `busybox:1.36` but not `my/busybox:1.36`. A
/// pattern that is not a valid regex falls back to a literal prefix match.
#[derive(Debug, Clone)]
pub struct ImagePattern {
    source: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    Prefix(String),
}

impl ImagePattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let matcher = match Regex::new(&format!("^(?:{})", source)) {
            Ok(regex) => Matcher::Regex(regex),
            Err(e) => {
                warn!(
                    pattern = %source,
                    error = %e,
                    "Invalid image pattern, matching as literal prefix"
                );
                Matcher::Prefix(source.clone())
            }
        };

        Self { source, matcher }
    }

    /// Check an image reference against this pattern
    pub fn matches(&self, image: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(regex) => regex.is_match(image),
            Matcher::Prefix(prefix) => image.starts_with(prefix.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern compiled as a regular expression
    pub fn is_regex(&self) -> bool {
        matches!(self.matcher, Matcher::Regex(_))
    }
}

impl fmt::Display for ImagePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
