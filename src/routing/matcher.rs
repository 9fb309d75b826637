//! Request path matching.
//!
//! # Pattern syntax
//! - `/api/*` matches every path starting with `/api/`
//! - `/healthz` matches that exact path only
//! - `@fingerprinted` matches content-addressed asset filenames
//!   such as `app.3f2a1c.js` or `index-4b1e9d0a.css`
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

use std::fmt;
use std::str::FromStr;

/// Keyword selecting [`PathPattern::Fingerprinted`].
pub const FINGERPRINTED: &str = "@fingerprinted";

/// Shortest hash segment accepted as a content fingerprint.
const MIN_FINGERPRINT_LEN: usize = 6;
const MAX_FINGERPRINT_LEN: usize = 64;

/// A single path condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches paths starting with the prefix.
    Prefix(String),
    /// Matches one path exactly.
    Exact(String),
    /// Matches filenames carrying a content hash.
    Fingerprinted,
}

/// Error returned for unparsable patterns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path pattern {pattern:?}: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: &'static str,
}

impl PathPattern {
    /// Returns true if the request path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            PathPattern::Exact(exact) => path == exact,
            PathPattern::Fingerprinted => is_fingerprinted(path),
        }
    }
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == FINGERPRINTED {
            return Ok(PathPattern::Fingerprinted);
        }
        if !s.starts_with('/') {
            return Err(PatternError {
                pattern: s.to_string(),
                reason: "must start with '/'",
            });
        }
        match s.strip_suffix('*') {
            Some(prefix) if prefix.contains('*') => Err(PatternError {
                pattern: s.to_string(),
                reason: "'*' is only allowed as the last character",
            }),
            Some(prefix) => Ok(PathPattern::Prefix(prefix.to_string())),
            None if s.contains('*') => Err(PatternError {
                pattern: s.to_string(),
                reason: "'*' is only allowed as the last character",
            }),
            None => Ok(PathPattern::Exact(s.to_string())),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Prefix(prefix) => write!(f, "{}*", prefix),
            PathPattern::Exact(exact) => f.write_str(exact),
            PathPattern::Fingerprinted => f.write_str(FINGERPRINTED),
        }
    }
}

/// Parse a list of pattern strings, failing on the first bad entry.
pub fn parse_patterns<S: AsRef<str>>(raw: &[S]) -> Result<Vec<PathPattern>, PatternError> {
    raw.iter().map(|s| s.as_ref().parse()).collect()
}

/// Returns true if the last path segment looks like `name.<hash>.ext` or
/// `name-<hash>.ext`.
pub fn is_fingerprinted(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or_default();
    let Some((stem, ext)) = file.rsplit_once('.') else {
        return false;
    };
    if ext.is_empty() {
        return false;
    }
    let Some((name, hash)) = stem.rsplit_once(['.', '-']) else {
        return false;
    };
    !name.is_empty()
        && (MIN_FINGERPRINT_LEN..=MAX_FINGERPRINT_LEN).contains(&hash.len())
        && hash.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        && hash.bytes().any(|b| b.is_ascii_digit())
}
