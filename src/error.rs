//! Crate-wide error taxonomy.
//!
//! Mirrors the four error kinds of the indexing/retrieval contract: malformed
//! options or documents are `Validation`, invalid index state or unknown
//! identifiers are `Index`, persistence-backend failures are `Storage`, and
//! query-execution failures (including regex compilation) are `Search`.
//!
//! `Regex`/`Serde` wrap their source error with `#[from]` rather than
//! stringifying it, so `Error::source()` chains back to the original
//! `regex::Error`/`serde_json::Error` the way `file-store::Error`'s
//! `#[from] std::io::Error` variant does upstream.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("search error: {0}")]
    Search(String),

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("malformed index state: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Error {
        Error::Validation(msg.into())
    }

    pub fn index(msg: impl Into<String>) -> Error {
        Error::Index(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Error {
        Error::Storage(msg.into())
    }

    pub fn search(msg: impl Into<String>) -> Error {
        Error::Search(msg.into())
    }

    /// The error-taxonomy kind, exposed separately from the `Display` message
    /// so callers can branch on it without string matching.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Index(_) | Error::Serde(_) => ErrorKind::Index,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Search(_) | Error::Regex(_) => ErrorKind::Search,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    Index,
    Storage,
    Search,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "ValidationError"),
            ErrorKind::Index => write!(f, "IndexError"),
            ErrorKind::Storage => write!(f, "StorageError"),
            ErrorKind::Search => write!(f, "SearchError"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(Error::index("x").kind(), ErrorKind::Index);
        assert_eq!(Error::storage("x").kind(), ErrorKind::Storage);
        assert_eq!(Error::search("x").kind(), ErrorKind::Search);
    }

    #[test]
    fn display_carries_message() {
        let err = Error::validation("maxResults must be >= 1");
        assert_eq!(err.to_string(), "validation error: maxResults must be >= 1");
    }

    #[test]
    fn regex_and_serde_variants_chain_to_their_source_via_from() {
        let regex_err: Error = regex::Error::Syntax("bad pattern".to_string()).into();
        assert_eq!(regex_err.kind(), ErrorKind::Search);
        assert!(regex_err.source().is_some());

        let serde_err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(serde_err.kind(), ErrorKind::Index);
        assert!(serde_err.source().is_some());
    }
}
