//! Errors shared by the Teed crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures below the HTTP layer
///
/// `teed-ident` maps `InvalidInput` to 400 and everything else to 500.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite query or pool failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// TOML or root folder file access
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable TOML, bad settings rows, missing API keys, inconsistent timeouts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected identify/correction payloads
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored rows that fail to decode, client construction failures
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_category() {
        assert_eq!(
            Error::Config("request_timeout_ms too large".into()).to_string(),
            "Configuration error: request_timeout_ms too large"
        );
        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "teed-ident.toml").into();
        assert!(matches!(io, Error::Io(_)));
    }
}
