//! Crate-level error type.
//!
//! The diagnosis and learning math never fails; everything that can go wrong
//! lives at the edges (storage, configuration, import documents, CLI input).

use thiserror::Error;

/// Errors surfaced by the journal, configuration loader, and CLI.
#[derive(Debug, Error)]
pub enum BrewError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A config value parsed but is out of range (e.g. `grind_bound = nan`).
    #[error("invalid configuration: {0}")]
    InvalidSetting(String),

    /// A user-supplied import document was rejected; nothing was changed.
    #[error("import rejected: {0}")]
    Import(String),

    #[error("unknown brew method: {0}")]
    UnknownMethod(String),

    #[error("unknown roast level: {0}")]
    UnknownRoast(String),

    #[error("learning store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, BrewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_error_message_is_user_facing() {
        let e = BrewError::Import("brewHistory must be an array".to_string());
        assert_eq!(e.to_string(), "import rejected: brewHistory must be an array");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: BrewError = io.into();
        assert!(matches!(e, BrewError::Io(_)));
    }

    #[test]
    fn test_json_error_converts() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let e: BrewError = err.into();
        assert!(e.to_string().starts_with("JSON error"));
    }
}
