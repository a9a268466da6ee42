//! Error types shared by every Semantic Lens component.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::bundle::ValidationIssue;
use crate::config::ConfigError;

/// Stable, machine-readable error codes.
///
/// Callers branch on these instead of parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    ParseError,
    ConnectionError,
    ConfigError,
    NotFound,
    DatabaseError,
    IoError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::IoError => "IO_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in the graph store, loader, matcher or projection.
#[derive(Debug, Error)]
pub enum LensError {
    /// Bundle failed schema validation. The load is aborted.
    #[error("Bundle validation failed: {}", summarize(.0))]
    Validation(Vec<ValidationIssue>),

    /// Input document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Remote backend not connected or unreachable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed view configuration, pattern definition or settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query target absent.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// A statement failed on a connected remote backend.
    #[error("Database error: {0}")]
    Database(String),

    /// IO error.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LensError {
    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Parse(_) => ErrorCode::ParseError,
            Self::Connection(_) => ErrorCode::ConnectionError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io { .. } => ErrorCode::IoError,
        }
    }

    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            what: "Node",
            id: id.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    match issues {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

impl From<serde_json::Error> for LensError {
    fn from(err: serde_json::Error) -> Self {
        LensError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for LensError {
    fn from(err: serde_yaml::Error) -> Self {
        LensError::Parse(err.to_string())
    }
}

/// Transport failures and a dropped or uninitialised client are connection
/// errors; everything else the backend reports is a database error.
impl From<surrealdb::Error> for LensError {
    fn from(err: surrealdb::Error) -> Self {
        use surrealdb::error::Api;
        match &err {
            surrealdb::Error::Api(Api::Ws(_) | Api::Http(_) | Api::ConnectionUninitialised) => {
                LensError::Connection(err.to_string())
            }
            _ => LensError::Database(err.to_string()),
        }
    }
}

impl From<ConfigError> for LensError {
    fn from(err: ConfigError) -> Self {
        LensError::Config(err.to_string())
    }
}

pub type Result<T, E = LensError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            LensError::Connection("down".into()).code().as_str(),
            "CONNECTION_ERROR"
        );
        assert_eq!(LensError::node_not_found("x").code(), ErrorCode::NotFound);
        assert_eq!(
            LensError::Config("bad".into()).to_string(),
            "Configuration error: bad"
        );
    }

    #[test]
    fn test_surreal_transport_errors_are_connection_errors() {
        use surrealdb::error::Api;
        let dropped: LensError = surrealdb::Error::Api(Api::ConnectionUninitialised).into();
        assert_eq!(dropped.code(), ErrorCode::ConnectionError);
        let ws: LensError = surrealdb::Error::Api(Api::Ws("connection reset".into())).into();
        assert_eq!(ws.code(), ErrorCode::ConnectionError);
        let http: LensError = surrealdb::Error::Api(Api::Http("refused".into())).into();
        assert_eq!(http.code(), ErrorCode::ConnectionError);
        let query: LensError = surrealdb::Error::Api(Api::Query("bad statement".into())).into();
        assert_eq!(query.code(), ErrorCode::DatabaseError);
    }

    #[test]
    fn test_validation_message_summarizes() {
        let err = LensError::Validation(vec![
            ValidationIssue::new("/nodes/0/kind", "unknown kind"),
            ValidationIssue::new("/edges", "expected array"),
        ]);
        assert_eq!(
            err.to_string(),
            "Bundle validation failed: /nodes/0/kind: unknown kind (and 1 more)"
        );
    }
}
