//! Error types for timeshadow operations.
//!
//! Write-path failures (`Write`, `Resolution`) abort the enclosing unit of work.
//! Read-path rewriting never produces an error of its own; skipped rewrites are
//! reported through [`crate::versioning::RewriteOutcome`] instead.

use thiserror::Error;

/// Result type alias for timeshadow operations.
pub type ShadowResult<T> = Result<T, ShadowError>;

/// Main error type for all timeshadow operations.
#[derive(Error, Debug)]
pub enum ShadowError {
    /// Appending a snapshot to a log table failed.
    #[error("Snapshot write error: {message}")]
    Write {
        message: String,
        code: ErrorCode,
        log_table: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Re-reading the canonical row needed for a snapshot failed.
    #[error("Snapshot resolution error: {message}")]
    Resolution {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Schema descriptor is missing or inconsistent.
    #[error("Schema error: {message}")]
    Schema { message: String, code: ErrorCode },

    /// Hook registration or dispatch failed.
    #[error("Hook error: {0}")]
    Hook(String),

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        suggestion: Option<String>,
    },

    /// Value conversion failed.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Write (WRITE_xxx)
    WriteAppendFailed,

    // Resolution (RES_xxx)
    ResQueryFailed,
    ResRowNotFound,
    ResMissingKey,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,
    DbTransactionFailed,

    // Schema (SCH_xxx)
    SchUnknownEntity,
    SchUnknownRelation,
    SchInvalidIdentifier,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingWhereClause,

    // Parse (PARSE_xxx)
    ParseInvalidValue,
    ParseMissingField,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::WriteAppendFailed => "WRITE_001",
            ErrorCode::ResQueryFailed => "RES_001",
            ErrorCode::ResRowNotFound => "RES_002",
            ErrorCode::ResMissingKey => "RES_003",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::DbTransactionFailed => "DB_003",
            ErrorCode::SchUnknownEntity => "SCH_001",
            ErrorCode::SchUnknownRelation => "SCH_002",
            ErrorCode::SchInvalidIdentifier => "SCH_003",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingWhereClause => "VAL_002",
            ErrorCode::ParseInvalidValue => "PARSE_001",
            ErrorCode::ParseMissingField => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl ShadowError {
    /// Create a snapshot write error.
    pub fn write(log_table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
            code: ErrorCode::WriteAppendFailed,
            log_table: Some(log_table.into()),
            source: None,
        }
    }

    /// Wrap an underlying failure as a snapshot write error.
    pub fn write_from(log_table: impl Into<String>, err: ShadowError) -> Self {
        let log_table = log_table.into();
        Self::Write {
            message: format!("failed to append snapshot to '{}': {}", log_table, err),
            code: ErrorCode::WriteAppendFailed,
            log_table: Some(log_table),
            source: Some(Box::new(err)),
        }
    }

    /// Create a resolution error.
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
            code: ErrorCode::ResRowNotFound,
            source: None,
        }
    }

    /// Wrap a failed re-read as a resolution error.
    pub fn resolution_from(message: impl Into<String>, err: ShadowError) -> Self {
        Self::Resolution {
            message: format!("{}: {}", message.into(), err),
            code: ErrorCode::ResQueryFailed,
            source: Some(Box::new(err)),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a schema error for an entity that was never registered.
    pub fn unknown_entity(name: impl Into<String>) -> Self {
        Self::Schema {
            message: format!("entity '{}' is not registered", name.into()),
            code: ErrorCode::SchUnknownEntity,
        }
    }

    /// Create a schema error for a relation the entity does not declare.
    pub fn unknown_relation(entity: &str, relation: &str) -> Self {
        Self::Schema {
            message: format!("entity '{}' has no relation '{}'", entity, relation),
            code: ErrorCode::SchUnknownRelation,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            suggestion: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidValue,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Write { code, .. } => *code,
            Self::Resolution { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Schema { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error was raised on the snapshot write path.
    pub fn is_write_path(&self) -> bool {
        matches!(self, Self::Write { .. } | Self::Resolution { .. })
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Write { .. } => {
                Some("Check that the log table exists and mirrors the live table's columns")
            }
            Self::Resolution { .. } => {
                Some("Ensure the written entity carries its primary key so its row can be re-read")
            }
            Self::Schema { .. } => Some("Register every entity reachable through preloads"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }
}
