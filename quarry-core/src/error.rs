//! Error types for quarry operations

use std::time::Duration;
use thiserror::Error;

/// Configuration errors. Raised only while constructing an orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Failed to build HTTP client: {reason}")]
    ClientBuild { reason: String },
}

/// Caller-supplied argument errors. Raised before any call is made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown action '{action}' (expected one of: {expected})")]
    UnknownAction { action: String, expected: String },

    #[error("Field {field} must not be empty")]
    Empty { field: String },
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::RequiredFieldMissing {
            field: field.into(),
        }
    }

    pub fn empty(field: impl Into<String>) -> Self {
        Self::Empty {
            field: field.into(),
        }
    }
}

/// A primitive call to the remote service failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("{method} {endpoint} failed with status {status}: {message}")]
    Status {
        method: String,
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("{method} {endpoint} failed: {message}")]
    Network {
        method: String,
        endpoint: String,
        message: String,
    },

    #[error("Invalid response from {method} {endpoint}: {message}")]
    InvalidResponse {
        method: String,
        endpoint: String,
        message: String,
    },
}

impl TransportError {
    /// Path of the primitive call that failed.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Status { endpoint, .. }
            | Self::Network { endpoint, .. }
            | Self::InvalidResponse { endpoint, .. } => endpoint,
        }
    }

    /// HTTP status, when the remote service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Status { message, .. }
            | Self::Network { message, .. }
            | Self::InvalidResponse { message, .. } => message,
        }
    }

    /// Whether repeating the same call could succeed.
    ///
    /// Network failures, HTTP 429 and HTTP 5xx are retryable. Quarry never
    /// retries on its own; this is a hint for the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::InvalidResponse { .. } => false,
        }
    }
}

/// A deadline on a rate-limited wait was exceeded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("Rate limit wait of {required:?} exceeds the caller deadline ({available:?} available)")]
    DeadlineExceeded {
        required: Duration,
        available: Duration,
    },

    #[error("Deadline elapsed while queued behind {queued_ahead} earlier callers")]
    QueueDeadline { queued_ahead: usize },
}

/// Master error type for all quarry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuarryError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Timeout error: {0}")]
    Timeout(#[from] TimeoutError),
}

impl QuarryError {
    /// Short stable name of the error kind, used in tool responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Result type alias for quarry operations.
pub type QuarryResult<T> = Result<T, QuarryError>;

// =============================================================================
// TESTS
// =============================================================================
