//! Error handling for the mdedit client

use thiserror::Error;

/// Result type alias for mdedit operations
pub type Result<T> = std::result::Result<T, MdeditError>;

/// Main error type for the mdedit client
#[derive(Error, Debug)]
pub enum MdeditError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plugin-related errors
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// Event bus errors
    #[error("Event bus error: {0}")]
    EventBus(String),

    /// Durable storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Live connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// State management errors
    #[error("State error: {0}")]
    State(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("Error: {0}")]
    Generic(String),
}

impl MdeditError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new plugin error
    pub fn plugin<S: Into<String>>(msg: S) -> Self {
        Self::Plugin(msg.into())
    }

    /// Create a new event bus error
    pub fn event_bus<S: Into<String>>(msg: S) -> Self {
        Self::EventBus(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a new state error
    pub fn state<S: Into<String>>(msg: S) -> Self {
        Self::State(msg.into())
    }

    /// Create a generic error
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Self::Generic(msg.into())
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        match self {
            MdeditError::Config(_) => false,
            MdeditError::Plugin(_) => true,
            MdeditError::EventBus(_) => true,
            MdeditError::Storage(_) => true,
            MdeditError::Connection(_) => true,
            MdeditError::State(_) => true,
            MdeditError::Io(_) => true,
            MdeditError::Json(_) => false,
            MdeditError::Generic(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MdeditError::Config(_) => ErrorSeverity::High,
            MdeditError::Plugin(_) => ErrorSeverity::Medium,
            MdeditError::EventBus(_) => ErrorSeverity::Medium,
            MdeditError::Storage(_) => ErrorSeverity::Low,
            MdeditError::Connection(_) => ErrorSeverity::High,
            MdeditError::State(_) => ErrorSeverity::Medium,
            MdeditError::Io(_) => ErrorSeverity::Medium,
            MdeditError::Json(_) => ErrorSeverity::Low,
            MdeditError::Generic(_) => ErrorSeverity::Low,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
