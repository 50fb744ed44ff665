use thiserror::Error;

/// Core error types for game render host operations
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Endpoint not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Process management error: {0}")]
    ProcessError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Package error: {0}")]
    PackageError(String),

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl HostError {
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    pub fn process_error(message: impl Into<String>) -> Self {
        Self::ProcessError(message.into())
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::TransportError(message.into())
    }

    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError(message.into())
    }

    pub fn package_error(message: impl Into<String>) -> Self {
        Self::PackageError(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HostError::ConnectionFailed(_) | HostError::Timeout(_) | HostError::Io(_)
        )
    }

    /// Check if this error indicates a permanent failure
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            HostError::ConfigurationError(_) | HostError::Cancelled
        )
    }
}

/// A wire ordinal that has no counterpart in the internal enumeration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unmapped {kind} wire value {value}")]
pub struct MappingError {
    pub kind: &'static str,
    pub value: u64,
}

impl MappingError {
    pub fn new(kind: &'static str, value: impl Into<u64>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
