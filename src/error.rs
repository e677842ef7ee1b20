//! Error types for the Node Remediation Operator

use thiserror::Error;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// A store call did not finish within the configured call timeout
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// The deterministic instance name is taken by an object this template does not own
    #[error("NodeRemediation '{name}' already exists and is not owned by template '{template}'")]
    NameConflict { name: String, template: String },

    /// A required object field is missing
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a timeout error for the named operation
    pub fn timeout(op: impl Into<String>) -> Self {
        Error::Timeout(op.into())
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Error::MissingField(field.into())
    }

    /// HTTP status code of the underlying API error, if any
    pub fn api_code(&self) -> Option<u16> {
        match self {
            Error::Kube(kube::Error::Api(resp)) => Some(resp.code),
            _ => None,
        }
    }

    /// Whether the API server reported the object as missing
    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }

    /// Whether the API server rejected a create because the name is taken
    pub fn is_already_exists(&self) -> bool {
        self.api_code() == Some(409)
    }
}
