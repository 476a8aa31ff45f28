use std::fmt::{self, Display, Formatter};

/// Result type for library operations
pub type ProvisionResult<T> = std::result::Result<T, ProvisionError>;

/// Errors that abort a workflow
#[derive(Debug)]
pub enum ProvisionError {
    /// Missing or malformed configuration
    Config(String),
    /// Reading or writing the account batch failed
    Persistence(String),
    /// The RPC endpoint could not be reached or built
    Network(String),
    /// A contract call failed outside of a batch run
    Contract(String),
}

impl ProvisionError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }
}

impl Display for ProvisionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ProvisionError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            ProvisionError::Network(msg) => write!(f, "Network error: {}", msg),
            ProvisionError::Contract(msg) => write!(f, "Contract error: {}", msg),
        }
    }
}

impl std::error::Error for ProvisionError {}

impl From<std::io::Error> for ProvisionError {
    fn from(err: std::io::Error) -> Self {
        ProvisionError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(err: serde_json::Error) -> Self {
        ProvisionError::Persistence(err.to_string())
    }
}
