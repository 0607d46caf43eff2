use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("model could not be loaded: {0}")]
    Load(String),
    #[error("no detection model is loaded")]
    NoModelLoaded,
    #[error("source could not be opened: {0}")]
    SourceOpen(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("operation failed: {0}")]
    OperationFailed(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl DomainError {
    /// Stable identifier used by the HTTP layer to tell error kinds apart.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Load(_) => "load",
            DomainError::NoModelLoaded => "no_model_loaded",
            DomainError::SourceOpen(_) => "source_open",
            DomainError::Config(_) => "config",
            DomainError::NotFound(_) => "not_found",
            DomainError::InvalidInput(_) => "invalid_input",
            DomainError::OperationFailed(_) => "operation_failed",
            DomainError::Io(_) => "io",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
