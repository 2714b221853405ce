use tonic::Code;

/// Errors surfaced by an admin session or raised locally before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    /// Table or column family does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create target already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Request rejected, either locally or by the service.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The service answered with something that cannot be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Could not build or open the channel to the admin endpoint.
    #[error("Failed to connect to admin endpoint: {0}")]
    Connect(String),

    /// Any other service or transport failure.
    #[error("Admin request failed ({code:?}): {message}")]
    Status { code: Code, message: String },
}

/// Result type for admin operations
pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdminError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, AdminError::AlreadyExists(_))
    }
}

impl From<tonic::Status> for AdminError {
    fn from(status: tonic::Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            Code::NotFound => AdminError::NotFound(message),
            Code::AlreadyExists => AdminError::AlreadyExists(message),
            Code::InvalidArgument => AdminError::InvalidArgument(message),
            code => AdminError::Status { code, message },
        }
    }
}

impl From<tonic::transport::Error> for AdminError {
    fn from(err: tonic::transport::Error) -> Self {
        AdminError::Connect(err.to_string())
    }
}
