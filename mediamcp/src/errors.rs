use thiserror::Error as ThisError;

/// Every failure a tool call can produce.
///
/// The `Display` output is the caller-visible message, prefixed with the kind
/// (`"ProviderError: connection timeout"`). It must never carry secrets, so
/// constructors receive already-sanitized text.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Missing, malformed or rejected bearer token
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Missing or malformed tool parameters, or an unknown tool
    #[error("InvalidInput: {message}")]
    InvalidInput { message: String },

    /// The backend failed to validate a token or issue an upload ticket
    #[error("UpstreamError: {message}")]
    Upstream { message: String },

    /// The third-party inference provider failed or returned an unusable result
    #[error("ProviderError: {message}")]
    Provider { message: String },

    /// Object storage rejected or never received the upload
    #[error("UploadError: {message}")]
    Upload { message: String },

    /// Unexpected error with full context chain
    #[error("InternalError: {0:#}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Error::Unauthorized { message: message.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput { message: message.into() }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Error::Upstream { message: message.into() }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Error::Provider { message: message.into() }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Error::Upload { message: message.into() }
    }

    /// Short name of the failure class, as used in the message prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthorized { .. } => "Unauthorized",
            Error::InvalidInput { .. } => "InvalidInput",
            Error::Upstream { .. } => "UpstreamError",
            Error::Provider { .. } => "ProviderError",
            Error::Upload { .. } => "UploadError",
            Error::Other(_) => "InternalError",
        }
    }

    /// Log the error at a level matching its severity.
    pub fn log(&self) {
        match self {
            Error::Other(_) => tracing::error!("Internal error: {:#}", self),
            Error::Upstream { .. } | Error::Provider { .. } | Error::Upload { .. } => {
                tracing::warn!("Remote call failed: {}", self);
            }
            Error::Unauthorized { .. } => tracing::info!("Authorization error: {}", self),
            Error::InvalidInput { .. } => tracing::debug!("Client error: {}", self),
        }
    }
}

/// Type alias for tool and service results
pub type Result<T> = std::result::Result<T, Error>;
