use thiserror::Error;

/// Errors surfaced by the classifier library and binary
///
/// Only configuration-time errors abort a run. Errors raised by the
/// classification service during a run are absorbed by the batch
/// controller and turned into batch-size reductions.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Fatal initialization problem (missing credential, missing taxonomy, bad bounds)
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The classification service answered with a non-success status
    #[error("Classification service error: {0}")]
    Service(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service envelope (not the model text) could not be understood
    #[error("Invalid response from classification service: {0}")]
    InvalidResponse(String),

    #[error("Classification request timed out after {0}s")]
    Timeout(u64),
}

impl ClassifierError {
    /// Stable machine-readable code used in JSON error output
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::InvalidArguments(_) => "INVALID_ARGUMENTS",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::Service(_) => "SERVICE_ERROR",
            Self::Http(_) => "HTTP_ERROR",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::Timeout(_) => "TIMEOUT",
        }
    }

    /// Process exit code for the binary
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound(_) => 2,
            Self::InvalidArguments(_) => 3,
            Self::Configuration(_) => 4,
            Self::AuthenticationFailed(_) => 5,
            Self::Service(_) => 6,
            Self::Http(_) => 7,
            Self::InvalidResponse(_) => 8,
            Self::Timeout(_) => 9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_screaming_snake_case() {
        let err = ClassifierError::Configuration("missing taxonomy".to_string());
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
        assert!(err.to_string().contains("missing taxonomy"));
    }
}
