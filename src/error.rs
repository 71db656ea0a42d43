// Centralized error handling using thiserror for type-safe error management
//
// Two layers of errors live here:
// - BenchError: setup-time failures (config, tool registration, IO). These
//   are returned as Result and handled by the caller.
// - BackendError: per-request failures inside an invocation. These never
//   escape an invocation; the engine folds them into InvocationResult so
//   callers branch on `success` instead of matching errors.

use thiserror::Error;

/// Main error type for curatebench setup and configuration
///
/// Usage:
///     fn load() -> Result<BenchConfig> {
///         let timeout = raw.parse::<u64>()
///             .map_err(|e| BenchError::ConfigError(
///                 format!("REQUEST_TIMEOUT_SECS is not a number: {}", e)
///             ))?;
///         // ...
///     }
#[derive(Debug, Error)]
pub enum BenchError {
    /// A tool with this name is already registered
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    /// Configuration loading or validation error
    ///
    /// Invalid numeric settings, unreadable .env files, and the like.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Required environment variable (credential) not found
    #[error("Environment error: {0}")]
    EnvError(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// HTTP client could not be built
    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),
}

/// Type alias for Result with BenchError
pub type Result<T> = std::result::Result<T, BenchError>;

/// Failure of a single backend request or of the tool loop
///
/// Classification drives the retry policy: only `Throttled` is retried,
/// everything else ends the invocation at the attempt where it happened.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// HTTP 429 or a throttling-class error type reported by the backend
    #[error("{message}")]
    Throttled { code: String, message: String },

    /// Any other non-success HTTP status
    #[error("{message}")]
    Http {
        status: u16,
        code: String,
        message: String,
    },

    /// Connection, TLS, or timeout failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// A 2xx response whose body could not be decoded
    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    /// The model kept requesting tools past the iteration ceiling
    #[error("Max tool iterations exceeded ({0})")]
    MaxToolIterations(usize),
}

impl BackendError {
    /// Whether the retry loop should back off and try again
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Throttled { .. })
    }

    /// Backend-specific classification string reported as `error_code`
    pub fn error_code(&self) -> String {
        match self {
            BackendError::Throttled { code, .. } => code.clone(),
            BackendError::Http { code, .. } => code.clone(),
            BackendError::Transport(_) => "TRANSPORT_ERROR".to_string(),
            BackendError::InvalidResponse(_) => "INVALID_RESPONSE".to_string(),
            BackendError::MaxToolIterations(_) => "MAX_TOOL_ITERATIONS".to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BenchError::DuplicateTool("fuzzy_match".to_string());
        assert_eq!(err.to_string(), "Tool already registered: fuzzy_match");

        let err = BenchError::ConfigError("bad timeout".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad timeout");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let bench_err: BenchError = io_err.into();

        match bench_err {
            BenchError::IoError(_) => {}
            _ => panic!("Expected IoError variant"),
        }
    }

    #[test]
    fn test_only_throttling_is_retryable() {
        let throttled = BackendError::Throttled {
            code: "HTTP_429".to_string(),
            message: "slow down".to_string(),
        };
        let http = BackendError::Http {
            status: 500,
            code: "HTTP_500".to_string(),
            message: "boom".to_string(),
        };

        assert!(throttled.is_retryable());
        assert!(!http.is_retryable());
        assert!(!BackendError::Transport("reset".to_string()).is_retryable());
        assert!(!BackendError::MaxToolIterations(10).is_retryable());
    }

    #[test]
    fn test_error_codes() {
        let http = BackendError::Http {
            status: 400,
            code: "ValidationException".to_string(),
            message: "bad input".to_string(),
        };
        assert_eq!(http.error_code(), "ValidationException");
        assert_eq!(http.to_string(), "bad input");
        assert_eq!(
            BackendError::Transport("x".to_string()).error_code(),
            "TRANSPORT_ERROR"
        );
        assert_eq!(
            BackendError::MaxToolIterations(10).to_string(),
            "Max tool iterations exceeded (10)"
        );
    }
}
