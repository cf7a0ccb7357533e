use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single call to an external service (embedding or generation).
///
/// Providers map their transport errors into this type; the pipeline then
/// wraps it in the [`DecodeError`] variant for the stage that made the call.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("service misconfigured: {0}")]
    Config(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl ServiceError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Network(_) | ServiceError::Timeout(_) => true,
            ServiceError::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            ServiceError::InvalidResponse(_)
            | ServiceError::Config(_)
            | ServiceError::Backend(_) => false,
        }
    }
}

/// Taxonomy category of a [`DecodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Ingestion,
    Indexing,
    Retrieval,
    Generation,
    Attribution,
    Question,
    Config,
    Io,
    Serialization,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Indexing => "indexing",
            Self::Retrieval => "retrieval",
            Self::Generation => "generation",
            Self::Attribution => "attribution",
            Self::Question => "question",
            Self::Config => "config",
            Self::Io => "io",
            Self::Serialization => "serialization",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for the Decode pipeline.
///
/// Ingestion and indexing errors are fatal to the corpus; generation errors
/// only abort the current research question. An insight without supporting
/// quotes is not an error and never appears here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Indexing error: {0}")]
    Indexing(ServiceError),

    #[error("Retrieval error: {0}")]
    Retrieval(ServiceError),

    #[error("Generation error: {0}")]
    Generation(ServiceError),

    #[error("Attribution error: {0}")]
    Attribution(ServiceError),

    #[error("Invalid research question: {0}")]
    Question(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DecodeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DecodeError::Ingestion(_) => ErrorCategory::Ingestion,
            DecodeError::Indexing(_) => ErrorCategory::Indexing,
            DecodeError::Retrieval(_) => ErrorCategory::Retrieval,
            DecodeError::Generation(_) => ErrorCategory::Generation,
            DecodeError::Attribution(_) => ErrorCategory::Attribution,
            DecodeError::Question(_) => ErrorCategory::Question,
            DecodeError::Config(_) => ErrorCategory::Config,
            DecodeError::Io(_) => ErrorCategory::Io,
            DecodeError::Serialization(_) => ErrorCategory::Serialization,
        }
    }

    /// Whether resubmitting the same research question may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DecodeError::Generation(_) | DecodeError::Retrieval(_) | DecodeError::Attribution(_)
        )
    }
}

impl From<toml::de::Error> for DecodeError {
    fn from(err: toml::de::Error) -> Self {
        DecodeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DecodeError {
    fn from(err: toml::ser::Error) -> Self {
        DecodeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DecodeError::Ingestion("no transcripts".to_string());
        assert_eq!(err.to_string(), "Ingestion error: no transcripts");

        let err = DecodeError::Generation(ServiceError::Timeout(Duration::from_secs(60)));
        assert_eq!(err.to_string(), "Generation error: timed out after 60s");
    }

    #[test]
    fn test_categories_are_distinct() {
        let indexing = DecodeError::Indexing(ServiceError::Network("down".into()));
        let generation = DecodeError::Generation(ServiceError::Network("down".into()));
        let ingestion = DecodeError::Ingestion("empty".into());

        assert_eq!(indexing.category(), ErrorCategory::Indexing);
        assert_eq!(generation.category(), ErrorCategory::Generation);
        assert_eq!(ingestion.category(), ErrorCategory::Ingestion);
        assert_ne!(indexing.category(), generation.category());
    }

    #[test]
    fn test_recoverable() {
        assert!(DecodeError::Generation(ServiceError::Network("x".into())).is_recoverable());
        assert!(!DecodeError::Indexing(ServiceError::Network("x".into())).is_recoverable());
        assert!(!DecodeError::Ingestion("x".into()).is_recoverable());
    }

    #[test]
    fn test_service_error_transient() {
        assert!(ServiceError::Network("reset".into()).is_transient());
        assert!(ServiceError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(ServiceError::Status {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(ServiceError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!ServiceError::Status {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!ServiceError::InvalidResponse("bad json".into()).is_transient());
        assert!(!ServiceError::Config("no key".into()).is_transient());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DecodeError = io_err.into();
        assert!(matches!(err, DecodeError::Io(_)));
        assert_eq!(err.category(), ErrorCategory::Io);
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let decode_err: DecodeError = err.unwrap_err().into();
        assert!(matches!(decode_err, DecodeError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let decode_err: DecodeError = err.unwrap_err().into();
        assert!(matches!(decode_err, DecodeError::Serialization(_)));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Indexing.to_string(), "indexing");
        assert_eq!(ErrorCategory::Question.as_str(), "question");
    }
}
