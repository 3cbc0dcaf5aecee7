use thiserror::Error;

use crate::generation::client::GenerationError;

/// Application-level error type.
///
/// Every operation exposed to the interaction surface returns `Result<T, StudioError>`.
/// A returned error means the operation was aborted and no state was mutated.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StudioError {
    /// Stable machine-readable code, suitable for surfacing to a UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            StudioError::Validation(_) => "VALIDATION_ERROR",
            StudioError::NotFound(_) => "NOT_FOUND",
            StudioError::Document(_) => "DOCUMENT_ERROR",
            StudioError::Csv(_) => "CSV_ERROR",
            StudioError::Generation(_) => "GENERATION_ERROR",
            StudioError::Io(_) => "IO_ERROR",
            StudioError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "INTERNAL_ERROR"
            }
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        StudioError::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(StudioError::validation("x").code(), "VALIDATION_ERROR");
        assert_eq!(
            StudioError::Document("bad".to_string()).code(),
            "DOCUMENT_ERROR"
        );
        assert_eq!(
            StudioError::Generation(GenerationError::EmptyResult).code(),
            "GENERATION_ERROR"
        );
    }

    #[test]
    fn test_display_includes_message() {
        let err = StudioError::validation("Column count 13 is out of range");
        assert_eq!(
            err.to_string(),
            "Validation error: Column count 13 is out of range"
        );
    }
}
