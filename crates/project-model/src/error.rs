//! Errors raised by the project model.

use std::path::PathBuf;

use versereel_common::VersereelError;

/// Errors that can occur when loading, editing, or persisting model data.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize data for {path}: {source}")]
    SerializeError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid collection number {number} (expected {min}..={max})")]
    InvalidCollection { number: i64, min: u32, max: u32 },

    #[error("Invalid time {value} for sentence {index}: must be a finite, non-negative number of seconds")]
    InvalidTime { index: u32, value: f64 },

    #[error("Sentence index {index} is out of range (collection has {total})")]
    IndexOutOfRange { index: u32, total: u32 },
}

impl From<ModelError> for VersereelError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidCollection { number, .. } => VersereelError::InvalidCollection { number },
            ModelError::InvalidTime { .. } | ModelError::IndexOutOfRange { .. } => {
                VersereelError::precondition(err.to_string())
            }
            ModelError::IoError { .. }
            | ModelError::ParseError { .. }
            | ModelError::SerializeError { .. } => {
                VersereelError::Other(anyhow::Error::new(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_collection_number() {
        let err: VersereelError = ModelError::InvalidCollection {
            number: 12,
            min: 1,
            max: 8,
        }
        .into();
        assert!(matches!(err, VersereelError::InvalidCollection { number: 12 }));
        assert_eq!(err.status_hint(), 400);
    }

    #[test]
    fn test_invalid_time_is_precondition() {
        let err: VersereelError = ModelError::InvalidTime {
            index: 2,
            value: -1.0,
        }
        .into();
        assert!(matches!(err, VersereelError::Precondition { .. }));
    }

    #[test]
    fn test_serialize_error_names_the_write() {
        let source = serde_json::from_str::<u32>("x").unwrap_err();
        let err = ModelError::SerializeError {
            path: "timings.r.part.1.json".into(),
            source,
        };
        assert!(err
            .to_string()
            .starts_with("Failed to serialize data for timings.r.part.1.json"));
        let err: VersereelError = err.into();
        assert!(matches!(err, VersereelError::Other(_)));
    }
}
