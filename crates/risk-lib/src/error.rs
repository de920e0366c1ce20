//! Error types for the risk pipeline
//!
//! None of these escape the orchestrator: every failure path ends in a
//! fallback score or a boolean status. They exist so the recovery code can
//! tell failures apart in logs.

use thiserror::Error;

/// Failure reading from or writing to a model store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store key {0:?}")]
    InvalidKey(String),

    #[error("I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checksum mismatch for key {key}: expected {expected}, got {actual}")]
    Corrupt {
        key: String,
        expected: String,
        actual: String,
    },
}

impl StoreError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io { .. })
    }
}

/// Failure loading labeled training data from a real source
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset is empty or has no data rows")]
    Empty,

    #[error("dataset has {rows} usable rows, need at least {required}")]
    Insufficient { rows: usize, required: usize },
}

impl DataSourceError {
    /// Whether another attempt could succeed; a missing file is final
    pub fn is_transient(&self) -> bool {
        match self {
            DataSourceError::Io(e) => e.kind() != std::io::ErrorKind::NotFound,
            DataSourceError::Empty | DataSourceError::Insufficient { .. } => false,
        }
    }
}

/// Failure while fitting or restoring the scoring network
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no training samples available")]
    EmptyDataset,

    #[error("training diverged at epoch {epoch}: loss is not finite")]
    Diverged { epoch: usize },

    #[error("training task failed: {0}")]
    Task(String),

    #[error("layer shape mismatch: {0}")]
    Shape(String),

    #[error("failed to (de)serialize model: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_key() {
        let err = StoreError::Corrupt {
            key: "risk-model/weights".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert!(err.to_string().contains("risk-model/weights"));

        let err = DataSourceError::Insufficient {
            rows: 3,
            required: 10,
        };
        assert_eq!(
            err.to_string(),
            "dataset has 3 usable rows, need at least 10"
        );
    }

    #[test]
    fn test_only_io_failures_are_transient() {
        let io = || std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk");
        assert!(StoreError::Io {
            key: "k".to_string(),
            source: io(),
        }
        .is_transient());
        assert!(!StoreError::InvalidKey("../k".to_string()).is_transient());
        assert!(DataSourceError::Io(io()).is_transient());
        assert!(!DataSourceError::Empty.is_transient());
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        assert!(!DataSourceError::Io(missing).is_transient());
    }
}
