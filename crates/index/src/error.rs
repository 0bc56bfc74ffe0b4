use serde::Serialize;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("access denied for {key}: {message}")]
    PermissionDenied { key: String, message: String },

    #[error("temporary storage failure for {key}: {message}")]
    Transient { key: String, message: String },

    #[error("object {0} not found")]
    NotFound(String),

    #[error("storage operation failed for {key}: {message}")]
    Failed { key: String, message: String },

    #[error("stored data failed validation: {0}")]
    Validation(String),
}

impl StorageError {
    pub fn from_io(key: &str, error: io::Error) -> Self {
        let message = error.to_string();
        let key = key.to_string();
        match error.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(key),
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied { key, message },
            io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => {
                StorageError::Transient { key, message }
            }
            _ => StorageError::Failed { key, message },
        }
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Transient { .. } | StorageError::Failed { .. })
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("failed to parse hypergraph data: {0}")]
    Parsing(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// How a failure should be handled: retried, alerted on, or reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Parsing,
    StorageTransient,
    StoragePermission,
    Storage,
    Internal,
}

impl ErrorCategory {
    pub fn of(error: &ExtractionError) -> Self {
        match error {
            ExtractionError::Validation(_) => ErrorCategory::Validation,
            ExtractionError::Parsing(_) => ErrorCategory::Parsing,
            ExtractionError::Storage(StorageError::PermissionDenied { .. }) => ErrorCategory::StoragePermission,
            ExtractionError::Storage(StorageError::Transient { .. }) => ErrorCategory::StorageTransient,
            ExtractionError::Storage(_) => ErrorCategory::Storage,
            ExtractionError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Parsing => "parsing",
            ErrorCategory::StorageTransient => "storage_transient",
            ErrorCategory::StoragePermission => "storage_permission",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Internal => "internal",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "Input validation failed",
            ErrorCategory::Parsing => "Hypergraph data parsing failed",
            ErrorCategory::StorageTransient => "Temporary storage service issue",
            ErrorCategory::StoragePermission => "Storage access permission denied",
            ErrorCategory::Storage => "Storage operation failed",
            ErrorCategory::Internal => "Unexpected internal error",
        }
    }

    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorCategory::StorageTransient | ErrorCategory::Storage)
    }

    pub fn should_alert(&self) -> bool {
        !matches!(self, ErrorCategory::Validation | ErrorCategory::StorageTransient)
    }

    /// Client-side failures are the caller's to fix.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorCategory::Validation | ErrorCategory::Parsing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_storage_kinds() {
        let denied = StorageError::from_io("a/b.json", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, StorageError::PermissionDenied { .. }));
        assert!(!denied.is_retryable());

        let timeout = StorageError::from_io("a/b.json", io::Error::from(io::ErrorKind::TimedOut));
        assert!(timeout.is_retryable());

        let missing = StorageError::from_io("a/b.json", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(missing, StorageError::NotFound(ref k) if k == "a/b.json"));
    }

    #[test]
    fn categories_carry_retry_and_alert_flags() {
        let cases = [
            (ExtractionError::Validation("customer_id".into()), ErrorCategory::Validation, false, false),
            (ExtractionError::Parsing("bad".into()), ErrorCategory::Parsing, false, true),
            (
                StorageError::Transient { key: "k".into(), message: "slow".into() }.into(),
                ErrorCategory::StorageTransient,
                true,
                false,
            ),
            (
                StorageError::PermissionDenied { key: "k".into(), message: "no".into() }.into(),
                ErrorCategory::StoragePermission,
                false,
                true,
            ),
            (StorageError::Validation("count".into()).into(), ErrorCategory::Storage, true, true),
            (ExtractionError::Internal("boom".into()), ErrorCategory::Internal, false, true),
        ];

        for (error, category, retry, alert) in cases {
            let actual = ErrorCategory::of(&error);
            assert_eq!(actual, category, "{}", error);
            assert_eq!(actual.should_retry(), retry, "{}", error);
            assert_eq!(actual.should_alert(), alert, "{}", error);
        }
    }
}
