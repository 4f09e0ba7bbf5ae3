use thiserror::Error;

pub type Result<T> = std::result::Result<T, HabitError>;

/// Failures of the durable key-value backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum HabitError {
    /// The snapshot write failed. In-memory state already reflects the
    /// mutation; `HabitService::flush` retries the write.
    #[error("failed to persist habits: {0}")]
    Persistence(#[from] StorageError),
}

/// Rejected habit input, raised by callers before they reach the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("habit name is required")]
    EmptyName,
    #[error("habit name is {len} characters, maximum is {max}")]
    NameTooLong { len: usize, max: usize },
    #[error("description is {len} characters, maximum is {max}")]
    DescriptionTooLong { len: usize, max: usize },
}
