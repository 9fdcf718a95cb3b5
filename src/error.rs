use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Conflict(String),
    #[error("failed to save {collection} data: {reason}")]
    Save { collection: String, reason: String },
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn save(collection: &str, reason: impl std::fmt::Display) -> Self {
        Self::Save {
            collection: collection.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_error_names_the_collection() {
        let err = AppError::save("notes", "disk full");
        assert_eq!(err.to_string(), "failed to save notes data: disk full");
    }
}
