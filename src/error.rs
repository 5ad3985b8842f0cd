use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlodapError {
    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<sqlx::Error> for GlodapError {
    fn from(err: sqlx::Error) -> Self {
        GlodapError::Store(err.to_string())
    }
}

impl GlodapError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            GlodapError::Validation(_) => 400,
            GlodapError::NotFound(_) => 404,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, GlodapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GlodapError::Validation("x".into()).status_code(), 400);
        assert_eq!(GlodapError::NotFound("x".into()).status_code(), 404);
        assert_eq!(GlodapError::Store("x".into()).status_code(), 500);
    }

    #[test]
    fn test_store_message_prefix() {
        let err = GlodapError::Store("connection refused".to_string());
        assert_eq!(err.to_string(), "Database error: connection refused");
    }
}
