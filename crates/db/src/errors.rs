use shopsense_core::errors::RefreshError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for RefreshError {
    fn from(error: RepositoryError) -> Self {
        RefreshError::DataSource(error.to_string())
    }
}
