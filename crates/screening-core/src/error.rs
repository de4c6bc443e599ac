use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ScreeningError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ScreeningError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type ScreeningResult<T> = Result<T, ScreeningError>;
