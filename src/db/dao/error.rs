use sea_orm::{DbErr, SqlErr};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DaoLayerError {
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
    #[error("{entity} not found (id={id})")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("{0}")]
    Conflict(&'static str),
    #[error("Invalid pagination: page={page} page_size={page_size}")]
    InvalidPagination { page: u64, page_size: u64 },
}

impl DaoLayerError {
    /// Turns a unique-index violation into `Conflict(message)`.
    pub fn on_unique_violation(self, message: &'static str) -> Self {
        match self {
            Self::Db(err)
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
            {
                Self::Conflict(message)
            }
            other => other,
        }
    }
}

pub type DaoResult<T> = Result<T, DaoLayerError>;
