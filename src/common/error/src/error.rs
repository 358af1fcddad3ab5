use thiserror::Error;

pub type BisectResult<T> = std::result::Result<T, BisectError>;

#[derive(Debug, Error)]
pub enum BisectError {
    #[error("{0}")]
    FieldNotFound(String),
    #[error("{0}")]
    SchemaMismatch(String),
    #[error("{0}")]
    TypeError(String),
    #[error("{0:?}")]
    ArrowError(#[from] arrow2::error::Error),
    #[error("{0}")]
    ValueError(String),
}
