use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("No exercise named {0:?}")]
    NotFound(String),
}
