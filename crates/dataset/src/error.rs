use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Dataset unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed snapshot: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<reqwest::Error> for DatasetError {
    fn from(err: reqwest::Error) -> Self {
        // Strip URLs from the transport error: the message travels back to
        // the caller and must not expose local configuration.
        DatasetError::Unavailable(err.without_url().to_string())
    }
}
