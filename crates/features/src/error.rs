use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed structured data: {0}")]
    MalformedData(#[from] serde_json::Error),
}
