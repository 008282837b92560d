use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] filemap_vector_store::VectorStoreError),

    #[error("Invalid watch root: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}
