use crate::error::{Result, VectorStoreError};
use crate::types::Document;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_SNAPSHOT_FILE: &str = "data.json";

/// Ordered, append-only collection of documents.
///
/// Index order is the row order of every matrix derived from the store.
#[derive(Debug, Clone, Default)]
pub struct CorpusStore {
    documents: Vec<Document>,
}

impl CorpusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Reads a snapshot written by [`CorpusStore::save`].
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let documents: Vec<Document> = serde_json::from_slice(&bytes)?;
        Ok(Self { documents })
    }

    /// Overwrites the snapshot at `path` with the whole store.
    ///
    /// The bytes go to a sibling temp file first and are renamed into place,
    /// so readers never see a truncated snapshot.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec(&self.documents)?;
        let tmp = snapshot_tmp_path(&path);
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Appends a document and returns its row index.
    pub fn push(&mut self, document: Document) -> usize {
        self.documents.push(document);
        self.documents.len() - 1
    }

    /// Writes row `i` of `coordinates` into document `i`.
    ///
    /// A matrix that is not `len() × 2` is rejected before anything is written.
    pub fn apply_coordinates(&mut self, coordinates: &Array2<f64>) -> Result<()> {
        if coordinates.nrows() != self.documents.len() {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.documents.len(),
                actual: coordinates.nrows(),
            });
        }
        if coordinates.ncols() != 2 {
            return Err(VectorStoreError::EmbeddingError(format!(
                "expected 2 coordinate columns, got {}",
                coordinates.ncols()
            )));
        }
        for (document, row) in self.documents.iter_mut().zip(coordinates.rows()) {
            document.x = Some(row[0]);
            document.y = Some(row[1]);
        }
        Ok(())
    }

    /// Feature strings in row order.
    #[must_use]
    pub fn features(&self) -> Vec<String> {
        self.documents
            .iter()
            .map(|document| document.features.clone())
            .collect()
    }

    #[must_use]
    pub fn contains_path(&self, path: &str) -> bool {
        self.documents.iter().any(|document| document.path == path)
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<[Document]> {
        Arc::from(self.documents.as_slice())
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[must_use]
pub fn snapshot_tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
