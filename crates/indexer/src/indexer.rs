use crate::error::{IndexerError, Result};
use crate::scanner::FileScanner;
use crate::stats::{MapUpdate, UpdateStats};
use filemap_features::features_or_marker;
use filemap_vector_store::{
    snapshot_tmp_path, CorpusStore, Document, TfidfVectorizer, TsneConfig, TsneEmbedder,
    DEFAULT_SNAPSHOT_FILE,
};
use log::{debug, error, info, warn};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, watch, Mutex};

const UPDATE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Directory whose files make up the corpus.
    pub root: PathBuf,
    /// Where the full corpus is written after every update.
    pub snapshot_path: PathBuf,
    pub tsne: TsneConfig,
}

impl MapConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_FILE),
            tsne: TsneConfig::default(),
        }
    }

    #[must_use]
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    #[must_use]
    pub const fn with_tsne(mut self, tsne: TsneConfig) -> Self {
        self.tsne = tsne;
        self
    }
}

/// Owns the corpus and runs the extract → vectorize → embed → persist →
/// notify pipeline, one file at a time.
///
/// `update` holds the store lock for the whole run, so concurrent callers are
/// serialized. Readers go through [`MapIndexer::snapshot`], which only ever
/// sees the state published at the end of a completed run.
pub struct MapIndexer {
    root: PathBuf,
    snapshot_path: PathBuf,
    embedder: TsneEmbedder,
    store: Mutex<CorpusStore>,
    snapshot_tx: watch::Sender<Arc<[Document]>>,
    update_tx: broadcast::Sender<MapUpdate>,
}

impl MapIndexer {
    pub async fn new(config: MapConfig) -> Result<Self> {
        let root = tokio::fs::canonicalize(&config.root).await.map_err(|err| {
            IndexerError::InvalidPath(format!("{}: {err}", config.root.display()))
        })?;
        if !tokio::fs::metadata(&root).await?.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "not a directory: {}",
                root.display()
            )));
        }
        let snapshot_path = absolute_path(&config.snapshot_path).await?;

        let empty: Arc<[Document]> = Arc::from(Vec::new());
        let (snapshot_tx, _) = watch::channel(empty);
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Ok(Self {
            root,
            snapshot_path,
            embedder: TsneEmbedder::new(config.tsne),
            store: Mutex::new(CorpusStore::new()),
            snapshot_tx,
            update_tx,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Current corpus, as published by the last completed update.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[Document]> {
        self.snapshot_tx.borrow().clone()
    }

    #[must_use]
    pub fn snapshot_stream(&self) -> watch::Receiver<Arc<[Document]>> {
        self.snapshot_tx.subscribe()
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<MapUpdate> {
        self.update_tx.subscribe()
    }

    /// Snapshot file and its temp sibling; never indexed as corpus files.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        path == self.snapshot_path || path == snapshot_tmp_path(&self.snapshot_path)
    }

    pub async fn is_indexed(&self, file_path: &Path) -> bool {
        let rel_path = match absolute_path(file_path).await {
            Ok(path) => self.relative_path(&path),
            Err(_) => self.relative_path(file_path),
        };
        self.store.lock().await.contains_path(&rel_path)
    }

    /// Appends `file_path` to the corpus and recomputes the whole map.
    ///
    /// Extraction problems never fail the call: the document is indexed with a
    /// marker instead. If vectorizing or embedding fails, the store is left
    /// exactly as it was before the call. A failed snapshot write is logged and
    /// reported in the stats, and subscribers are still notified.
    pub async fn update(&self, file_path: impl AsRef<Path>) -> Result<MapUpdate> {
        let file_path = absolute_path(file_path.as_ref()).await?;
        let file_path = file_path.as_path();
        let mut store = self.store.lock().await;
        let started = Instant::now();
        info!("Updating data for file: {}", file_path.display());

        let features = features_or_marker(file_path).await;
        let title = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rel_path = self.relative_path(file_path);

        let mut next = store.clone();
        next.push(Document::new(title, rel_path.clone(), features));
        debug!("Corpus after append: {} documents", next.len());

        let embedder = self.embedder;
        let corpus_features = next.features();
        let (coordinates, vocabulary) = tokio::task::spawn_blocking(move || {
            let tfidf = TfidfVectorizer::new().fit_transform(&corpus_features);
            embedder
                .embed(tfidf.matrix.view())
                .map(|coords| (coords, tfidf.vocabulary.len()))
        })
        .await
        .map_err(|err| IndexerError::Other(format!("join projection task: {err}")))??;

        next.apply_coordinates(&coordinates)?;
        debug!("Coordinates recomputed for {} documents", next.len());
        *store = next;

        let persisted = match store.save(&self.snapshot_path).await {
            Ok(()) => {
                info!("Data saved to {}", self.snapshot_path.display());
                true
            }
            Err(err) => {
                error!(
                    "Failed to save snapshot {}: {err}",
                    self.snapshot_path.display()
                );
                false
            }
        };

        let documents = store.snapshot();
        self.snapshot_tx.send_replace(documents.clone());

        let stats = UpdateStats {
            path: rel_path,
            documents: documents.len(),
            vocabulary,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            persisted,
        };
        let update = MapUpdate { documents, stats };
        // no receivers is fine
        let _ = self.update_tx.send(update.clone());
        Ok(update)
    }

    /// Indexes every regular file already in the root, in listing order.
    ///
    /// A file that fails is logged and skipped; the rest still get indexed.
    pub async fn index_existing(&self) -> Result<usize> {
        let files = self.scan_existing()?;
        let mut indexed = 0usize;
        for path in files {
            if self.is_indexed(&path).await {
                debug!("Already indexed: {}", path.display());
                continue;
            }
            info!("Processing existing file: {}", path.display());
            match self.update(&path).await {
                Ok(_) => indexed += 1,
                Err(err) => warn!("Error processing existing file {}: {err}", path.display()),
            }
        }
        info!("Finished processing existing files");
        Ok(indexed)
    }

    pub(crate) fn scan_existing(&self) -> Result<Vec<PathBuf>> {
        let files = FileScanner::new(&self.root)
            .exclude(self.snapshot_path.clone())
            .exclude(snapshot_tmp_path(&self.snapshot_path))
            .scan()?;
        Ok(files)
    }

    /// `/`-separated path of `file_path` under the root; paths outside the
    /// root are kept as given. Expects a path already made absolute.
    fn relative_path(&self, file_path: &Path) -> String {
        match file_path.strip_prefix(&self.root) {
            Ok(rel) => rel
                .components()
                .filter_map(|component| match component {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => file_path.to_string_lossy().into_owned(),
        }
    }
}

/// Absolute form of `path` with its parent directory canonicalized, so paths
/// under the root strip cleanly however the caller spelled them.
async fn absolute_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) else {
        return Ok(absolute);
    };
    match tokio::fs::canonicalize(parent).await {
        Ok(parent) => Ok(parent.join(name)),
        Err(_) => Ok(absolute),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn indexer_in(tmp: &TempDir) -> MapIndexer {
        let root = tmp.path().join("data");
        tokio::fs::create_dir_all(&root).await.unwrap();
        MapIndexer::new(MapConfig::new(&root).with_snapshot_path(tmp.path().join("data.json")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn relative_paths_use_forward_slashes() {
        let tmp = TempDir::new().unwrap();
        let indexer = indexer_in(&tmp).await;
        let nested = indexer.root().join("a").join("b.txt");
        assert_eq!(indexer.relative_path(&nested), "a/b.txt");
        assert_eq!(
            indexer.relative_path(Path::new("/elsewhere/c.txt")),
            "/elsewhere/c.txt"
        );
    }

    #[tokio::test]
    async fn snapshot_file_is_excluded() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("data");
        tokio::fs::create_dir_all(&root).await.unwrap();
        let indexer =
            MapIndexer::new(MapConfig::new(&root).with_snapshot_path(root.join("data.json")))
                .await
                .unwrap();
        let snapshot = indexer.snapshot_path().to_path_buf();
        assert!(indexer.is_excluded(&snapshot));
        assert!(indexer.is_excluded(&snapshot_tmp_path(&snapshot)));
        assert!(!indexer.is_excluded(&indexer.root().join("notes.txt")));
    }

    #[tokio::test]
    async fn missing_root_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = MapIndexer::new(MapConfig::new(tmp.path().join("missing")))
            .await
            .err()
            .expect("missing root must fail");
        assert!(matches!(err, IndexerError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn update_is_observed_by_snapshot_stream() {
        let tmp = TempDir::new().unwrap();
        let indexer = indexer_in(&tmp).await;
        let mut stream = indexer.snapshot_stream();
        assert!(stream.borrow_and_update().is_empty());

        let path = indexer.root().join("heron.txt");
        tokio::fs::write(&path, "grey heron walks").await.unwrap();
        indexer.update(&path).await.unwrap();

        assert!(stream.has_changed().unwrap());
        assert_eq!(stream.borrow_and_update().len(), 1);
    }
}
