//! # File Map Indexer
//!
//! Keeps the 2-D map of a watched directory current.
//!
//! ## Pipeline
//!
//! ```text
//! new file (startup scan or watcher event)
//!     │
//!     ├──> Feature extraction (per media type)
//!     │      └─> feature string, or a marker on failure
//!     │
//!     ├──> Corpus append (arrival order)
//!     │
//!     ├──> TF-IDF over the whole corpus
//!     ├──> t-SNE over the whole corpus
//!     │      └─> x/y written back row by row
//!     │
//!     ├──> Snapshot (JSON, overwritten)
//!     └──> Broadcast of the full corpus to subscribers
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use filemap_indexer::{MapConfig, MapIndexer};
//!
//! #[tokio::main]
//! async fn main() -> filemap_indexer::Result<()> {
//!     let indexer = MapIndexer::new(MapConfig::new("./data")).await?;
//!     let indexed = indexer.index_existing().await?;
//!
//!     println!("Indexed {indexed} files, {} on the map", indexer.snapshot().len());
//!     Ok(())
//! }
//! ```

mod error;
mod indexer;
mod scanner;
mod stats;
mod watcher;

pub use error::{IndexerError, Result};
pub use indexer::{MapConfig, MapIndexer};
pub use scanner::FileScanner;
pub use stats::{MapUpdate, UpdateStats};
pub use watcher::{StreamingIndexer, StreamingIndexerConfig, WatcherHealth};

pub use filemap_vector_store::{Document, TsneConfig};
