//! # File Map Vector Store
//!
//! Corpus state and the two corpus-wide transforms behind the 2-D map.
//!
//! ## Architecture
//!
//! ```text
//! CorpusStore (ordered Document[])
//!     │
//!     ├──> TfidfVectorizer (whole corpus, every insertion)
//!     │      └─> N × |vocabulary| matrix
//!     │
//!     ├──> TsneEmbedder (seeded, perplexity ≤ N-1)
//!     │      └─> N × 2 coordinates, written back row by row
//!     │
//!     └──> Snapshot (JSON array, atomic overwrite)
//! ```
//!
//! Row `i` of every matrix belongs to document `i` of the store. Nothing in
//! this crate reorders documents, and [`CorpusStore::apply_coordinates`]
//! refuses a matrix whose row count disagrees with the store.
//!
//! ## Example
//!
//! ```no_run
//! use filemap_vector_store::{CorpusStore, Document, TfidfVectorizer, TsneEmbedder};
//!
//! #[tokio::main]
//! async fn main() -> filemap_vector_store::Result<()> {
//!     let mut store = CorpusStore::new();
//!     store.push(Document::new("a.txt", "a.txt", "quick brown heron"));
//!     store.push(Document::new("b.txt", "b.txt", "slow grey ibis"));
//!
//!     let tfidf = TfidfVectorizer::new().fit_transform(&store.features());
//!     let coords = TsneEmbedder::default().embed(tfidf.matrix.view())?;
//!     store.apply_coordinates(&coords)?;
//!     store.save("data.json").await?;
//!     Ok(())
//! }
//! ```

mod corpus;
mod error;
mod tfidf;
mod tsne;
mod types;

pub use corpus::{snapshot_tmp_path, CorpusStore, DEFAULT_SNAPSHOT_FILE};
pub use error::{Result, VectorStoreError};
pub use tfidf::{TfidfMatrix, TfidfVectorizer};
pub use tsne::{TsneConfig, TsneEmbedder};
pub use types::Document;
