//! # File Map Features
//!
//! Turns a file path into the text that gets vectorized.
//!
//! ## Dispatch
//!
//! ```text
//! path ──> media type (by extension)
//!            ├─ unknown     ──> "Unknown file type"
//!            ├─ text/*      ──> file contents (lossy UTF-8)
//!            ├─ image/*     ──> "Image file: <name>"
//!            ├─ json        ──> compact canonical JSON
//!            └─ anything    ──> "Unsupported file type: <mime>"
//! ```
//!
//! Every file produces *some* string: the vectorizer needs exactly one input
//! per document, so callers that cannot accept an error use
//! [`features_or_marker`].
//!
//! ## Example
//!
//! ```no_run
//! use filemap_features::features_or_marker;
//!
//! #[tokio::main]
//! async fn main() {
//!     let features = features_or_marker("data/notes.txt").await;
//!     println!("{features}");
//! }
//! ```

mod error;
mod extractor;

pub use error::{FeatureError, Result};
pub use extractor::{
    extract_features, features_or_marker, MediaType, IMAGE_PREFIX, UNKNOWN_TYPE_MARKER,
    UNREADABLE_PREFIX, UNSUPPORTED_PREFIX,
};
