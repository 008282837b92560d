use crate::error::{FeatureError, Result};
use log::{debug, warn};
use mime_guess::mime::{self, Mime};
use std::path::Path;

pub const UNKNOWN_TYPE_MARKER: &str = "Unknown file type";
pub const IMAGE_PREFIX: &str = "Image file: ";
pub const UNSUPPORTED_PREFIX: &str = "Unsupported file type: ";
pub const UNREADABLE_PREFIX: &str = "Unreadable file: ";

const JSON_ESSENCE: &str = "application/json";

/// Media-type classification of a path, decided by its extension only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    Unknown,
    Text,
    Image,
    Json,
    Other(String),
}

impl MediaType {
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match mime_guess::from_path(path.as_ref()).first() {
            Some(guess) => Self::from_mime(&guess),
            None => Self::Unknown,
        }
    }

    fn from_mime(guess: &Mime) -> Self {
        if guess.type_() == mime::TEXT {
            Self::Text
        } else if guess.type_() == mime::IMAGE {
            Self::Image
        } else if guess.essence_str() == JSON_ESSENCE {
            Self::Json
        } else {
            Self::Other(guess.essence_str().to_string())
        }
    }
}

/// Extract the feature string for `path`.
///
/// Fails only when the file cannot be read or a JSON file does not parse.
/// Unknown and unsupported types are regular outcomes, not errors.
pub async fn extract_features(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    match MediaType::from_path(path) {
        MediaType::Unknown => Ok(UNKNOWN_TYPE_MARKER.to_string()),
        MediaType::Text => {
            let bytes = tokio::fs::read(path).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        MediaType::Image => Ok(format!("{IMAGE_PREFIX}{}", display_name(path))),
        MediaType::Json => {
            let bytes = tokio::fs::read(path).await?;
            let value: serde_json::Value = serde_json::from_slice(&bytes)?;
            Ok(serde_json::to_string(&value)?)
        }
        MediaType::Other(essence) => Ok(format!("{UNSUPPORTED_PREFIX}{essence}")),
    }
}

/// Like [`extract_features`], but degrades every failure to a marker string so
/// the document still gets a row in the corpus.
pub async fn features_or_marker(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    match extract_features(path).await {
        Ok(features) => {
            debug!(
                "Extracted {} bytes of features from {}",
                features.len(),
                path.display()
            );
            features
        }
        Err(err) => {
            warn!("Feature extraction failed for {}: {err}", path.display());
            fallback_marker(path, &err)
        }
    }
}

fn fallback_marker(path: &Path, err: &FeatureError) -> String {
    match err {
        FeatureError::MalformedData(_) => format!("{UNSUPPORTED_PREFIX}{JSON_ESSENCE}"),
        FeatureError::IoError(_) => format!("{UNREADABLE_PREFIX}{}", display_name(path)),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(MediaType::from_path("a/notes.txt"), MediaType::Text);
        assert_eq!(MediaType::from_path("photo.PNG"), MediaType::Image);
        assert_eq!(MediaType::from_path("package.json"), MediaType::Json);
        assert_eq!(MediaType::from_path("LICENSE"), MediaType::Unknown);
        assert_eq!(MediaType::from_path("blob.filemapzz"), MediaType::Unknown);
        assert!(matches!(
            MediaType::from_path("archive.bin"),
            MediaType::Other(_)
        ));
    }

    #[tokio::test]
    async fn text_is_decoded_lossily() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        tokio::fs::write(&path, b"quick \xff\xfe brown").await.unwrap();

        let features = extract_features(&path).await.unwrap();
        assert!(features.starts_with("quick "));
        assert!(features.ends_with(" brown"));
    }

    #[tokio::test]
    async fn image_bytes_are_never_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("heron.png");
        tokio::fs::write(&path, [0x89, b'P', b'N', b'G']).await.unwrap();

        let features = extract_features(&path).await.unwrap();
        assert_eq!(features, "Image file: heron.png");
    }

    #[tokio::test]
    async fn json_is_reserialized_compactly_with_sorted_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("package.json");
        tokio::fs::write(&path, "{\n  \"name\": \"grebe\",\n  \"author\": \"ibis\"\n}\n")
            .await
            .unwrap();

        let features = extract_features(&path).await.unwrap();
        assert_eq!(features, r#"{"author":"ibis","name":"grebe"}"#);
    }

    #[tokio::test]
    async fn malformed_json_is_reported_and_marked() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        tokio::fs::write(&path, "{\"name\": ").await.unwrap();

        let err = extract_features(&path).await.unwrap_err();
        assert!(matches!(err, FeatureError::MalformedData(_)));

        let marker = features_or_marker(&path).await;
        assert_eq!(marker, "Unsupported file type: application/json");
    }

    #[tokio::test]
    async fn binary_types_name_the_unsupported_type() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("firmware.bin");
        tokio::fs::write(&path, [0u8, 1, 2, 3]).await.unwrap();

        let features = features_or_marker(&path).await;
        assert!(features.starts_with(UNSUPPORTED_PREFIX), "{features}");
    }

    #[tokio::test]
    async fn unknown_type_does_not_touch_the_file() {
        let features = extract_features("/definitely/missing/README").await.unwrap();
        assert_eq!(features, UNKNOWN_TYPE_MARKER);
    }

    #[tokio::test]
    async fn unreadable_text_degrades_to_marker() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.txt");

        assert!(matches!(
            extract_features(&path).await,
            Err(FeatureError::IoError(_))
        ));
        assert_eq!(features_or_marker(&path).await, "Unreadable file: gone.txt");
    }
}
