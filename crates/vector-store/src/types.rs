use serde::{Deserialize, Serialize};

/// One indexed file.
///
/// `x`/`y` stay `None` until the embedder has run at least once after the
/// document was appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub path: String,
    pub features: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl Document {
    pub fn new(
        title: impl Into<String>,
        path: impl Into<String>,
        features: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            features: features.into(),
            x: None,
            y: None,
        }
    }

    #[must_use]
    pub const fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}
