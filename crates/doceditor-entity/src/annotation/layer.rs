//! Per-user annotation layer document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scratch annotations one user keeps on one file, outside the version chain.
///
/// Stored as a JSON document; unknown keys written by clients are preserved
/// in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationLayer {
    /// Owner of the layer.
    #[serde(default)]
    pub user: String,
    /// Last save time, `None` for a layer that was never saved.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Opaque canvas JSON keyed by page index.
    #[serde(default)]
    pub fabric_pages: BTreeMap<u32, serde_json::Value>,
    /// Vector text stamped at export time.
    #[serde(default)]
    pub text_overlays: Vec<TextOverlay>,
    /// Client fields this backend does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AnnotationLayer {
    /// An empty layer for `user`.
    pub fn empty(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    /// Whether the layer carries any annotation.
    pub fn is_empty(&self) -> bool {
        self.fabric_pages.is_empty() && self.text_overlays.is_empty()
    }
}

/// A line of text placed on a PDF page.
///
/// `x`/`y` are in PDF points with `y` measured from the top edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    /// Zero-based page index.
    pub page: u32,
    /// The text to draw.
    pub text: String,
    /// Horizontal offset from the left edge.
    pub x: f32,
    /// Vertical offset from the top edge.
    pub y: f32,
    /// Font size in points.
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// One of the standard PDF fonts.
    #[serde(default = "default_font_name")]
    pub font_name: String,
    /// RGB colour, either 0..=1 or 0..=255 per channel.
    #[serde(default)]
    pub color: [f32; 3],
}

fn default_font_size() -> f32 {
    12.0
}

fn default_font_name() -> String {
    "Helvetica".to_string()
}

/// A client-rendered PNG covering a whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricOverlay {
    /// Zero-based page index.
    pub page: u32,
    /// Layer the PNG was rendered from, if any.
    #[serde(default)]
    pub user: Option<String>,
    /// `data:image/png;base64,...` URL.
    pub png: String,
}
