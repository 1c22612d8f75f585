//! Editing rules: accepted upload types and request defaults.

use serde::{Deserialize, Serialize};

/// Editor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Extensions accepted as PDF documents.
    #[serde(default = "default_pdf_extensions")]
    pub pdf_extensions: Vec<String>,
    /// Extensions accepted as raster images.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    /// User label recorded when a caller does not name one.
    #[serde(default = "default_user")]
    pub default_user: String,
    /// Number of audit entries returned when no limit is given.
    #[serde(default = "default_audit_limit")]
    pub audit_default_limit: u32,
}

impl EditorConfig {
    /// Whether `ext` (lowercase, without dot) is an accepted PDF extension.
    pub fn is_pdf_extension(&self, ext: &str) -> bool {
        self.pdf_extensions.iter().any(|e| e == ext)
    }

    /// Whether `ext` (lowercase, without dot) is an accepted image extension.
    pub fn is_image_extension(&self, ext: &str) -> bool {
        self.image_extensions.iter().any(|e| e == ext)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            pdf_extensions: default_pdf_extensions(),
            image_extensions: default_image_extensions(),
            default_user: default_user(),
            audit_default_limit: default_audit_limit(),
        }
    }
}

fn default_pdf_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

fn default_image_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_user() -> String {
    "anonymous".to_string()
}

fn default_audit_limit() -> u32 {
    100
}
