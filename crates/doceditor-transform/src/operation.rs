//! The single-file edits that commit a new version.

use serde::{Deserialize, Serialize};

use doceditor_core::error::AppError;
use doceditor_core::result::AppResult;
use doceditor_entity::file::FileType;

use crate::enhance::{self, EnhanceOptions};
use crate::{overlay, pdf, raster};

/// A structural or annotation-baking edit of one file.
///
/// Serialized with an `op` tag, e.g. `{"op": "image_crop", "left": 0, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOperation {
    /// Rotate one PDF page clockwise.
    PdfRotatePage {
        page: u32,
        #[serde(default = "default_page_angle")]
        angle: i32,
    },
    /// Remove one PDF page.
    PdfDeletePage { page: u32 },
    /// Keep the listed PDF pages in the listed order.
    PdfReorderPages { order: Vec<u32> },
    /// Cut an image down to a box.
    ImageCrop {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
    /// Scale an image to an exact size.
    ImageResize { width: u32, height: u32 },
    /// Rotate an image clockwise, growing the canvas.
    ImageRotate {
        #[serde(default = "default_image_angle")]
        angle: f32,
    },
    /// Brightness, contrast and saturation factors.
    ImageAdjust {
        #[serde(default = "unit")]
        brightness: f32,
        #[serde(default = "unit")]
        contrast: f32,
        #[serde(default = "unit")]
        saturation: f32,
    },
    /// Composite a PNG data URL over the image.
    ImageAnnotate { overlay: String },
    /// Scan cleanup of a single image. PDFs are not supported: their pages
    /// would have to be rasterized first. Convert photos of pages with
    /// `images_to_pdf` instead.
    ImageEnhance {
        #[serde(flatten)]
        options: EnhanceOptions,
    },
}

fn default_page_angle() -> i32 {
    90
}

fn default_image_angle() -> f32 {
    90.0
}

fn unit() -> f32 {
    1.0
}

impl EditOperation {
    /// Action name recorded on the version and the audit entry.
    pub fn action(&self) -> &'static str {
        match self {
            Self::PdfRotatePage { .. } => "pdf_rotate_page",
            Self::PdfDeletePage { .. } => "pdf_delete_page",
            Self::PdfReorderPages { .. } => "pdf_reorder_pages",
            Self::ImageCrop { .. } => "image_crop",
            Self::ImageResize { .. } => "image_resize",
            Self::ImageRotate { .. } => "image_rotate",
            Self::ImageAdjust { .. } => "image_adjust",
            Self::ImageAnnotate { .. } => "image_annotate",
            Self::ImageEnhance { .. } => "image_enhance",
        }
    }

    /// The kind of file this edit applies to.
    pub fn target(&self) -> FileType {
        match self {
            Self::PdfRotatePage { .. } | Self::PdfDeletePage { .. } | Self::PdfReorderPages { .. } => {
                FileType::Pdf
            }
            _ => FileType::Image,
        }
    }

    /// Parameters recorded as version details. Overlay payloads are left
    /// out.
    pub fn details(&self) -> serde_json::Value {
        if let Self::ImageAnnotate { .. } = self {
            return serde_json::json!({});
        }
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(map) = value.as_object_mut() {
            map.remove("op");
        }
        value
    }

    /// Fail unless this edit can run on a file of `file_type`.
    pub fn check_target(&self, file_type: FileType) -> AppResult<()> {
        if self.target() == file_type {
            return Ok(());
        }
        let reason = match (self, file_type) {
            (Self::ImageEnhance { .. }, FileType::Pdf) => {
                "; PDF pages cannot be enhanced, enhance the source images and use images_to_pdf"
            }
            _ => "",
        };
        Err(AppError::invalid_operation(format!(
            "{} cannot be applied to a {file_type} file{reason}",
            self.action()
        )))
    }

    /// Run the edit over `source`, producing bytes in the same format.
    ///
    /// `ext` is the file's extension and selects the image encoder.
    pub fn apply(&self, source: &[u8], ext: &str) -> AppResult<Vec<u8>> {
        match self {
            Self::PdfRotatePage { page, angle } => pdf::rotate_page(source, *page, *angle),
            Self::PdfDeletePage { page } => pdf::delete_page(source, *page),
            Self::PdfReorderPages { order } => pdf::reorder_pages(source, order),
            Self::ImageCrop {
                left,
                top,
                right,
                bottom,
            } => {
                let img = raster::decode(source)?;
                raster::encode(&raster::crop(&img, *left, *top, *right, *bottom)?, ext)
            }
            Self::ImageResize { width, height } => {
                let img = raster::decode(source)?;
                raster::encode(&raster::resize(&img, *width, *height)?, ext)
            }
            Self::ImageRotate { angle } => {
                let img = raster::decode(source)?;
                raster::encode(&raster::rotate(&img, *angle)?, ext)
            }
            Self::ImageAdjust {
                brightness,
                contrast,
                saturation,
            } => {
                let img = raster::decode(source)?;
                raster::encode(&raster::adjust(&img, *brightness, *contrast, *saturation)?, ext)
            }
            Self::ImageAnnotate { overlay } => {
                let layer = overlay::decode_overlay_image(overlay)?;
                let img = raster::decode(source)?;
                raster::encode(&raster::annotate(&img, &layer)?, ext)
            }
            Self::ImageEnhance { options } => {
                let img = raster::decode(source)?;
                let enhanced = enhance::enhance(&img, options);
                raster::encode(&image::DynamicImage::ImageLuma8(enhanced), ext)
            }
        }
    }
}
