//! Decoding of client-rendered overlay payloads (`data:` URLs).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::RgbaImage;

use doceditor_core::error::AppError;
use doceditor_core::result::AppResult;

/// Decode the payload of a base64 `data:` URL.
pub fn decode_data_url(url: &str) -> AppResult<Vec<u8>> {
    let (header, data) = url
        .split_once(',')
        .ok_or_else(|| AppError::invalid_operation("Malformed overlay: missing data URL payload"))?;

    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(AppError::invalid_operation(format!(
            "Malformed overlay: unsupported data URL header '{header}'"
        )));
    }

    STANDARD
        .decode(data.trim())
        .map_err(|e| AppError::invalid_operation(format!("Malformed overlay: {e}")))
}

/// Decode a data URL holding an image into RGBA pixels.
pub fn decode_overlay_image(url: &str) -> AppResult<RgbaImage> {
    let bytes = decode_data_url(url)?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| AppError::invalid_operation(format!("Malformed overlay image: {e}")))?;
    Ok(img.to_rgba8())
}

/// Encode PNG bytes as a `data:image/png;base64,` URL.
pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
