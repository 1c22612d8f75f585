//! Raster image edits.
//!
//! Every function here takes a decoded image and returns a new one; the
//! byte-level entry points are [`decode`] and [`encode`].

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};

use doceditor_core::error::AppError;
use doceditor_core::result::AppResult;

/// Decode image bytes of any supported format.
pub fn decode(data: &[u8]) -> AppResult<DynamicImage> {
    if data.is_empty() {
        return Err(AppError::invalid_operation("Empty image data"));
    }
    image::load_from_memory(data)
        .map_err(|e| AppError::invalid_operation(format!("Failed to decode image: {e}")))
}

/// Encode an image in the format implied by `ext`.
///
/// JPEG output is always RGB; GIF and WebP output is RGBA.
pub fn encode(img: &DynamicImage, ext: &str) -> AppResult<Vec<u8>> {
    let format = ImageFormat::from_extension(ext)
        .ok_or_else(|| AppError::unsupported_type(format!("No image encoder for .{ext}")))?;

    let converted = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        ImageFormat::Gif | ImageFormat::WebP => DynamicImage::ImageRgba8(img.to_rgba8()),
        ImageFormat::Bmp if img.color().has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
        ImageFormat::Bmp => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img.clone(),
    };

    let mut buf = Vec::new();
    converted
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| AppError::internal(format!("Failed to encode {ext} image: {e}")))?;
    Ok(buf)
}

/// Cut out the box `[left, right) x [top, bottom)`.
pub fn crop(img: &DynamicImage, left: u32, top: u32, right: u32, bottom: u32) -> AppResult<DynamicImage> {
    let (width, height) = img.dimensions();
    if left >= right || top >= bottom {
        return Err(AppError::invalid_operation(format!(
            "Empty crop box ({left}, {top}, {right}, {bottom})"
        )));
    }
    if right > width || bottom > height {
        return Err(AppError::invalid_operation(format!(
            "Crop box ({left}, {top}, {right}, {bottom}) exceeds image size {width}x{height}"
        )));
    }
    Ok(img.crop_imm(left, top, right - left, bottom - top))
}

/// Resize to exactly `width` x `height` with a Lanczos filter.
pub fn resize(img: &DynamicImage, width: u32, height: u32) -> AppResult<DynamicImage> {
    if width == 0 || height == 0 {
        return Err(AppError::invalid_operation(format!(
            "Invalid target size {width}x{height}"
        )));
    }
    Ok(img.resize_exact(width, height, FilterType::Lanczos3))
}

/// Rotate clockwise by `angle` degrees, growing the canvas to fit.
///
/// Right angles are lossless; other angles are resampled bilinearly and
/// the uncovered corners are transparent.
pub fn rotate(img: &DynamicImage, angle: f32) -> AppResult<DynamicImage> {
    if !angle.is_finite() {
        return Err(AppError::invalid_operation("Rotation angle must be finite"));
    }
    let normalized = angle.rem_euclid(360.0);
    let rotated = match normalized {
        a if a == 0.0 => img.clone(),
        a if a == 90.0 => img.rotate90(),
        a if a == 180.0 => img.rotate180(),
        a if a == 270.0 => img.rotate270(),
        a => DynamicImage::ImageRgba8(rotate_free(&img.to_rgba8(), a)),
    };
    Ok(rotated)
}

fn rotate_free(src: &RgbaImage, degrees: f32) -> RgbaImage {
    let theta = (degrees as f64).to_radians();
    let (sin, cos) = theta.sin_cos();
    let (w, h) = (src.width() as f64, src.height() as f64);

    let out_w = (w * cos.abs() + h * sin.abs()).round().max(1.0) as u32;
    let out_h = (w * sin.abs() + h * cos.abs()).round().max(1.0) as u32;
    let (ocx, ocy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);
    let (icx, icy) = (w / 2.0, h / 2.0);

    RgbaImage::from_fn(out_w, out_h, |x, y| {
        let dx = x as f64 + 0.5 - ocx;
        let dy = y as f64 + 0.5 - ocy;
        // inverse of a clockwise turn in y-down coordinates
        let sx = dx * cos + dy * sin + icx - 0.5;
        let sy = -dx * sin + dy * cos + icy - 0.5;
        sample_bilinear(src, sx, sy)
    })
}

fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = (src.width() as i64, src.height() as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let fetch = |px: i64, py: i64| -> [f64; 4] {
        if px < 0 || py < 0 || px >= w || py >= h {
            return [0.0; 4];
        }
        let p = src.get_pixel(px as u32, py as u32).0;
        // premultiplied so transparent neighbours do not darken edges
        let a = p[3] as f64 / 255.0;
        [p[0] as f64 * a, p[1] as f64 * a, p[2] as f64 * a, p[3] as f64]
    };

    let tl = fetch(x0, y0);
    let tr = fetch(x0 + 1, y0);
    let bl = fetch(x0, y0 + 1);
    let br = fetch(x0 + 1, y0 + 1);

    let mut out = [0.0f64; 4];
    for c in 0..4 {
        let top = tl[c] * (1.0 - fx) + tr[c] * fx;
        let bottom = bl[c] * (1.0 - fx) + br[c] * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }

    let alpha = out[3];
    if alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let unpremultiply = 255.0 / alpha;
    Rgba([
        clamp_u8(out[0] * unpremultiply),
        clamp_u8(out[1] * unpremultiply),
        clamp_u8(out[2] * unpremultiply),
        clamp_u8(alpha),
    ])
}

/// Apply brightness, contrast and saturation factors, in that order.
///
/// A factor of 1.0 leaves the image unchanged, 0.0 yields black, a flat
/// mean-gray image and a grayscale image respectively.
pub fn adjust(img: &DynamicImage, brightness: f32, contrast: f32, saturation: f32) -> AppResult<DynamicImage> {
    for (name, value) in [
        ("brightness", brightness),
        ("contrast", contrast),
        ("saturation", saturation),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::invalid_operation(format!(
                "Invalid {name} factor {value}: must be a non-negative number"
            )));
        }
    }

    let mut rgba = img.to_rgba8();

    if brightness != 1.0 {
        let f = brightness as f64;
        for p in rgba.pixels_mut() {
            for c in 0..3 {
                p.0[c] = clamp_u8(p.0[c] as f64 * f);
            }
        }
    }

    if contrast != 1.0 {
        let f = contrast as f64;
        let mean = mean_luma(&rgba);
        for p in rgba.pixels_mut() {
            for c in 0..3 {
                p.0[c] = clamp_u8(mean + (p.0[c] as f64 - mean) * f);
            }
        }
    }

    if saturation != 1.0 {
        let f = saturation as f64;
        for p in rgba.pixels_mut() {
            let l = luma(p);
            for c in 0..3 {
                p.0[c] = clamp_u8(l + (p.0[c] as f64 - l) * f);
            }
        }
    }

    Ok(restore_color_type(img, DynamicImage::ImageRgba8(rgba)))
}

/// Alpha-composite `overlay` on top of the image, stretching it to the
/// image size when they differ.
pub fn annotate(img: &DynamicImage, overlay: &RgbaImage) -> AppResult<DynamicImage> {
    let mut base = img.to_rgba8();
    let overlay = if overlay.dimensions() == base.dimensions() {
        overlay.clone()
    } else {
        imageops::resize(overlay, base.width(), base.height(), FilterType::Lanczos3)
    };
    imageops::overlay(&mut base, &overlay, 0, 0);
    Ok(DynamicImage::ImageRgba8(base))
}

/// Keep grayscale and opaque sources in their narrower color type.
fn restore_color_type(original: &DynamicImage, edited: DynamicImage) -> DynamicImage {
    match original {
        DynamicImage::ImageLuma8(_) => DynamicImage::ImageLuma8(edited.to_luma8()),
        DynamicImage::ImageRgb8(_) => DynamicImage::ImageRgb8(edited.to_rgb8()),
        _ => edited,
    }
}

fn luma(p: &Rgba<u8>) -> f64 {
    (299.0 * p.0[0] as f64 + 587.0 * p.0[1] as f64 + 114.0 * p.0[2] as f64) / 1000.0
}

fn mean_luma(img: &RgbaImage) -> f64 {
    let count = (img.width() as u64 * img.height() as u64).max(1);
    let total: f64 = img.pixels().map(luma).sum();
    (total / count as f64).round()
}

pub(crate) fn clamp_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
