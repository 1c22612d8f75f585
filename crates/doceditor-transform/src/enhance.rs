//! Scan cleanup pipeline for photographed documents.
//!
//! grayscale -> deskew -> unsharp mask -> CLAHE -> adaptive threshold,
//! each stage optional.

use image::imageops;
use image::{DynamicImage, GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::raster::clamp_u8;

/// Largest skew the deskew stage corrects, in degrees.
const MAX_SKEW_DEGREES: f64 = 15.0;
/// Skews below this are left alone.
const MIN_SKEW_DEGREES: f64 = 0.5;
const SKEW_STEP_DEGREES: f64 = 0.5;
/// Longest side used while estimating skew.
const SKEW_ESTIMATE_SIZE: u32 = 1000;

const CLAHE_CLIP_LIMIT: f64 = 2.0;
const CLAHE_GRID: u32 = 8;

/// Gaussian sigma matching a 21px adaptive threshold window.
const THRESHOLD_SIGMA: f32 = 3.5;
const THRESHOLD_OFFSET: f64 = 10.0;

/// Which stages of the pipeline to run. All stages are on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceOptions {
    /// Straighten text lines tilted by 0.5 to 15 degrees.
    #[serde(default = "enabled")]
    pub deskew: bool,
    /// Unsharp mask.
    #[serde(default = "enabled")]
    pub sharpen: bool,
    /// Contrast-limited adaptive histogram equalisation.
    #[serde(default = "enabled")]
    pub contrast: bool,
    /// Binarise with a local Gaussian-mean threshold.
    #[serde(default = "enabled")]
    pub threshold: bool,
}

fn enabled() -> bool {
    true
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            deskew: true,
            sharpen: true,
            contrast: true,
            threshold: true,
        }
    }
}

/// Run the pipeline. The result is always 8-bit grayscale.
pub fn enhance(img: &DynamicImage, options: &EnhanceOptions) -> GrayImage {
    let mut gray = img.to_luma8();
    if options.deskew {
        gray = deskew(&gray);
    }
    if options.sharpen {
        gray = sharpen(&gray);
    }
    if options.contrast {
        gray = clahe(&gray);
    }
    if options.threshold {
        gray = adaptive_threshold(&gray);
    }
    gray
}

/// Straighten the image if its text lines are skewed.
pub fn deskew(gray: &GrayImage) -> GrayImage {
    match estimate_skew(gray) {
        Some(angle) => rotate_about_center(gray, angle),
        None => gray.clone(),
    }
}

/// Skew angle in degrees (positive = lines fall to the right), or `None`
/// when it is too small to correct or cannot be measured.
pub fn estimate_skew(gray: &GrayImage) -> Option<f64> {
    let (w, h) = gray.dimensions();
    if w < 2 || h < 2 {
        return None;
    }

    let sample = if w.max(h) > SKEW_ESTIMATE_SIZE {
        let scale = SKEW_ESTIMATE_SIZE as f64 / w.max(h) as f64;
        let sw = ((w as f64 * scale).round() as u32).max(1);
        let sh = ((h as f64 * scale).round() as u32).max(1);
        imageops::resize(gray, sw, sh, imageops::FilterType::Triangle)
    } else {
        gray.clone()
    };

    let ink: Vec<(f64, f64)> = sample
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] < 128)
        .map(|(x, y, _)| (x as f64, y as f64))
        .collect();
    let total = sample.width() as usize * sample.height() as usize;
    if ink.is_empty() || ink.len() * 2 > total {
        return None;
    }

    let diag = (sample.width() as f64).hypot(sample.height() as f64).ceil() as usize;
    let mut bins = vec![0u64; 2 * diag + 3];
    let steps = (MAX_SKEW_DEGREES / SKEW_STEP_DEGREES).round() as i32;

    let mut best: Option<(f64, u64)> = None;
    // zero first so ties keep the image untouched
    let order = std::iter::once(0).chain((1..=steps).flat_map(|i| [i, -i]));
    for step in order {
        let angle = step as f64 * SKEW_STEP_DEGREES;
        let (sin, cos) = angle.to_radians().sin_cos();
        bins.iter_mut().for_each(|b| *b = 0);
        for &(x, y) in &ink {
            let projected = -x * sin + y * cos;
            let idx = (projected.round() as i64 + diag as i64 + 1) as usize;
            if let Some(bin) = bins.get_mut(idx) {
                *bin += 1;
            }
        }
        let score: u64 = bins.iter().map(|&c| c * c).sum();
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((angle, score));
        }
    }

    let (angle, _) = best?;
    if angle.abs() < MIN_SKEW_DEGREES {
        return None;
    }
    Some(angle)
}

/// Rotate content by `-angle` degrees about the centre, keeping the size
/// and replicating edge pixels into uncovered areas.
fn rotate_about_center(gray: &GrayImage, angle: f64) -> GrayImage {
    let (w, h) = gray.dimensions();
    let (sin, cos) = angle.to_radians().sin_cos();
    let (cx, cy) = ((w as f64 - 1.0) / 2.0, (h as f64 - 1.0) / 2.0);
    let (max_x, max_y) = ((w - 1) as f64, (h - 1) as f64);

    GrayImage::from_fn(w, h, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let sx = (cx + dx * cos - dy * sin).clamp(0.0, max_x);
        let sy = (cy + dx * sin + dy * cos).clamp(0.0, max_y);

        let x0 = sx.floor();
        let y0 = sy.floor();
        let fx = sx - x0;
        let fy = sy - y0;
        let (x0, y0) = (x0 as u32, y0 as u32);
        let x1 = (x0 + 1).min(w - 1);
        let y1 = (y0 + 1).min(h - 1);

        let px = |px: u32, py: u32| gray.get_pixel(px, py).0[0] as f64;
        let top = px(x0, y0) * (1.0 - fx) + px(x1, y0) * fx;
        let bottom = px(x0, y1) * (1.0 - fx) + px(x1, y1) * fx;
        Luma([clamp_u8(top * (1.0 - fy) + bottom * fy)])
    })
}

/// Unsharp mask: `1.5 * g - 0.5 * blur(g, sigma = 2)`.
pub fn sharpen(gray: &GrayImage) -> GrayImage {
    let blurred = imageops::blur(gray, 2.0);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let g = gray.get_pixel(x, y).0[0] as f64;
        let b = blurred.get_pixel(x, y).0[0] as f64;
        Luma([clamp_u8(1.5 * g - 0.5 * b)])
    })
}

/// Contrast-limited adaptive histogram equalisation on an 8x8 tile grid.
pub fn clahe(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let tiles_x = CLAHE_GRID.min(w);
    let tiles_y = CLAHE_GRID.min(h);
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x_start = tx * tile_w;
            let y_start = ty * tile_h;
            let x_end = (x_start + tile_w).min(w);
            let y_end = (y_start + tile_h).min(h);

            let mut hist = [0u64; 256];
            for y in y_start..y_end {
                for x in x_start..x_end {
                    hist[gray.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            let area = (x_end.saturating_sub(x_start) as u64) * (y_end.saturating_sub(y_start) as u64);
            luts[(ty * tiles_x + tx) as usize] = clipped_equalisation(&mut hist, area);
        }
    }

    let centre = |tile: u32, size: u32| tile as f64 * size as f64 + size as f64 / 2.0;
    GrayImage::from_fn(w, h, |x, y| {
        let v = gray.get_pixel(x, y).0[0] as usize;

        let gx = ((x as f64 + 0.5 - tile_w as f64 / 2.0) / tile_w as f64).clamp(0.0, (tiles_x - 1) as f64);
        let gy = ((y as f64 + 0.5 - tile_h as f64 / 2.0) / tile_h as f64).clamp(0.0, (tiles_y - 1) as f64);
        let tx0 = gx.floor() as u32;
        let ty0 = gy.floor() as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let fx = if tx1 > tx0 {
            ((x as f64 + 0.5 - centre(tx0, tile_w)) / tile_w as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let fy = if ty1 > ty0 {
            ((y as f64 + 0.5 - centre(ty0, tile_h)) / tile_h as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f64;
        let top = lut(tx0, ty0) * (1.0 - fx) + lut(tx1, ty0) * fx;
        let bottom = lut(tx0, ty1) * (1.0 - fx) + lut(tx1, ty1) * fx;
        Luma([clamp_u8(top * (1.0 - fy) + bottom * fy)])
    })
}

/// Clip a tile histogram, spread the excess evenly and build the
/// cumulative mapping.
fn clipped_equalisation(hist: &mut [u64; 256], area: u64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    let clip = ((CLAHE_CLIP_LIMIT * area as f64 / 256.0) as u64).max(1);
    let mut excess = 0u64;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }
    let spread = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, count) in hist.iter_mut().enumerate() {
        *count += spread + u64::from(i < remainder);
    }

    let scale = 255.0 / area as f64;
    let mut cumulative = 0u64;
    for (i, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = clamp_u8(cumulative as f64 * scale);
    }
    lut
}

/// Binarise: white where the pixel is brighter than its Gaussian-weighted
/// neighbourhood minus a small offset.
pub fn adaptive_threshold(gray: &GrayImage) -> GrayImage {
    let mean = imageops::blur(gray, THRESHOLD_SIGMA);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let g = gray.get_pixel(x, y).0[0] as f64;
        let m = mean.get_pixel(x, y).0[0] as f64;
        Luma([if g > m - THRESHOLD_OFFSET { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White page with dark horizontal strokes tilted by `angle` degrees.
    fn lined_page(angle: f64) -> GrayImage {
        let (w, h) = (300u32, 200u32);
        let slope = angle.to_radians().tan();
        GrayImage::from_fn(w, h, |x, y| {
            let shifted = y as f64 - x as f64 * slope;
            let on_line = (20..190).step_by(20).any(|row| (shifted - row as f64).abs() < 1.5);
            if on_line && (20..280).contains(&x) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn test_estimate_skew_finds_tilt() {
        let angle = estimate_skew(&lined_page(4.0)).unwrap();
        assert!((angle - 4.0).abs() <= 0.5, "estimated {angle}");
        let angle = estimate_skew(&lined_page(-6.0)).unwrap();
        assert!((angle + 6.0).abs() <= 0.5, "estimated {angle}");
    }

    #[test]
    fn test_straight_page_is_left_alone() {
        let page = lined_page(0.0);
        assert!(estimate_skew(&page).is_none());
        assert_eq!(deskew(&page), page);
        assert!(estimate_skew(&GrayImage::from_pixel(50, 50, Luma([255]))).is_none());
    }

    #[test]
    fn test_deskew_straightens_lines() {
        let straightened = deskew(&lined_page(5.0));
        assert!(estimate_skew(&straightened).is_none());
    }

    #[test]
    fn test_sharpen_keeps_flat_regions() {
        let flat = GrayImage::from_pixel(16, 16, Luma([120]));
        assert_eq!(sharpen(&flat), flat);
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        let dull = GrayImage::from_fn(256, 256, |x, y| Luma([100 + ((x + y) % 21) as u8]));
        let out = clahe(&dull);
        let (min, max) = out
            .pixels()
            .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
        assert!(max - min > 40, "range {min}..{max}");
    }

    #[test]
    fn test_threshold_is_binary() {
        let page = lined_page(0.0);
        let out = adaptive_threshold(&page);
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.get_pixel(100, 40).0[0], 0);
        assert_eq!(out.get_pixel(5, 5).0[0], 255);
    }

    #[test]
    fn test_enhance_defaults_and_partial_options() {
        let img = DynamicImage::ImageLuma8(lined_page(3.0));
        let out = enhance(&img, &EnhanceOptions::default());
        assert_eq!(out.dimensions(), (300, 200));

        let none = EnhanceOptions {
            deskew: false,
            sharpen: false,
            contrast: false,
            threshold: false,
        };
        assert_eq!(enhance(&img, &none), lined_page(3.0));

        let parsed: EnhanceOptions = serde_json::from_str(r#"{"threshold": false}"#).unwrap();
        assert!(parsed.deskew && parsed.sharpen && parsed.contrast && !parsed.threshold);
    }
}
