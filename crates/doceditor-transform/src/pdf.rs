//! PDF page edits, merging, image-to-PDF conversion and overlay stamping.
//!
//! Page indices are zero-based throughout.

use std::collections::BTreeMap;

use image::{DynamicImage, GenericImageView, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::debug;

use doceditor_core::error::AppError;
use doceditor_core::result::AppResult;
use doceditor_entity::annotation::TextOverlay;

/// A4 portrait in points.
pub const A4_WIDTH: f32 = 595.0;
/// A4 portrait in points.
pub const A4_HEIGHT: f32 = 842.0;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

const STANDARD_FONTS: [&str; 14] = [
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Symbol",
    "ZapfDingbats",
];

/// A full-page raster overlay for one page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Zero-based page index.
    pub page: u32,
    /// Pixels stretched over the whole page.
    pub image: RgbaImage,
}

fn load(data: &[u8]) -> AppResult<Document> {
    Document::load_mem(data).map_err(|e| AppError::invalid_operation(format!("Invalid PDF: {e}")))
}

fn save(doc: &mut Document) -> AppResult<Vec<u8>> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| AppError::internal(format!("Failed to write PDF: {e}")))?;
    Ok(buf)
}

fn malformed(e: lopdf::Error) -> AppError {
    AppError::invalid_operation(format!("Malformed PDF structure: {e}"))
}

fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

fn page_at(pages: &[ObjectId], index: u32) -> AppResult<ObjectId> {
    pages.get(index as usize).copied().ok_or_else(|| {
        AppError::invalid_operation(format!(
            "Page index {index} out of range (document has {} pages)",
            pages.len()
        ))
    })
}

/// Look up `key` on the page or the nearest ancestor that defines it.
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // bounded walk; malformed trees may contain Parent cycles
    for _ in 0..64 {
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Copy inherited attributes onto the page so it survives re-parenting.
fn flatten_page(doc: &mut Document, page_id: ObjectId) -> AppResult<()> {
    let missing: Vec<(&[u8], Object)> = {
        let page = doc.get_dictionary(page_id).map_err(malformed)?;
        INHERITABLE
            .iter()
            .filter(|key| !page.has(key))
            .filter_map(|key| inherited(doc, page_id, key).map(|v| (*key, v)))
            .collect()
    };

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(malformed)?;
    for (key, value) in missing {
        page.set(key, value);
    }
    Ok(())
}

fn root_pages_id(doc: &Document) -> AppResult<ObjectId> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(malformed)?;
    doc.get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(malformed)
}

/// Make `pages` the complete, ordered page list under the root Pages node
/// and drop everything no longer reachable.
fn rebuild_page_tree(doc: &mut Document, pages: &[ObjectId]) -> AppResult<()> {
    let root = root_pages_id(doc)?;
    for &page_id in pages {
        flatten_page(doc, page_id)?;
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(malformed)?
            .set("Parent", root);
    }

    let kids: Vec<Object> = pages.iter().map(|&id| Object::Reference(id)).collect();
    let root_dict = doc
        .get_object_mut(root)
        .and_then(Object::as_dict_mut)
        .map_err(malformed)?;
    root_dict.set("Kids", kids);
    root_dict.set("Count", pages.len() as i64);

    doc.prune_objects();
    Ok(())
}

/// Number of pages in a PDF.
pub fn page_count(data: &[u8]) -> AppResult<u32> {
    Ok(load(data)?.get_pages().len() as u32)
}

/// Rotate one page clockwise by `angle`, which must be a multiple of 90.
pub fn rotate_page(data: &[u8], page: u32, angle: i32) -> AppResult<Vec<u8>> {
    if angle % 90 != 0 {
        return Err(AppError::invalid_operation(format!(
            "Rotation angle must be a multiple of 90, got {angle}"
        )));
    }
    let mut doc = load(data)?;
    let page_id = page_at(&page_ids(&doc), page)?;

    let current = inherited(&doc, page_id, b"Rotate")
        .and_then(|r| r.as_i64().ok())
        .unwrap_or(0);
    let rotation = (current + i64::from(angle)).rem_euclid(360);

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(malformed)?
        .set("Rotate", rotation);

    debug!(page, angle, rotation, "Rotated PDF page");
    save(&mut doc)
}

/// Remove one page. The last remaining page cannot be deleted.
pub fn delete_page(data: &[u8], page: u32) -> AppResult<Vec<u8>> {
    let mut doc = load(data)?;
    let mut pages = page_ids(&doc);
    if pages.len() <= 1 {
        return Err(AppError::invalid_operation("Cannot delete the only page"));
    }
    page_at(&pages, page)?;
    pages.remove(page as usize);

    rebuild_page_tree(&mut doc, &pages)?;
    debug!(page, remaining = pages.len(), "Deleted PDF page");
    save(&mut doc)
}

/// Keep exactly the pages listed in `order`, in that order.
///
/// Indices must be distinct and in range; pages not listed are dropped.
pub fn reorder_pages(data: &[u8], order: &[u32]) -> AppResult<Vec<u8>> {
    if order.is_empty() {
        return Err(AppError::invalid_operation("Page order must not be empty"));
    }
    let mut doc = load(data)?;
    let pages = page_ids(&doc);

    let mut seen = vec![false; pages.len()];
    let mut reordered = Vec::with_capacity(order.len());
    for &index in order {
        let page_id = page_at(&pages, index)?;
        if std::mem::replace(&mut seen[index as usize], true) {
            return Err(AppError::invalid_operation(format!(
                "Page index {index} listed more than once"
            )));
        }
        reordered.push(page_id);
    }

    rebuild_page_tree(&mut doc, &reordered)?;
    debug!(pages = reordered.len(), "Reordered PDF pages");
    save(&mut doc)
}

/// Concatenate the pages of several PDFs into a new document.
pub fn merge(sources: &[Vec<u8>]) -> AppResult<Vec<u8>> {
    if sources.is_empty() {
        return Err(AppError::invalid_operation("Nothing to merge"));
    }

    let mut objects = BTreeMap::new();
    let mut pages = Vec::new();
    let mut next_id = 1;

    for data in sources {
        let mut doc = load(data)?;
        for page_id in page_ids(&doc) {
            flatten_page(&mut doc, page_id)?;
        }
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;
        pages.extend(page_ids(&doc));
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    merged.objects = objects;
    merged.max_id = next_id - 1;

    let pages_id = merged.new_object_id();
    for &page_id in &pages {
        merged
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(malformed)?
            .set("Parent", pages_id);
    }
    let kids: Vec<Object> = pages.iter().map(|&id| Object::Reference(id)).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.prune_objects();

    debug!(sources = sources.len(), pages = pages.len(), "Merged PDFs");
    save(&mut merged)
}

/// Lay out one image per A4 page, scaled to fit and centred.
pub fn images_to_pdf(images: &[DynamicImage]) -> AppResult<Vec<u8>> {
    if images.is_empty() {
        return Err(AppError::invalid_operation("No images to convert"));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(images.len());

    for img in images {
        let (iw, ih) = img.dimensions();
        if iw == 0 || ih == 0 {
            return Err(AppError::invalid_operation("Cannot place an empty image"));
        }
        let scale = (A4_WIDTH / iw as f32).min(A4_HEIGHT / ih as f32);
        let (draw_w, draw_h) = (iw as f32 * scale, ih as f32 * scale);
        let (x, y) = ((A4_WIDTH - draw_w) / 2.0, (A4_HEIGHT - draw_h) / 2.0);

        let image_id = add_image_xobject(&mut doc, img);
        let content = Content {
            operations: draw_image_ops("Im0", x, y, draw_w, draw_h),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, encode_content(content)?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), A4_WIDTH.into(), A4_HEIGHT.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    debug!(pages = count, "Converted images to PDF");
    save(&mut doc)
}

/// Stamp text lines and full-page raster overlays onto existing pages.
///
/// Overlays that name a page past the end of the document are skipped.
pub fn apply_overlays(data: &[u8], texts: &[TextOverlay], images: &[PageImage]) -> AppResult<Vec<u8>> {
    for text in texts {
        standard_font(&text.font_name)?;
    }

    let mut doc = load(data)?;
    let pages = page_ids(&doc);

    let mut by_page: BTreeMap<u32, (Vec<&TextOverlay>, Vec<&PageImage>)> = BTreeMap::new();
    for text in texts {
        by_page.entry(text.page).or_default().0.push(text);
    }
    for image in images {
        by_page.entry(image.page).or_default().1.push(image);
    }

    let mut stamped = 0usize;
    for (page, (page_texts, page_images)) in by_page {
        let Some(&page_id) = pages.get(page as usize) else {
            debug!(page, "Skipping overlay for missing page");
            continue;
        };
        stamp_page(&mut doc, page_id, &page_texts, &page_images)?;
        stamped += 1;
    }

    if stamped > 0 {
        doc.compress();
    }
    debug!(pages = stamped, "Applied overlays");
    save(&mut doc)
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    texts: &[&TextOverlay],
    images: &[&PageImage],
) -> AppResult<()> {
    flatten_page(doc, page_id)?;

    let (media_box, mut resources, existing_contents) = {
        let page = doc.get_dictionary(page_id).map_err(malformed)?;
        let media_box = page
            .get(b"MediaBox")
            .ok()
            .and_then(|b| rect(doc, b))
            .unwrap_or([0.0, 0.0, 612.0, 792.0]);
        let resources = resolve_dict(doc, page.get(b"Resources").ok());
        let contents = match page.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
            _ => Vec::new(),
        };
        (media_box, resources, contents)
    };
    let [x0, y0, x1, y1] = media_box;
    let (page_w, page_h) = (x1 - x0, y1 - y0);

    let mut fonts = resolve_dict(doc, resources.get(b"Font").ok());
    let mut xobjects = resolve_dict(doc, resources.get(b"XObject").ok());
    let mut operations = vec![Operation::new("Q", vec![])];

    for (i, image) in images.iter().enumerate() {
        let name = unused_name(&xobjects, "DocEditImg", i);
        let image_id = add_image_xobject(doc, &DynamicImage::ImageRgba8(image.image.clone()));
        xobjects.set(name.as_bytes(), image_id);
        operations.extend(draw_image_ops(&name, x0, y0, page_w, page_h));
    }

    let mut font_names: BTreeMap<&str, String> = BTreeMap::new();
    for text in texts {
        let base_font = standard_font(&text.font_name)?;
        let resource = match font_names.get(base_font) {
            Some(name) => name.clone(),
            None => {
                let name = unused_name(&fonts, "DocEditFont", font_names.len());
                let mut font = dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => base_font,
                };
                if !matches!(base_font, "Symbol" | "ZapfDingbats") {
                    font.set("Encoding", "WinAnsiEncoding");
                }
                let font_id = doc.add_object(font);
                fonts.set(name.as_bytes(), font_id);
                font_names.insert(base_font, name.clone());
                name
            }
        };
        operations.extend(text_ops(text, &resource, x0, y1));
    }

    resources.set("Font", fonts);
    resources.set("XObject", xobjects);

    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let stamp_id = doc.add_object(Stream::new(
        dictionary! {},
        encode_content(Content { operations })?,
    ));

    let mut contents = Vec::with_capacity(existing_contents.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing_contents);
    contents.push(Object::Reference(stamp_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(malformed)?;
    page.set("Resources", resources);
    page.set("Contents", contents);
    Ok(())
}

fn text_ops(text: &TextOverlay, font: &str, left: f32, top: f32) -> Vec<Operation> {
    let [r, g, b] = text.color.map(|c| if c > 1.0 { c / 255.0 } else { c });
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), text.font_size.into()]),
        Operation::new("rg", vec![r.into(), g.into(), b.into()]),
        // overlay y is measured from the top edge
        Operation::new("Td", vec![(left + text.x).into(), (top - text.y).into()]),
        Operation::new("Tj", vec![Object::string_literal(win_ansi(&text.text))]),
        Operation::new("ET", vec![]),
    ]
}

fn draw_image_ops(name: &str, x: f32, y: f32, width: f32, height: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![width.into(), 0.into(), 0.into(), height.into(), x.into(), y.into()],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// Embed raw pixels as an image XObject; transparency becomes a soft mask.
fn add_image_xobject(doc: &mut Document, img: &DynamicImage) -> ObjectId {
    let (width, height) = img.dimensions();
    let (color_space, pixels) = if img.color().has_color() {
        ("DeviceRGB", img.to_rgb8().into_raw())
    } else {
        ("DeviceGray", img.to_luma8().into_raw())
    };

    let mut info = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    };

    if img.color().has_alpha() {
        let alpha: Vec<u8> = img.to_rgba8().pixels().map(|p| p.0[3]).collect();
        if alpha.iter().any(|&a| a != 255) {
            let mask_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(width),
                    "Height" => i64::from(height),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                alpha,
            ));
            info.set("SMask", mask_id);
        }
    }

    doc.add_object(Stream::new(info, pixels))
}

fn encode_content(content: Content) -> AppResult<Vec<u8>> {
    content
        .encode()
        .map_err(|e| AppError::internal(format!("Failed to encode page content: {e}")))
}

fn standard_font(name: &str) -> AppResult<&'static str> {
    STANDARD_FONTS
        .iter()
        .copied()
        .find(|font| font.eq_ignore_ascii_case(name))
        .ok_or_else(|| AppError::invalid_operation(format!("Unsupported font '{name}'")))
}

/// Map text onto single-byte WinAnsi codes, replacing anything else.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0x7e | code @ 0xa0..=0xff => code as u8,
            _ => b'?',
        })
        .collect()
}

fn unused_name(dict: &Dictionary, prefix: &str, start: usize) -> String {
    (start..)
        .map(|i| format!("{prefix}{i}"))
        .find(|name| !dict.has(name.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

fn resolve_dict(doc: &Document, object: Option<&Object>) -> Dictionary {
    match object {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    }
}

fn rect(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let array = match object {
        Object::Array(items) => items.clone(),
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?.clone(),
        _ => return None,
    };
    if array.len() != 4 {
        return None;
    }
    let mut out = [0.0f32; 4];
    for (slot, value) in out.iter_mut().zip(&array) {
        *slot = number(value)?;
    }
    Some(out)
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Luma, Rgba};

    /// A PDF with one A4 page per entry, each page showing a flat gray
    /// square of the given shade so pages can be told apart.
    pub(crate) fn sample_pdf(shades: &[u8]) -> Vec<u8> {
        let images: Vec<DynamicImage> = shades
            .iter()
            .map(|&shade| DynamicImage::ImageLuma8(image::GrayImage::from_pixel(4, 4, Luma([shade]))))
            .collect();
        images_to_pdf(&images).unwrap()
    }

    fn page_shades(data: &[u8]) -> Vec<u8> {
        let doc = load(data).unwrap();
        page_ids(&doc)
            .into_iter()
            .map(|page_id| {
                let resources = resolve_dict(&doc, inherited(&doc, page_id, b"Resources").as_ref());
                let xobjects = resolve_dict(&doc, resources.get(b"XObject").ok());
                let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
                let mut stream = doc.get_object(image_id).unwrap().as_stream().unwrap().clone();
                let _ = stream.decompress();
                stream.content[0]
            })
            .collect()
    }

    fn rotation(data: &[u8], page: u32) -> i64 {
        let doc = load(data).unwrap();
        let page_id = page_ids(&doc)[page as usize];
        inherited(&doc, page_id, b"Rotate")
            .and_then(|r| r.as_i64().ok())
            .unwrap_or(0)
    }

    #[test]
    fn test_images_to_pdf_one_page_per_image() {
        let pdf = sample_pdf(&[10, 20, 30]);
        assert_eq!(page_count(&pdf).unwrap(), 3);
        assert_eq!(page_shades(&pdf), [10, 20, 30]);
        assert!(images_to_pdf(&[]).is_err());
    }

    #[test]
    fn test_rotate_page_accumulates() {
        let pdf = sample_pdf(&[10, 20]);
        let once = rotate_page(&pdf, 0, 90).unwrap();
        assert_eq!(rotation(&once, 0), 90);
        assert_eq!(rotation(&once, 1), 0);

        let twice = rotate_page(&once, 0, 270).unwrap();
        assert_eq!(rotation(&twice, 0), 0);
        let back = rotate_page(&pdf, 1, -90).unwrap();
        assert_eq!(rotation(&back, 1), 270);

        assert!(rotate_page(&pdf, 0, 45).is_err());
        assert!(rotate_page(&pdf, 2, 90).is_err());
    }

    #[test]
    fn test_delete_page() {
        let pdf = sample_pdf(&[10, 20, 30]);
        let out = delete_page(&pdf, 1).unwrap();
        assert_eq!(page_shades(&out), [10, 30]);

        let err = delete_page(&pdf, 3).unwrap_err();
        assert_eq!(err.kind, doceditor_core::error::ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_cannot_delete_only_page() {
        let pdf = sample_pdf(&[10]);
        let err = delete_page(&pdf, 0).unwrap_err();
        assert_eq!(err.kind, doceditor_core::error::ErrorKind::InvalidOperation);
        assert!(err.message.contains("only page"));
    }

    #[test]
    fn test_reorder_pages() {
        let pdf = sample_pdf(&[10, 20, 30]);
        let out = reorder_pages(&pdf, &[2, 0, 1]).unwrap();
        assert_eq!(page_shades(&out), [30, 10, 20]);

        let subset = reorder_pages(&pdf, &[1]).unwrap();
        assert_eq!(page_shades(&subset), [20]);

        assert!(reorder_pages(&pdf, &[]).is_err());
        assert!(reorder_pages(&pdf, &[0, 0]).is_err());
        assert!(reorder_pages(&pdf, &[0, 3]).is_err());
    }

    #[test]
    fn test_merge_concatenates_pages() {
        let a = sample_pdf(&[10, 20]);
        let b = sample_pdf(&[30]);
        let merged = merge(&[a, b]).unwrap();
        assert_eq!(page_shades(&merged), [10, 20, 30]);
        assert!(merge(&[]).is_err());
    }

    #[test]
    fn test_apply_overlays_adds_content_and_resources() {
        let pdf = sample_pdf(&[10, 20]);
        let text = TextOverlay {
            page: 0,
            text: "Approved".to_string(),
            x: 50.0,
            y: 100.0,
            font_size: 14.0,
            font_name: "Helvetica-Bold".to_string(),
            color: [255.0, 0.0, 0.0],
        };
        let mut pixels = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        pixels.put_pixel(1, 1, Rgba([0, 0, 255, 255]));
        let stamp = PageImage { page: 1, image: pixels };
        let skipped = PageImage {
            page: 9,
            image: RgbaImage::new(1, 1),
        };

        let out = apply_overlays(&pdf, &[text], &[stamp, skipped]).unwrap();
        assert_eq!(page_count(&out).unwrap(), 2);

        let doc = load(&out).unwrap();
        let pages = page_ids(&doc);
        let first = doc.get_dictionary(pages[0]).unwrap();
        let fonts = resolve_dict(&doc, resolve_dict(&doc, first.get(b"Resources").ok()).get(b"Font").ok());
        assert!(fonts.has(b"DocEditFont0"));

        let content = doc.get_page_content(pages[0]).unwrap();
        let text_ops = Content::decode(&content).unwrap();
        assert!(text_ops.operations.iter().any(|op| op.operator == "Tj"));
        let td = text_ops.operations.iter().find(|op| op.operator == "Td").unwrap();
        assert_eq!(number(&td.operands[1]), Some(A4_HEIGHT - 100.0));

        let second = doc.get_dictionary(pages[1]).unwrap();
        let xobjects = resolve_dict(&doc, resolve_dict(&doc, second.get(b"Resources").ok()).get(b"XObject").ok());
        let stamp_id = xobjects.get(b"DocEditImg0").unwrap().as_reference().unwrap();
        let stamp = doc.get_object(stamp_id).unwrap().as_stream().unwrap();
        assert!(stamp.dict.has(b"SMask"));
    }

    #[test]
    fn test_apply_overlays_rejects_unknown_font() {
        let pdf = sample_pdf(&[10]);
        let text = TextOverlay {
            page: 0,
            text: "x".to_string(),
            x: 0.0,
            y: 0.0,
            font_size: 12.0,
            font_name: "Comic Sans".to_string(),
            color: [0.0, 0.0, 0.0],
        };
        assert!(apply_overlays(&pdf, &[text], &[]).is_err());
    }

    #[test]
    fn test_win_ansi_replaces_wide_chars() {
        assert_eq!(win_ansi("Café ✓"), b"Caf\xe9 ?".to_vec());
    }
}
