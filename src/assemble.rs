//! Page images to PDF
//!
//! Builds one PDF page per captured image, in page-index order. Each page's
//! media box is the image size in points, and the image is embedded as a
//! JPEG (`DCTDecode`) XObject drawn over the whole page.

use std::path::{Path, PathBuf};

use lopdf::{
    Document,
    Object,
    Stream,
    content::{Content, Operation},
    dictionary,
};
use tempfile::NamedTempFile;

use crate::{
    capture::{ImageBuffer, constants},
    error::{CaptureError, CaptureResult},
    model::StopReason,
    pages::PageStore,
    util::encode::encode_jpeg,
};

/// Settings for PDF assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleOptions {
    /// JPEG quality for embedded pages (1-100)
    pub jpeg_quality: u8,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: constants::PDF_JPEG_QUALITY,
        }
    }
}

/// Whether page files should be deleted after a run ending with `reason`
///
/// Pages are only cleaned up once the document is complete; after a stop or
/// a failure they are needed to resume.
pub fn should_clean_pages(reason: StopReason, keep_pages: bool) -> bool {
    reason.is_complete() && !keep_pages
}

/// Assembles the contiguous pages of `store` into `output`
///
/// Returns the number of pages written.
///
/// # Errors
///
/// - [`CaptureError::NoPages`] - the store holds no pages
/// - [`CaptureError::ImageError`] - a page cannot be decoded
/// - [`CaptureError::AssemblyFailed`] - the PDF cannot be built or written
pub fn assemble_store(store: &PageStore, output: &Path, options: &AssembleOptions) -> CaptureResult<usize> {
    let pages = store.list_pages();
    if pages.is_empty() {
        return Err(CaptureError::NoPages {
            dir: store.dir().to_path_buf(),
        });
    }
    assemble_pdf(&pages, output, options)
}

/// Writes `pages` (image files, in order) into a single PDF at `output`
///
/// The file is written through a temporary file next to `output`, so an
/// existing document is only replaced by a complete one.
pub fn assemble_pdf(pages: &[PathBuf], output: &Path, options: &AssembleOptions) -> CaptureResult<usize> {
    if pages.is_empty() {
        return Err(CaptureError::AssemblyFailed {
            reason: "no pages to assemble".to_string(),
        });
    }

    tracing::info!("Assembling {} page(s) into {}", pages.len(), output.display());

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for path in pages {
        let image = image::open(path)
            .map_err(|e| CaptureError::ImageError(format!("{}: {}", path.display(), e)))?;
        let buffer = ImageBuffer::new(image);
        let (width, height) = buffer.dimensions();
        let (width, height) = (i64::from(width), i64::from(height));

        let jpeg = encode_jpeg(&buffer, options.jpeg_quality)?;
        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = doc.add_object(image_stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(height),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content.encode().map_err(|e| CaptureError::AssemblyFailed {
            reason: format!("content stream for {}: {}", path.display(), e),
        })?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im1" => image_id,
                },
            },
        });
        kids.push(page_id.into());

        tracing::debug!("Added {} ({}x{})", path.display(), width, height);
    }

    let count = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    save_atomically(&mut doc, output)?;

    tracing::info!("PDF created: {} ({} pages)", output.display(), count);
    Ok(count)
}

fn save_atomically(doc: &mut Document, output: &Path) -> CaptureResult<()> {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    doc.save_to(&mut tmp).map_err(|e| CaptureError::AssemblyFailed {
        reason: format!("writing {}: {}", output.display(), e),
    })?;
    tmp.persist(output).map_err(|e| CaptureError::IoError(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store_with_sizes(dir: &Path, sizes: &[(u32, u32)]) -> PageStore {
        let store = PageStore::new(dir.join("pages"));
        store.ensure_dir().unwrap();
        for (i, (w, h)) in sizes.iter().enumerate() {
            let index = i as u32 + 1;
            store
                .write_page(index, &ImageBuffer::from_page_pattern(*w, *h, index))
                .unwrap();
        }
        store
    }

    fn media_box(doc: &Document, page_id: lopdf::ObjectId) -> Vec<i64> {
        let page = doc.get_dictionary(page_id).unwrap();
        page.get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_assemble_one_page_per_image_in_order() {
        let dir = TempDir::new().unwrap();
        let store = store_with_sizes(dir.path(), &[(60, 80), (70, 90), (50, 40)]);
        let output = dir.path().join("book.pdf");

        let count = assemble_store(&store, &output, &AssembleOptions::default()).unwrap();
        assert_eq!(count, 3);

        let doc = Document::load(&output).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);

        let boxes: Vec<Vec<i64>> = pages.values().map(|id| media_box(&doc, *id)).collect();
        assert_eq!(boxes, vec![vec![0, 0, 60, 80], vec![0, 0, 70, 90], vec![0, 0, 50, 40]]);
    }

    #[test]
    fn test_assemble_stops_at_gap() {
        let dir = TempDir::new().unwrap();
        let store = store_with_sizes(dir.path(), &[(20, 20), (20, 20), (20, 20)]);
        std::fs::remove_file(store.page_path(2)).unwrap();
        let output = dir.path().join("book.pdf");

        assert_eq!(assemble_store(&store, &output, &AssembleOptions::default()).unwrap(), 1);
    }

    #[test]
    fn test_assemble_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path().join("pages"));
        let output = dir.path().join("book.pdf");

        let result = assemble_store(&store, &output, &AssembleOptions::default());
        assert!(matches!(result, Err(CaptureError::NoPages { .. })));
        assert!(!output.exists());
    }

    #[test]
    fn test_assemble_unreadable_page() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("page_0001.png");
        std::fs::write(&bogus, b"garbage").unwrap();

        let result = assemble_pdf(&[bogus], &dir.path().join("out.pdf"), &AssembleOptions::default());
        assert!(matches!(result, Err(CaptureError::ImageError(_))));
    }

    #[test]
    fn test_assemble_replaces_existing_output() {
        let dir = TempDir::new().unwrap();
        let store = store_with_sizes(dir.path(), &[(30, 30)]);
        let output = dir.path().join("book.pdf");
        std::fs::write(&output, b"old").unwrap();

        assemble_store(&store, &output, &AssembleOptions::default()).unwrap();
        assert_eq!(Document::load(&output).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn test_should_clean_pages() {
        assert!(should_clean_pages(StopReason::Completed, false));
        assert!(should_clean_pages(StopReason::EndOfDocument, false));
        assert!(!should_clean_pages(StopReason::Completed, true));
        assert!(!should_clean_pages(StopReason::Killed, false));
        assert!(!should_clean_pages(StopReason::WindowLost, false));
        assert!(!should_clean_pages(StopReason::Failed, false));
    }
}
