//! Page files on disk
//!
//! Captured pages live in one directory as `page_0001.png`, `page_0002.png`,
//! and so on. Indices are contiguous from 1, so the next index to capture is
//! found by counting: [`resume_index`] walks up from 1 until it hits a
//! missing or unreadable file.
//!
//! Pages are written through a temporary file in the same directory and
//! renamed into place, so an interrupted run never leaves a half-written
//! page that a later scan would accept.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::{
    capture::ImageBuffer,
    error::{CaptureError, CaptureResult},
    util::encode::encode_png,
};

const PAGE_PREFIX: &str = "page_";
const PAGE_EXTENSION: &str = ".png";

/// File name for page `index`
///
/// # Examples
///
/// ```
/// use page_capture::pages::page_file_name;
///
/// assert_eq!(page_file_name(7), "page_0007.png");
/// assert_eq!(page_file_name(12345), "page_12345.png");
/// ```
pub fn page_file_name(index: u32) -> String {
    format!("{}{:04}{}", PAGE_PREFIX, index, PAGE_EXTENSION)
}

/// Page index encoded in a file name, if it is a page file
///
/// Only the canonical spelling counts: `page_7.png` and `page_00007.png` are
/// not page files, since [`page_file_name`] would never produce them.
pub fn parse_page_index(file_name: &str) -> Option<u32> {
    let digits = file_name
        .strip_prefix(PAGE_PREFIX)?
        .strip_suffix(PAGE_EXTENSION)?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse().ok()?;
    (page_file_name(index) == file_name).then_some(index)
}

/// Next unused page index in `dir` (1 when empty or missing)
///
/// Scanning the same directory twice without new captures returns the same
/// index.
pub fn resume_index(dir: &Path) -> u32 {
    PageStore::new(dir).resume_index()
}

/// Sequentially numbered page images in one directory
#[derive(Debug, Clone)]
pub struct PageStore {
    dir: PathBuf,
}

impl PageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the directory if it does not exist yet
    pub fn ensure_dir(&self) -> CaptureResult<()> {
        fs::create_dir_all(&self.dir).map_err(CaptureError::IoError)
    }

    pub fn page_path(&self, index: u32) -> PathBuf {
        self.dir.join(page_file_name(index))
    }

    /// Whether page `index` exists and has a readable image header
    pub fn is_valid_page(&self, index: u32) -> bool {
        let path = self.page_path(index);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => match image::image_dimensions(&path) {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!("Page {} is unreadable and will be recaptured: {}", path.display(), e);
                    false
                }
            },
            _ => false,
        }
    }

    /// Next unused page index
    ///
    /// Page files beyond the first gap are reported and will be overwritten
    /// as the run recaptures them.
    pub fn resume_index(&self) -> u32 {
        let mut index = 1;
        while self.is_valid_page(index) {
            index += 1;
        }

        let stray = self.indices_from(index + 1);
        if !stray.is_empty() {
            tracing::warn!(
                "Page {} is missing but {} later page file(s) exist (first: {}); they will be overwritten",
                index,
                stray.len(),
                page_file_name(stray[0])
            );
        }

        tracing::debug!("Resume index for {}: {}", self.dir.display(), index);
        index
    }

    /// Sorted indices of all page files at or above `start`
    fn indices_from(&self, start: u32) -> Vec<u32> {
        let mut indices: Vec<u32> = self
            .page_entries()
            .into_iter()
            .map(|(index, _)| index)
            .filter(|&i| i >= start)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Page files present in the directory, with the paths they were found at
    fn page_entries(&self) -> Vec<(u32, PathBuf)> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let index = parse_page_index(entry.file_name().to_str()?)?;
                Some((index, entry.path()))
            })
            .collect()
    }

    /// Encodes `image` as PNG and stores it as page `index`
    ///
    /// The file appears atomically: readers see either the previous file or
    /// the complete new one.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::EncodingFailed`] - PNG encoding failed
    /// - [`CaptureError::IoError`] - the directory is not writable
    pub fn write_page(&self, index: u32, image: &ImageBuffer) -> CaptureResult<PathBuf> {
        let bytes = encode_png(image)?;
        let path = self.page_path(index);

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| CaptureError::IoError(e.error))?;

        tracing::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Paths of the contiguous pages 1..resume_index, in order
    pub fn list_pages(&self) -> Vec<PathBuf> {
        (1..self.resume_index()).map(|i| self.page_path(i)).collect()
    }

    /// Deletes every page file and, if it is then empty, the directory
    ///
    /// Returns the number of files removed.
    pub fn clear(&self) -> CaptureResult<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for (_, path) in self.page_entries() {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let is_empty = fs::read_dir(&self.dir)?.next().is_none();
        if is_empty {
            fs::remove_dir(&self.dir)?;
        }

        tracing::info!("Removed {} page file(s) from {}", removed, self.dir.display());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store_with_pages(count: u32) -> (TempDir, PageStore) {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path());
        for i in 1..=count {
            store
                .write_page(i, &ImageBuffer::from_page_pattern(16, 12, i))
                .unwrap();
        }
        (dir, store)
    }

    #[test]
    fn test_page_file_name() {
        assert_eq!(page_file_name(1), "page_0001.png");
        assert_eq!(page_file_name(9999), "page_9999.png");
        assert_eq!(page_file_name(10000), "page_10000.png");
    }

    #[test]
    fn test_parse_page_index() {
        assert_eq!(parse_page_index("page_0001.png"), Some(1));
        assert_eq!(parse_page_index("page_12345.png"), Some(12345));
        assert_eq!(parse_page_index("page_.png"), None);
        assert_eq!(parse_page_index("page_00a1.png"), None);
        assert_eq!(parse_page_index("page_0001.jpg"), None);
        assert_eq!(parse_page_index("cover.png"), None);
    }

    #[test]
    fn test_parse_page_index_requires_canonical_width() {
        assert_eq!(parse_page_index("page_7.png"), None);
        assert_eq!(parse_page_index("page_00001.png"), None);
        assert_eq!(parse_page_index("page_010000.png"), None);
        assert_eq!(parse_page_index("page_10000.png"), Some(10000));
    }

    #[test]
    fn test_resume_index_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resume_index(&dir.path().join("does-not-exist")), 1);
    }

    #[test]
    fn test_resume_index_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resume_index(dir.path()), 1);
    }

    #[test]
    fn test_resume_index_counts_contiguous_pages() {
        for n in [1, 2, 5] {
            let (_dir, store) = store_with_pages(n);
            assert_eq!(store.resume_index(), n + 1);
        }
    }

    #[test]
    fn test_resume_index_is_idempotent() {
        let (_dir, store) = store_with_pages(3);
        assert_eq!(store.resume_index(), 4);
        assert_eq!(store.resume_index(), 4);
    }

    #[test]
    fn test_resume_index_stops_at_gap() {
        let (_dir, store) = store_with_pages(4);
        fs::remove_file(store.page_path(2)).unwrap();
        assert_eq!(store.resume_index(), 2);
    }

    #[test]
    fn test_resume_index_treats_corrupt_page_as_missing() {
        let (_dir, store) = store_with_pages(3);
        fs::write(store.page_path(3), b"not a png").unwrap();
        assert_eq!(store.resume_index(), 3);

        fs::write(store.page_path(3), b"").unwrap();
        assert_eq!(store.resume_index(), 3);
    }

    #[test]
    fn test_resume_index_ignores_other_files() {
        let (_dir, store) = store_with_pages(2);
        fs::write(store.dir().join("notes.txt"), b"hello").unwrap();
        fs::write(store.dir().join("page_0003.jpg"), b"jpeg").unwrap();
        assert_eq!(store.resume_index(), 3);
    }

    #[test]
    fn test_write_page_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path());
        let image = ImageBuffer::from_page_pattern(40, 30, 9);

        let path = store.write_page(1, &image).unwrap();
        assert_eq!(path, dir.path().join("page_0001.png"));

        let decoded = ImageBuffer::new(image::open(&path).unwrap());
        assert!(decoded.same_pixels(&image));
    }

    #[test]
    fn test_write_page_leaves_no_temp_files() {
        let (dir, _store) = store_with_pages(3);
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| parse_page_index(n).is_some()));
    }

    #[test]
    fn test_write_page_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path().join("missing"));
        let result = store.write_page(1, &ImageBuffer::from_test_pattern(8, 8));
        assert!(matches!(result, Err(CaptureError::IoError(_))));
    }

    #[test]
    fn test_list_pages_is_contiguous_and_ordered() {
        let (_dir, store) = store_with_pages(4);
        fs::remove_file(store.page_path(3)).unwrap();

        let pages = store.list_pages();
        assert_eq!(pages, vec![store.page_path(1), store.page_path(2)]);
    }

    #[test]
    fn test_clear_removes_pages_and_empty_dir() {
        let (dir, _) = store_with_pages(0);
        let pages_dir = dir.path().join("pages");
        let store = PageStore::new(&pages_dir);
        store.ensure_dir().unwrap();
        for i in 1..=3 {
            store
                .write_page(i, &ImageBuffer::from_test_pattern(8, 8))
                .unwrap();
        }

        assert_eq!(store.clear().unwrap(), 3);
        assert!(!pages_dir.exists());
        assert_eq!(store.clear().unwrap(), 0);
    }

    #[test]
    fn test_clear_keeps_dir_with_other_files() {
        let (dir, store) = store_with_pages(2);
        fs::write(dir.path().join("keep.txt"), b"x").unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(dir.path().exists());
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn test_clear_with_non_canonical_page_names() {
        let (dir, store) = store_with_pages(2);
        fs::copy(store.page_path(2), dir.path().join("page_7.png")).unwrap();

        assert_eq!(store.resume_index(), 3);
        assert_eq!(store.clear().unwrap(), 2);

        let left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["page_7.png".to_string()]);
    }
}
