//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::{path::Path, sync::Arc, time::Duration};

use page_capture::{
    calibration::Calibration,
    capture::MockBackend,
    config::{CaptureConfig, CropMargins},
    controller::CaptureController,
    model::{Offset, WindowRect},
    pages::parse_page_index,
    session::SessionHandle,
};

/// Click offset used by every test run
pub const OFFSET: Offset = Offset { dx: 600, dy: 300 };

/// Reader window small enough to keep page files tiny
pub fn small_window() -> WindowRect {
    WindowRect::new(100, 50, 64, 48)
}

/// Calibrated config with no start delay and fast polling
pub fn test_config(pages: u32, delay: Duration) -> CaptureConfig {
    CaptureConfig::builder()
        .calibration(Calibration::from_offset(OFFSET))
        .total_pages(pages)
        .delay(delay)
        .start_delay(Duration::ZERO)
        .poll_interval(Duration::from_millis(5))
        .window_grace(None)
        .margins(CropMargins::none())
        .build()
}

/// Wraps `backend` (resized to [`small_window`]) in a controller
pub fn controller_for(backend: MockBackend, session: &SessionHandle) -> (Arc<MockBackend>, CaptureController) {
    let backend = Arc::new(backend.with_window_rect(small_window()));
    let controller = CaptureController::new(backend.clone(), backend.clone(), session.clone());
    (backend, controller)
}

/// Page indices present in `dir`, sorted
pub fn page_indices(dir: &Path) -> Vec<u32> {
    let mut indices: Vec<u32> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().to_str().and_then(parse_page_index))
                .collect()
        })
        .unwrap_or_default();
    indices.sort_unstable();
    indices
}
