//! Capture backend traits and implementations
//!
//! The capture loop never talks to the windowing system directly. It goes
//! through two narrow seams:
//!
//! - [`CaptureFacade`]: find the reader window and grab its pixels
//! - [`InputDriver`]: move the pointer and click, read the cursor position
//!
//! [`MockBackend`] implements both for tests. With the `desktop` feature,
//! `DesktopBackend` implements both on top of xcap and enigo.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{CaptureError, CaptureResult},
    model::{Point, WindowInfo, WindowSelector},
};

pub mod constants;
pub mod image_buffer;
pub mod matching;
pub mod mock;

#[cfg(feature = "desktop")]
pub mod desktop_backend;

#[cfg(feature = "desktop")]
pub use desktop_backend::DesktopBackend;
pub use image_buffer::ImageBuffer;
pub use mock::MockBackend;

/// Window discovery and screen capture
///
/// Implementations must be thread-safe (`Send + Sync`): the capture loop runs
/// on a background task while the foreground may list windows.
#[async_trait]
pub trait CaptureFacade: Send + Sync {
    /// Lists all windows the backend can see, with their current bounds
    ///
    /// # Errors
    ///
    /// - [`CaptureError::BackendNotAvailable`] - the window list cannot be read
    async fn list_windows(&self) -> CaptureResult<Vec<WindowInfo>>;

    /// Finds the window matching `selector`, with its current bounds
    ///
    /// Called once per loop iteration so that window movement between pages
    /// is picked up. The default implementation lists windows and applies
    /// [`matching::select_window`].
    ///
    /// # Errors
    ///
    /// - [`CaptureError::WindowNotFound`] - no window matches
    async fn locate_window(&self, selector: &WindowSelector) -> CaptureResult<WindowInfo> {
        let windows = self.list_windows().await?;
        matching::select_window(selector, &windows)
            .cloned()
            .ok_or_else(|| CaptureError::WindowNotFound {
                selector: selector.clone(),
            })
    }

    /// Captures the region of the screen covered by `window`
    ///
    /// # Errors
    ///
    /// - [`CaptureError::CaptureFailed`] - the backend could not grab pixels
    /// - [`CaptureError::WindowNotFound`] - the window disappeared
    async fn capture_window(&self, window: &WindowInfo) -> CaptureResult<ImageBuffer>;
}

/// Pointer control
#[async_trait]
pub trait InputDriver: Send + Sync {
    /// Moves the pointer to `point` and clicks the primary button
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InputFailed`] - the click could not be delivered
    async fn click(&self, point: Point) -> CaptureResult<()>;

    /// Returns the current pointer position in absolute screen coordinates
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InputFailed`] - the position cannot be read
    async fn cursor_position(&self) -> CaptureResult<Point>;
}

/// Creates the platform backend for this build
///
/// Returns the same backend behind both seams.
///
/// # Errors
///
/// - [`CaptureError::BackendNotAvailable`] - the crate was built without the
///   `desktop` feature
pub fn create_default_backend() -> CaptureResult<(Arc<dyn CaptureFacade>, Arc<dyn InputDriver>)> {
    #[cfg(feature = "desktop")]
    {
        let backend = Arc::new(DesktopBackend::new());
        let capture: Arc<dyn CaptureFacade> = backend.clone();
        let input: Arc<dyn InputDriver> = backend;
        Ok((capture, input))
    }

    #[cfg(not(feature = "desktop"))]
    {
        Err(CaptureError::BackendNotAvailable {
            reason: "built without the desktop feature".to_string(),
        })
    }
}
