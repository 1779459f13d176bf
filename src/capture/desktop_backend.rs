//! Desktop backend using xcap + enigo
//!
//! - **Window discovery and capture**: xcap enumerates top-level windows with
//!   their current bounds and grabs a window's pixels.
//! - **Pointer control**: enigo moves the pointer and clicks.
//!
//! Both libraries make synchronous platform calls, so every operation runs
//! inside `tokio::task::spawn_blocking` and is bounded by a timeout.

use std::time::Duration;

use async_trait::async_trait;
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

use super::{CaptureFacade, ImageBuffer, InputDriver};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{Point, WindowInfo, WindowRect, WindowSelector},
};

/// Timeout for window enumeration (1.5s)
const LIST_WINDOWS_TIMEOUT_MS: u64 = 1500;

/// Timeout for a single window capture (2s)
///
/// Large windows on 4K displays can take several hundred milliseconds.
const CAPTURE_WINDOW_TIMEOUT_MS: u64 = 2000;

/// Timeout for a pointer move + click
const INPUT_TIMEOUT_MS: u64 = 1000;

/// Desktop backend for the reader window
///
/// Stateless: xcap and enigo handles are created per call on a blocking
/// thread, so the backend is trivially `Send + Sync`.
#[derive(Debug, Default)]
pub struct DesktopBackend;

impl DesktopBackend {
    pub fn new() -> Self {
        Self
    }

    /// Runs a blocking closure on the blocking pool with a timeout
    async fn run_blocking<F, T>(what: &'static str, timeout_ms: u64, f: F) -> CaptureResult<T>
    where
        F: FnOnce() -> CaptureResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(f);

        match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!("{} task panicked: {}", what, e);
                Err(CaptureError::BackendNotAvailable {
                    reason: format!("{} task panicked: {}", what, e),
                })
            }
            Err(_) => {
                tracing::warn!("{} timed out after {}ms", what, timeout_ms);
                Err(CaptureError::CaptureFailed {
                    reason: format!("{} timed out after {}ms", what, timeout_ms),
                })
            }
        }
    }

    fn window_info(window: &xcap::Window) -> Option<WindowInfo> {
        let id = window.id().ok()?;
        let rect = WindowRect::new(
            window.x().ok()?,
            window.y().ok()?,
            window.width().ok()?,
            window.height().ok()?,
        );

        let mut info = WindowInfo::new(
            id,
            window.title().unwrap_or_default(),
            window.app_name().unwrap_or_default(),
            rect,
        );
        info.pid = window.pid().unwrap_or_default();
        info.minimized = window.is_minimized().unwrap_or(false);
        Some(info)
    }

    fn enigo() -> CaptureResult<Enigo> {
        Enigo::new(&Settings::default()).map_err(|e| CaptureError::InputFailed {
            reason: format!("cannot connect to the input system: {}", e),
        })
    }
}

#[async_trait]
impl CaptureFacade for DesktopBackend {
    async fn list_windows(&self) -> CaptureResult<Vec<WindowInfo>> {
        let windows = Self::run_blocking("list_windows", LIST_WINDOWS_TIMEOUT_MS, || {
            let windows = xcap::Window::all().map_err(|e| {
                tracing::error!("Failed to enumerate xcap windows: {}", e);
                CaptureError::BackendNotAvailable {
                    reason: format!("window enumeration failed: {}", e),
                }
            })?;

            Ok(windows.iter().filter_map(Self::window_info).collect::<Vec<_>>())
        })
        .await?;

        tracing::debug!("Enumerated {} windows", windows.len());
        Ok(windows)
    }

    async fn capture_window(&self, window: &WindowInfo) -> CaptureResult<ImageBuffer> {
        let win_id = window.id;
        let title = window.title.clone();

        let image = Self::run_blocking("capture_window", CAPTURE_WINDOW_TIMEOUT_MS, move || {
            // xcap has no lookup by id, so enumerate and find the match
            let windows = xcap::Window::all().map_err(|e| CaptureError::CaptureFailed {
                reason: format!("window enumeration failed: {}", e),
            })?;

            let target = windows
                .into_iter()
                .find(|w| w.id().ok() == Some(win_id))
                .ok_or_else(|| {
                    tracing::error!("Window {} not found in xcap enumeration", win_id);
                    CaptureError::WindowNotFound {
                        selector: WindowSelector::by_title(title.clone()),
                    }
                })?;

            target.capture_image().map_err(|e| {
                tracing::error!("xcap capture failed for window {}: {}", win_id, e);
                CaptureError::CaptureFailed {
                    reason: e.to_string(),
                }
            })
        })
        .await?;

        tracing::debug!(
            "Captured window {} ({}x{})",
            win_id,
            image.width(),
            image.height()
        );
        Ok(ImageBuffer::from(image))
    }
}

#[async_trait]
impl InputDriver for DesktopBackend {
    async fn click(&self, point: Point) -> CaptureResult<()> {
        Self::run_blocking("click", INPUT_TIMEOUT_MS, move || {
            let mut enigo = Self::enigo()?;
            enigo
                .move_mouse(point.x, point.y, Coordinate::Abs)
                .map_err(|e| CaptureError::InputFailed {
                    reason: format!("move to {} failed: {}", point, e),
                })?;
            enigo
                .button(Button::Left, Direction::Click)
                .map_err(|e| CaptureError::InputFailed {
                    reason: format!("click at {} failed: {}", point, e),
                })
        })
        .await?;

        tracing::debug!("Clicked at {}", point);
        Ok(())
    }

    async fn cursor_position(&self) -> CaptureResult<Point> {
        Self::run_blocking("cursor_position", INPUT_TIMEOUT_MS, || {
            let enigo = Self::enigo()?;
            let (x, y) = enigo.location().map_err(|e| CaptureError::InputFailed {
                reason: format!("cannot read pointer position: {}", e),
            })?;
            Ok(Point::new(x, y))
        })
        .await
    }
}
