//! Relative click calibration
//!
//! The next-page button is stored as an offset from the reader window's
//! top-left corner rather than as an absolute screen position. Every click
//! recomputes the absolute point from the window's current origin, so moving
//! the window between pages does not break the run.

use serde::{Deserialize, Serialize};

use crate::{
    capture::{CaptureFacade, InputDriver},
    error::{CaptureError, CaptureResult},
    model::{Offset, Point, WindowRect, WindowSelector},
};

/// Offset of the next-page button from the window origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    pub offset: Offset,
}

impl Calibration {
    /// Wraps an offset that is already known (e.g. from the command line)
    pub fn from_offset(offset: Offset) -> Self {
        Self { offset }
    }

    /// Absolute click point for a window at its current position
    ///
    /// # Examples
    ///
    /// ```
    /// use page_capture::{
    ///     calibration::Calibration,
    ///     model::{Offset, Point, WindowRect},
    /// };
    ///
    /// let calibration = Calibration::from_offset(Offset::new(900, 400));
    /// let window = WindowRect::new(50, 20, 1280, 800);
    /// assert_eq!(calibration.click_point(&window), Point::new(950, 420));
    /// ```
    pub fn click_point(&self, window: &WindowRect) -> Point {
        window.origin().translate(self.offset)
    }
}

/// Computes the calibration for `anchor`, an absolute screen point
///
/// # Errors
///
/// - [`CaptureError::CalibrationMissing`] - no window has been located yet
pub fn calibrate(anchor: Point, window: Option<&WindowRect>) -> CaptureResult<Calibration> {
    let window = window.ok_or(CaptureError::CalibrationMissing)?;
    let offset = Offset::between(window.origin(), anchor);

    if anchor.x < window.x
        || anchor.y < window.y
        || offset.dx >= window.width as i32
        || offset.dy >= window.height as i32
    {
        tracing::warn!(
            "Calibration point {} lies outside the window at {} ({}x{})",
            anchor,
            window.origin(),
            window.width,
            window.height
        );
    }

    tracing::info!("Next-page button calibrated at offset ({})", offset);
    Ok(Calibration { offset })
}

/// Calibrates from the current cursor position
///
/// Reads the pointer from `input`, locates the reader window through
/// `backend`, and stores the pointer's offset from the window origin.
///
/// # Errors
///
/// - [`CaptureError::CalibrationMissing`] - the reader window is not open
/// - [`CaptureError::InputFailed`] - the cursor position cannot be read
pub async fn calibrate_from_cursor(
    backend: &dyn CaptureFacade,
    input: &dyn InputDriver,
    selector: &WindowSelector,
) -> CaptureResult<Calibration> {
    let anchor = input.cursor_position().await?;
    let window = match backend.locate_window(selector).await {
        Ok(window) => Some(window.rect),
        Err(CaptureError::WindowNotFound { .. }) => {
            tracing::error!("Reader window not found while calibrating");
            None
        }
        Err(e) => return Err(e),
    };

    calibrate(anchor, window.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockBackend;

    #[test]
    fn test_calibrate_computes_offset() {
        let window = WindowRect::new(100, 50, 1280, 800);
        let calibration = calibrate(Point::new(1000, 450), Some(&window)).unwrap();
        assert_eq!(calibration.offset, Offset::new(900, 400));
    }

    #[test]
    fn test_calibrate_without_window_fails() {
        let result = calibrate(Point::new(10, 10), None);
        assert!(matches!(result, Err(CaptureError::CalibrationMissing)));
    }

    #[test]
    fn test_calibrate_outside_window_still_succeeds() {
        let window = WindowRect::new(100, 100, 200, 200);
        let calibration = calibrate(Point::new(50, 400), Some(&window)).unwrap();
        assert_eq!(calibration.offset, Offset::new(-50, 300));
    }

    #[test]
    fn test_click_point_follows_window_movement() {
        let original = WindowRect::new(100, 50, 1280, 800);
        let calibration = calibrate(Point::new(1000, 450), Some(&original)).unwrap();

        let delta = Offset::new(-35, 120);
        let moved = original.moved_by(delta);

        let before = calibration.click_point(&original);
        let after = calibration.click_point(&moved);

        assert_eq!(after, moved.origin().translate(calibration.offset));
        assert_eq!(Offset::between(before, after), delta);
    }

    #[test]
    fn test_click_point_with_extreme_offset_does_not_overflow() {
        let calibration = Calibration::from_offset(Offset::new(i32::MAX, 0));
        let point = calibration.click_point(&WindowRect::new(10, 0, 100, 100));
        assert_eq!(point, Point::new(i32::MAX, 0));
    }

    #[tokio::test]
    async fn test_calibrate_from_cursor() {
        let window = WindowRect::new(200, 100, 1280, 800);
        let backend = MockBackend::new()
            .with_window_rect(window)
            .with_cursor(Point::new(1100, 500));

        let calibration = calibrate_from_cursor(&backend, &backend, &WindowSelector::default())
            .await
            .unwrap();
        assert_eq!(calibration.offset, Offset::new(900, 400));
    }

    #[tokio::test]
    async fn test_calibrate_from_cursor_without_window() {
        let backend = MockBackend::new()
            .without_reader_window()
            .with_cursor(Point::new(1100, 500));

        let result = calibrate_from_cursor(&backend, &backend, &WindowSelector::default()).await;
        assert!(matches!(result, Err(CaptureError::CalibrationMissing)));
    }
}
