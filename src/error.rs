//! Error types for page capture operations
//!
//! This module defines the error taxonomy shared by the capture loop, the
//! page store, and document assembly. Each error carries enough context for
//! the operator to act on it, and `remediation_hint()` suggests a next step.

use std::path::PathBuf;

use crate::model::WindowSelector;

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error type for page capture operations
///
/// None of these errors are fatal to the process: the loop halts, partial
/// output stays on disk, and a new run can resume from it.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The next-page click location has not been calibrated
    #[error("Next-page button location is not set")]
    CalibrationMissing,

    /// Reader window matching the selector could not be found
    #[error("Window not found: {selector:?}")]
    WindowNotFound {
        /// The selector that failed to match any window
        selector: WindowSelector,
    },

    /// Screen capture of the reader window failed
    #[error("Capture failed: {reason}")]
    CaptureFailed {
        /// Reason reported by the backend
        reason: String,
    },

    /// Simulated input (click, cursor query) failed
    #[error("Input simulation failed: {reason}")]
    InputFailed {
        /// Reason reported by the input driver
        reason: String,
    },

    /// Invalid parameter provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: String,
        /// Reason why it's invalid
        reason:    String,
    },

    /// No desktop backend is available in this build or session
    #[error("Desktop backend is not available: {reason}")]
    BackendNotAvailable {
        /// Why the backend cannot be used
        reason: String,
    },

    /// Image encoding failed
    #[error("Failed to encode image as {format}: {reason}")]
    EncodingFailed {
        /// Image format that failed
        format: String,
        /// Reason for encoding failure
        reason: String,
    },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    ImageError(String),

    /// Building or writing the output document failed
    #[error("Document assembly failed: {reason}")]
    AssemblyFailed {
        /// Reason for the failure
        reason: String,
    },

    /// Assembly was requested but no pages exist
    #[error("No captured pages found in {}", dir.display())]
    NoPages {
        /// Directory that was scanned
        dir: PathBuf,
    },
}

impl CaptureError {
    /// Returns an actionable remediation hint for this error
    ///
    /// # Examples
    ///
    /// ```
    /// use page_capture::error::CaptureError;
    ///
    /// let hint = CaptureError::CalibrationMissing.remediation_hint();
    /// assert!(hint.contains("calibrate"));
    /// ```
    pub fn remediation_hint(&self) -> &str {
        match self {
            CaptureError::CalibrationMissing => {
                "Run the calibrate command (hover over the next-page button and press the \
                 calibration key) or pass --offset DX,DY to run."
            }
            CaptureError::WindowNotFound { .. } => {
                "Open the reader application with your book and make sure the window is visible. \
                 Use list-windows to check the window title and pass it with --title."
            }
            CaptureError::CaptureFailed { .. } => {
                "Screen capture failed. Make sure the reader window is not minimized and that \
                 screen recording is permitted for this program. Already captured pages are kept; \
                 run again to resume."
            }
            CaptureError::InputFailed { .. } => {
                "Click simulation failed. Grant accessibility/input permissions to this program \
                 and make sure no other application grabs the pointer."
            }
            CaptureError::InvalidParameter { parameter, .. } => match parameter.as_str() {
                "delay" => "Delay must be a positive number of milliseconds.",
                "poll_interval" => "Poll interval must be a positive number of milliseconds.",
                "selector" => "Provide at least one window title pattern.",
                _ => "Check the parameter value against the command help.",
            },
            CaptureError::BackendNotAvailable { .. } => {
                "Build with `--features desktop` and run inside a graphical session (DISPLAY or \
                 WAYLAND_DISPLAY set)."
            }
            CaptureError::EncodingFailed { .. } => {
                "Image encoding failed. The capture may be empty; check the crop margins against \
                 the window size."
            }
            CaptureError::IoError(_) => {
                "An I/O error occurred. Check file permissions, disk space, and system resources."
            }
            CaptureError::ImageError(_) => {
                "Image processing failed. A page file may be corrupt; delete it and resume to \
                 recapture it."
            }
            CaptureError::AssemblyFailed { .. } => {
                "The document could not be written. Check the output path and disk space; the \
                 page images are still available for another attempt."
            }
            CaptureError::NoPages { .. } => {
                "Capture some pages first, or point --pages-dir at the directory holding them."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_missing_message() {
        let error = CaptureError::CalibrationMissing;
        assert!(error.to_string().contains("not set"));
        assert!(error.remediation_hint().contains("--offset"));
    }

    #[test]
    fn test_window_not_found_error_message() {
        let error = CaptureError::WindowNotFound {
            selector: WindowSelector::by_title("Bookshelf"),
        };

        let msg = error.to_string();
        assert!(msg.contains("Window not found"));
        assert!(msg.contains("Bookshelf"));
    }

    #[test]
    fn test_window_not_found_remediation() {
        let error = CaptureError::WindowNotFound {
            selector: WindowSelector::default(),
        };

        let hint = error.remediation_hint();
        assert!(hint.contains("list-windows"));
        assert!(hint.contains("--title"));
    }

    #[test]
    fn test_capture_failed_mentions_resume() {
        let error = CaptureError::CaptureFailed {
            reason: "xcap returned an empty frame".to_string(),
        };

        assert!(error.to_string().contains("empty frame"));
        assert!(error.remediation_hint().contains("resume"));
    }

    #[test]
    fn test_invalid_parameter_delay() {
        let error = CaptureError::InvalidParameter {
            parameter: "delay".to_string(),
            reason:    "must be greater than zero".to_string(),
        };

        let msg = error.to_string();
        assert!(msg.contains("Invalid parameter"));
        assert!(msg.contains("delay"));
        assert!(error.remediation_hint().contains("positive"));
    }

    #[test]
    fn test_invalid_parameter_unknown_falls_back() {
        let error = CaptureError::InvalidParameter {
            parameter: "something".to_string(),
            reason:    "bad".to_string(),
        };
        assert!(error.remediation_hint().contains("command help"));
    }

    #[test]
    fn test_backend_not_available_hint() {
        let error = CaptureError::BackendNotAvailable {
            reason: "built without the desktop feature".to_string(),
        };
        assert!(error.to_string().contains("desktop feature"));
        assert!(error.remediation_hint().contains("--features desktop"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: CaptureError = io_error.into();

        assert!(error.to_string().contains("I/O error"));
        assert!(error.remediation_hint().contains("disk space"));
    }

    #[test]
    fn test_no_pages_message_includes_dir() {
        let error = CaptureError::NoPages {
            dir: PathBuf::from("/tmp/book"),
        };
        assert!(error.to_string().contains("/tmp/book"));
    }

    #[test]
    fn test_error_debug_format() {
        let error = CaptureError::AssemblyFailed {
            reason: "disk full".to_string(),
        };
        let debug = format!("{:?}", error);
        assert!(debug.contains("AssemblyFailed"));
    }
}
