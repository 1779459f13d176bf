//! Capture run configuration
//!
//! [`CaptureConfig`] gathers everything the loop needs from the operator:
//! which window to drive, where to click, how many pages, and how long to
//! wait between pages. Build it with [`CaptureConfig::builder`]; `run`
//! validates it before the first iteration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    calibration::Calibration,
    capture::constants,
    error::{CaptureError, CaptureResult},
    model::WindowSelector,
};

/// Pixels trimmed from each edge of the window capture
///
/// The defaults remove the reader's left sidebar, toolbar, status bar, and
/// right scroll gutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropMargins {
    pub left:   u32,
    pub top:    u32,
    pub right:  u32,
    pub bottom: u32,
}

impl CropMargins {
    /// No trimming
    pub fn none() -> Self {
        Self {
            left:   0,
            top:    0,
            right:  0,
            bottom: 0,
        }
    }
}

impl Default for CropMargins {
    fn default() -> Self {
        Self {
            left:   280,
            top:    80,
            right:  50,
            bottom: 50,
        }
    }
}

impl std::str::FromStr for CropMargins {
    type Err = String;

    /// Parses `LEFT,TOP,RIGHT,BOTTOM`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>().map_err(|e| format!("invalid margin '{}': {}", p.trim(), e)))
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [left, top, right, bottom] => Ok(Self {
                left:   *left,
                top:    *top,
                right:  *right,
                bottom: *bottom,
            }),
            _ => Err(format!("expected LEFT,TOP,RIGHT,BOTTOM but got '{}'", s)),
        }
    }
}

/// Settings for one capture run
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// How to find the reader window
    pub selector:       WindowSelector,
    /// Next-page button position relative to the window origin
    pub calibration:    Option<Calibration>,
    /// Stop after this page index; `None` runs until stopped
    pub total_pages:    Option<u32>,
    /// Wait after each click before the next capture
    pub delay:          Duration,
    /// Chrome trimmed from every capture
    pub margins:        CropMargins,
    /// Countdown before the first capture
    pub start_delay:    Duration,
    /// Granularity of interruptible waits
    pub poll_interval:  Duration,
    /// Wait before retrying a lost window once; `None` gives up immediately
    pub window_grace:   Option<Duration>,
    /// Stop with `end-of-document` when a click leaves the page unchanged
    pub stop_on_repeat: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            selector:       WindowSelector::default(),
            calibration:    None,
            total_pages:    None,
            delay:          Duration::from_millis(constants::DEFAULT_DELAY_MS),
            margins:        CropMargins::default(),
            start_delay:    Duration::from_millis(constants::start_delay_ms()),
            poll_interval:  Duration::from_millis(constants::poll_interval_ms()),
            window_grace:   Some(Duration::from_millis(constants::window_grace_ms())),
            stop_on_repeat: true,
        }
    }
}

impl CaptureConfig {
    /// Creates a builder starting from the defaults
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use page_capture::{calibration::Calibration, config::CaptureConfig, model::Offset};
    ///
    /// let config = CaptureConfig::builder()
    ///     .calibration(Calibration::from_offset(Offset::new(900, 400)))
    ///     .total_pages(120)
    ///     .delay(Duration::from_millis(750))
    ///     .build();
    ///
    /// assert_eq!(config.total_pages, Some(120));
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder::default()
    }

    /// Checks the configuration before a run starts
    ///
    /// # Errors
    ///
    /// - [`CaptureError::CalibrationMissing`] - no click location set
    /// - [`CaptureError::InvalidParameter`] - an out-of-range click offset,
    ///   zero delay or poll interval, or an empty selector
    pub fn validate(&self) -> CaptureResult<()> {
        let Some(calibration) = self.calibration else {
            return Err(CaptureError::CalibrationMissing);
        };

        let offset = calibration.offset;
        let limit = constants::MAX_CLICK_OFFSET;
        if offset.dx.unsigned_abs() > limit.unsigned_abs() || offset.dy.unsigned_abs() > limit.unsigned_abs() {
            return Err(CaptureError::InvalidParameter {
                parameter: "offset".to_string(),
                reason:    format!("{} is further than {} px from the window origin", offset, limit),
            });
        }

        if self.delay.is_zero() {
            return Err(CaptureError::InvalidParameter {
                parameter: "delay".to_string(),
                reason:    "must be greater than zero".to_string(),
            });
        }

        if self.poll_interval.is_zero() {
            return Err(CaptureError::InvalidParameter {
                parameter: "poll_interval".to_string(),
                reason:    "must be greater than zero".to_string(),
            });
        }

        if self.selector.titles.iter().all(|t| t.trim().is_empty()) {
            return Err(CaptureError::InvalidParameter {
                parameter: "selector".to_string(),
                reason:    "no window title pattern given".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for [`CaptureConfig`]
#[derive(Debug, Clone, Default)]
pub struct CaptureConfigBuilder {
    config: CaptureConfig,
}

impl CaptureConfigBuilder {
    pub fn selector(mut self, selector: WindowSelector) -> Self {
        self.config.selector = selector;
        self
    }

    pub fn calibration(mut self, calibration: Calibration) -> Self {
        self.config.calibration = Some(calibration);
        self
    }

    /// Sets the target page count; zero means unbounded
    pub fn total_pages(mut self, pages: u32) -> Self {
        self.config.total_pages = (pages > 0).then_some(pages);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    pub fn margins(mut self, margins: CropMargins) -> Self {
        self.config.margins = margins;
        self
    }

    pub fn start_delay(mut self, start_delay: Duration) -> Self {
        self.config.start_delay = start_delay;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval = poll_interval;
        self
    }

    /// Sets the lost-window grace period; `None` disables the retry
    pub fn window_grace(mut self, grace: Option<Duration>) -> Self {
        self.config.window_grace = grace;
        self
    }

    pub fn stop_on_repeat(mut self, enabled: bool) -> Self {
        self.config.stop_on_repeat = enabled;
        self
    }

    pub fn build(self) -> CaptureConfig {
        self.config
    }
}
