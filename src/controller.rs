//! The capture loop
//!
//! [`CaptureController::run`] drives the capture → crop → persist → click
//! cycle until the target page count is reached or something stops it. The
//! loop reads the shared [`SessionState`](crate::session::SessionState)
//! flags; it never blocks on them, and every wait is a sequence of short
//! sleeps so a stop request is seen within one poll interval.
//!
//! Each iteration:
//!
//! 1. stop requested → `killed`, nothing else happens
//! 2. paused → wait until resumed (or stopped) and start over
//! 3. locate the reader window (one retry after the grace period)
//! 4. capture it and crop the margins
//! 5. persist the crop as the next page (unless it repeats the last one)
//! 6. stop if the target page count is reached
//! 7. click `window origin + calibration offset`, then wait the delay
//!
//! A pause requested after a page is persisted holds back the click that
//! turns past it. Once resumed, the window is located again and the click
//! goes to its current position.

use std::{path::Path, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::time::{Instant, sleep};

use crate::{
    calibration::Calibration,
    capture::{CaptureFacade, ImageBuffer, InputDriver},
    config::CaptureConfig,
    error::{CaptureError, CaptureResult},
    model::{CaptureReport, Point, StopReason, WindowInfo},
    pages::PageStore,
    progress::ProgressTracker,
    session::SessionHandle,
};

/// Runs capture loops against a backend
#[derive(Clone)]
pub struct CaptureController {
    backend: Arc<dyn CaptureFacade>,
    input:   Arc<dyn InputDriver>,
    session: SessionHandle,
}

/// Mutable state of one run
struct RunState {
    /// Next page index to write
    index:       u32,
    pages:       u32,
    previous:    Option<ImageBuffer>,
    last_origin: Option<Point>,
    tracker:     ProgressTracker,
}

type Outcome = (StopReason, Option<String>);

impl CaptureController {
    pub fn new(backend: Arc<dyn CaptureFacade>, input: Arc<dyn InputDriver>, session: SessionHandle) -> Self {
        Self {
            backend,
            input,
            session,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Captures pages into `pages_dir` until done or stopped
    ///
    /// Resumes after the last contiguous page already in `pages_dir`. Halts
    /// caused by the window, the backend or the filesystem are reported in
    /// the returned [`CaptureReport`] rather than as errors; pages written
    /// before the halt are kept.
    ///
    /// # Errors
    ///
    /// The loop does not start when:
    ///
    /// - [`CaptureError::CalibrationMissing`] - no click location is set
    /// - [`CaptureError::InvalidParameter`] - the configuration is invalid
    /// - [`CaptureError::IoError`] - `pages_dir` cannot be created
    pub async fn run(&self, config: &CaptureConfig, pages_dir: &Path) -> CaptureResult<CaptureReport> {
        config.validate()?;
        let calibration = config.calibration.ok_or(CaptureError::CalibrationMissing)?;

        let store = PageStore::new(pages_dir);
        store.ensure_dir()?;
        let first_index = store.resume_index();
        let started_at = Utc::now();

        self.session.set_index(first_index);
        self.session.set_pages_captured(0);

        match config.total_pages {
            Some(total) => tracing::info!(
                "Starting capture at page {} of {} into {}",
                first_index,
                total,
                pages_dir.display()
            ),
            None => tracing::info!(
                "Starting capture at page {} (no page limit) into {}",
                first_index,
                pages_dir.display()
            ),
        }

        let mut run = RunState {
            index:       first_index,
            pages:       0,
            previous:    None,
            last_origin: None,
            tracker:     ProgressTracker::new(config.total_pages),
        };

        let (reason, error) = self.capture_loop(config, &calibration, &store, &mut run).await;

        let report = CaptureReport {
            pages_captured: run.pages,
            reason,
            first_index,
            final_index: run.index - 1,
            pages_dir: pages_dir.to_path_buf(),
            error,
            started_at,
            finished_at: Utc::now(),
        };

        match &report.error {
            Some(error) => tracing::error!(
                "Capture halted ({}) after {} page(s), last page {}: {}",
                report.reason,
                report.pages_captured,
                report.final_index,
                error
            ),
            None => tracing::info!(
                "Capture finished ({}) after {} page(s), last page {}",
                report.reason,
                report.pages_captured,
                report.final_index
            ),
        }

        Ok(report)
    }

    async fn capture_loop(
        &self,
        config: &CaptureConfig,
        calibration: &Calibration,
        store: &PageStore,
        run: &mut RunState,
    ) -> Outcome {
        if Self::target_reached(config, run.index) {
            tracing::info!("All {} pages already captured", run.index - 1);
            return (StopReason::Completed, None);
        }

        if !config.start_delay.is_zero() {
            tracing::info!("Starting in {:.1}s", config.start_delay.as_secs_f64());
        }
        if !self.wait(config.start_delay, config.poll_interval).await {
            return (StopReason::Killed, None);
        }

        loop {
            if self.session.is_stopped() {
                return (StopReason::Killed, None);
            }

            if self.session.is_paused() {
                tracing::info!("Paused before page {}", run.index);
                if !self.wait_while_paused(config.poll_interval).await {
                    return (StopReason::Killed, None);
                }
                continue;
            }

            self.session.set_index(run.index);

            let window = match self.locate(config).await {
                Ok(window) => window,
                Err(e) => return self.halt(e),
            };
            self.note_window_position(run, &window);

            if self.session.is_stopped() {
                return (StopReason::Killed, None);
            }

            let frame = match self.backend.capture_window(&window).await {
                Ok(frame) => frame.crop_margins(&config.margins),
                Err(e) => return self.halt(e),
            };

            if config.stop_on_repeat && run.previous.as_ref().is_some_and(|p| p.same_pixels(&frame)) {
                tracing::info!(
                    "Page {} is identical to page {}; reached the end of the document",
                    run.index,
                    run.index - 1
                );
                return (StopReason::EndOfDocument, None);
            }

            let frame = match Self::persist(store, run.index, frame).await {
                Ok(frame) => frame,
                Err(e) => return self.halt(e),
            };

            run.pages += 1;
            self.session.set_pages_captured(run.pages);
            tracing::info!("{}", run.tracker.record_page(run.index));
            run.previous = Some(frame);
            run.index += 1;

            if Self::target_reached(config, run.index) {
                return (StopReason::Completed, None);
            }

            if self.session.is_stopped() {
                return (StopReason::Killed, None);
            }

            let window = if self.session.is_paused() {
                tracing::info!("Paused after page {}", run.index - 1);
                if !self.wait_while_paused(config.poll_interval).await {
                    return (StopReason::Killed, None);
                }
                match self.locate(config).await {
                    Ok(window) => window,
                    Err(e) => return self.halt(e),
                }
            } else {
                window
            };

            let target = calibration.click_point(&window.rect);
            tracing::debug!("Clicking next page at {} (window at {})", target, window.rect.origin());
            if let Err(e) = self.input.click(target).await {
                return self.halt(e);
            }

            if !self.wait(config.delay, config.poll_interval).await {
                return (StopReason::Killed, None);
            }
        }
    }

    /// Finds the reader window, retrying once after the grace period
    async fn locate(&self, config: &CaptureConfig) -> CaptureResult<WindowInfo> {
        let result = self.backend.locate_window(&config.selector).await;

        let grace = match (&result, config.window_grace) {
            (Err(CaptureError::WindowNotFound { .. }), Some(grace)) => grace,
            _ => return result,
        };

        tracing::warn!("Reader window not found, retrying in {:.1}s", grace.as_secs_f64());
        if !self.wait(grace, config.poll_interval).await {
            return result;
        }

        self.backend.locate_window(&config.selector).await
    }

    /// Writes the page on the blocking pool and hands the frame back
    async fn persist(store: &PageStore, index: u32, frame: ImageBuffer) -> CaptureResult<ImageBuffer> {
        let store = store.clone();
        tokio::task::spawn_blocking(move || store.write_page(index, &frame).map(|_| frame))
            .await
            .map_err(|e| CaptureError::CaptureFailed {
                reason: format!("page writer task failed: {}", e),
            })?
    }

    /// Maps an error that ended the loop to a stop reason
    fn halt(&self, error: CaptureError) -> Outcome {
        if self.session.is_stopped() {
            return (StopReason::Killed, None);
        }

        let reason = match error {
            CaptureError::WindowNotFound { .. } => StopReason::WindowLost,
            _ => StopReason::Failed,
        };
        tracing::error!("{}", error);
        tracing::info!("{}", error.remediation_hint());
        (reason, Some(error.to_string()))
    }

    fn note_window_position(&self, run: &mut RunState, window: &WindowInfo) {
        let origin = window.rect.origin();
        if let Some(last) = run.last_origin {
            if last != origin {
                tracing::debug!("Window moved from {} to {}", last, origin);
            }
        }
        run.last_origin = Some(origin);
    }

    fn target_reached(config: &CaptureConfig, next_index: u32) -> bool {
        config.total_pages.is_some_and(|total| next_index > total)
    }

    /// Sleeps for `duration` in `poll` steps; false if stopped meanwhile
    async fn wait(&self, duration: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.session.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            sleep((deadline - now).min(poll)).await;
        }
    }

    /// Polls until the pause flag clears; false if stopped meanwhile
    async fn wait_while_paused(&self, poll: Duration) -> bool {
        while self.session.is_paused() {
            if self.session.is_stopped() {
                return false;
            }
            sleep(poll).await;
        }
        !self.session.is_stopped()
    }
}
