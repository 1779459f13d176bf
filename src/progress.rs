//! Capture rate and time-left estimates

use std::{
    fmt,
    time::{Duration, Instant},
};

/// Tracks pages written during one run
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    total:   Option<u32>,
    pages:   u32,
}

/// Progress after a page has been written
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Index of the page just written
    pub index: u32,
    /// Target page count, if any
    pub total: Option<u32>,
    /// Pages per second over this run
    pub rate:  f64,
    /// Estimated time until the target is reached
    pub eta:   Option<Duration>,
}

impl ProgressTracker {
    pub fn new(total: Option<u32>) -> Self {
        Self {
            started: Instant::now(),
            total,
            pages: 0,
        }
    }

    /// Records that page `index` was written
    pub fn record_page(&mut self, index: u32) -> ProgressSnapshot {
        self.pages += 1;
        self.snapshot(index, self.started.elapsed())
    }

    /// Progress at `index` after `elapsed` time in this run
    pub fn snapshot(&self, index: u32, elapsed: Duration) -> ProgressSnapshot {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            f64::from(self.pages) / secs
        } else {
            0.0
        };

        let eta = self.total.and_then(|total| {
            let remaining = total.saturating_sub(index);
            if remaining == 0 {
                Some(Duration::ZERO)
            } else if rate > 0.0 {
                Some(Duration::from_secs_f64(f64::from(remaining) / rate))
            } else {
                None
            }
        });

        ProgressSnapshot {
            index,
            total: self.total,
            rate,
            eta,
        }
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total {
            Some(total) => {
                write!(f, "Page {}/{} ({:.2} p/s", self.index, total, self.rate)?;
                if let Some(eta) = self.eta {
                    let secs = eta.as_secs();
                    write!(f, ", ~{}m{:02}s left", secs / 60, secs % 60)?;
                }
                write!(f, ")")
            }
            None => write!(f, "Page {} captured ({:.2} p/s)", self.index, self.rate),
        }
    }
}
