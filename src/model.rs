//! Data models and type definitions for page-capture
//!
//! This module defines the core types shared by the capture loop and its
//! collaborators:
//! - Screen geometry (points, offsets, window rectangles)
//! - Window metadata and selectors used to find the reader window
//! - Stop reasons and the report returned by a capture run

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Window titles the reader application is known to use
pub const DEFAULT_WINDOW_TITLES: [&str; 3] = ["Bookshelf", "VitalSource", "Vitalsource Bookshelf"];

/// Absolute screen coordinate in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this point shifted by `offset`, clamped to the `i32` range
    pub fn translate(self, offset: Offset) -> Self {
        Self {
            x: self.x.saturating_add(offset.dx),
            y: self.y.saturating_add(offset.dy),
        }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Signed distance between two points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    /// Offset that moves `from` onto `to`
    pub fn between(from: Point, to: Point) -> Self {
        Self {
            dx: to.x.saturating_sub(from.x),
            dy: to.y.saturating_sub(from.y),
        }
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.dx, self.dy)
    }
}

impl std::str::FromStr for Offset {
    type Err = String;

    /// Parses `DX,DY` (whitespace around either number is ignored)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dx, dy) = s
            .split_once(',')
            .ok_or_else(|| format!("expected DX,DY but got '{}'", s))?;
        let dx = dx
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid DX '{}': {}", dx.trim(), e))?;
        let dy = dy
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid DY '{}': {}", dy.trim(), e))?;
        Ok(Self { dx, dy })
    }
}

/// On-screen bounds of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowRect {
    pub x:      i32,
    pub y:      i32,
    pub width:  u32,
    pub height: u32,
}

impl WindowRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left corner of the window
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Returns a copy of this rect moved by `offset`
    pub fn moved_by(&self, offset: Offset) -> Self {
        Self {
            x: self.x.saturating_add(offset.dx),
            y: self.y.saturating_add(offset.dy),
            ..*self
        }
    }
}

/// Identifier of a window as reported by the platform backend
pub type WindowHandle = u32;

/// Metadata about a window that can be captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Platform window identifier
    pub id:        WindowHandle,
    /// Window title
    pub title:     String,
    /// Owning application name
    pub owner:     String,
    /// Owning process ID (0 when unknown)
    pub pid:       u32,
    /// Current on-screen bounds
    pub rect:      WindowRect,
    /// Whether the window is currently minimized
    pub minimized: bool,
}

impl WindowInfo {
    pub fn new(id: WindowHandle, title: impl Into<String>, owner: impl Into<String>, rect: WindowRect) -> Self {
        Self {
            id,
            title: title.into(),
            owner: owner.into(),
            pid: 0,
            rect,
            minimized: false,
        }
    }
}

/// Criteria used to find the reader window
///
/// Title patterns are tried in order; each is matched first as a regex, then
/// as a case-insensitive substring, then fuzzily. When `owner` is set a window
/// must also belong to that application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSelector {
    /// Title patterns, tried in order
    pub titles: Vec<String>,
    /// Optional owning application name (case-insensitive exact match)
    pub owner:  Option<String>,
}

impl WindowSelector {
    /// Selects a window whose title matches `title`
    pub fn by_title(title: impl Into<String>) -> Self {
        Self {
            titles: vec![title.into()],
            owner:  None,
        }
    }

    /// Selects a window by any of the given title patterns
    pub fn by_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            titles: titles.into_iter().map(Into::into).collect(),
            owner:  None,
        }
    }

    /// Restricts the selector to windows owned by `owner`
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

impl Default for WindowSelector {
    /// Matches the known titles of the VitalSource Bookshelf reader
    fn default() -> Self {
        Self::by_titles(DEFAULT_WINDOW_TITLES)
    }
}

/// Why a capture run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// Target page count reached
    Completed,
    /// Kill switch (emergency or backup stop) observed
    Killed,
    /// Reader window could not be located
    WindowLost,
    /// A click did not change the page; the last page has been captured
    EndOfDocument,
    /// Capture, write, or click failed
    Failed,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::Killed => "killed",
            StopReason::WindowLost => "window-lost",
            StopReason::EndOfDocument => "end-of-document",
            StopReason::Failed => "failed",
        }
    }

    /// Whether the run reached the end of the material it was asked to capture
    pub fn is_complete(&self) -> bool {
        matches!(self, StopReason::Completed | StopReason::EndOfDocument)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a capture run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReport {
    /// Number of pages written during this run
    pub pages_captured: u32,
    /// Why the loop stopped
    pub reason:         StopReason,
    /// Index of the first page this run attempted
    pub first_index:    u32,
    /// Index of the last page on disk (0 when none)
    pub final_index:    u32,
    /// Directory holding the page images
    pub pages_dir:      PathBuf,
    /// Error that halted the loop, for `window-lost` and `failed`
    pub error:          Option<String>,
    pub started_at:     DateTime<Utc>,
    pub finished_at:    DateTime<Utc>,
}
