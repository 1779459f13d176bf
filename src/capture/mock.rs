//! Mock capture backend for testing
//!
//! This module provides a `MockBackend` implementation of the
//! [`CaptureFacade`] and [`InputDriver`] traits. It simulates a paged reader
//! window without requiring access to a real windowing system: every click
//! turns the page, and every capture returns a frame that encodes the page
//! currently shown.
//!
//! # Features
//!
//! - **Paged Content:** Each page renders a distinct synthetic frame; with a
//!   last page set, clicks past it leave the frame unchanged
//! - **Window Movement:** The window can move by a fixed offset on each click
//! - **Window Loss:** The window can disappear after a number of captures,
//!   for good or for a number of lookups
//! - **Failure Injection:** Fail a specific capture or click
//! - **Hooks:** Run a callback after each click or capture (e.g. to press a
//!   hotkey at a precise point of the loop)
//! - **Recording:** Click points and capture counts are recorded
//!
//! # Examples
//!
//! ```
//! use page_capture::{
//!     capture::{CaptureFacade, InputDriver, MockBackend},
//!     model::{Point, WindowSelector},
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MockBackend::new();
//!
//!     let window = backend.locate_window(&WindowSelector::default()).await.unwrap();
//!     let first = backend.capture_window(&window).await.unwrap();
//!
//!     backend.click(Point::new(900, 400)).await.unwrap();
//!     let second = backend.capture_window(&window).await.unwrap();
//!
//!     assert!(!first.same_pixels(&second));
//!     assert_eq!(backend.clicks(), vec![Point::new(900, 400)]);
//! }
//! ```

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::sleep;

use super::{CaptureFacade, ImageBuffer, InputDriver};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{Offset, Point, WindowInfo, WindowRect},
};

type Hook = Arc<dyn Fn(usize) + Send + Sync>;

/// Mutable part of the simulation
#[derive(Debug)]
struct MockState {
    rect:         WindowRect,
    cursor:       Point,
    clicks:       Vec<Point>,
    captures:     usize,
    lost_lookups: usize,
}

/// Window disappearance script
#[derive(Debug, Clone, Copy)]
struct WindowGap {
    after_captures: usize,
    lookups:        usize,
}

/// Mock capture and input backend for testing
///
/// # Thread Safety
///
/// `MockBackend` is thread-safe and can be shared across tasks using `Arc`.
pub struct MockBackend {
    /// Optional delay to simulate async operation timing
    delay:           Option<Duration>,
    reader_title:    Option<String>,
    other_windows:   Vec<WindowInfo>,
    last_page:       Option<usize>,
    static_content:  bool,
    move_per_click:  Offset,
    window_gap:      Option<WindowGap>,
    fail_capture_at: Option<usize>,
    fail_click_at:   Option<usize>,
    click_hook:      Option<Hook>,
    capture_hook:    Option<Hook>,
    state:           Mutex<MockState>,
}

impl MockBackend {
    /// Reader window id reported by [`list_windows`](CaptureFacade::list_windows)
    pub const READER_WINDOW_ID: u32 = 100;

    /// Creates a backend with a reader window titled "Vitalsource Bookshelf"
    /// at (100, 50), 1280x800, plus two unrelated windows
    pub fn new() -> Self {
        Self {
            delay:           None,
            reader_title:    Some("Vitalsource Bookshelf".to_string()),
            other_windows:   Self::create_other_windows(),
            last_page:       None,
            static_content:  false,
            move_per_click:  Offset::default(),
            window_gap:      None,
            fail_capture_at: None,
            fail_click_at:   None,
            click_hook:      None,
            capture_hook:    None,
            state:           Mutex::new(MockState {
                rect:         WindowRect::new(100, 50, 1280, 800),
                cursor:       Point::new(0, 0),
                clicks:       Vec::new(),
                captures:     0,
                lost_lookups: 0,
            }),
        }
    }

    /// Sets a configurable delay for all async operations
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the reader window's initial bounds
    pub fn with_window_rect(self, rect: WindowRect) -> Self {
        self.update_state(|s| s.rect = rect);
        self
    }

    /// Sets the reader window's title
    pub fn with_reader_title(mut self, title: impl Into<String>) -> Self {
        self.reader_title = Some(title.into());
        self
    }

    /// Removes the reader window entirely
    pub fn without_reader_window(mut self) -> Self {
        self.reader_title = None;
        self
    }

    /// Sets the position reported by [`cursor_position`](InputDriver::cursor_position)
    pub fn with_cursor(self, cursor: Point) -> Self {
        self.update_state(|s| s.cursor = cursor);
        self
    }

    /// Makes `page` the last page; further clicks do not change the frame
    pub fn with_last_page(mut self, page: usize) -> Self {
        self.last_page = Some(page.max(1));
        self
    }

    /// Every capture returns the same frame regardless of clicks
    pub fn with_static_content(mut self) -> Self {
        self.static_content = true;
        self
    }

    /// Moves the reader window by `offset` after every click
    pub fn with_move_per_click(mut self, offset: Offset) -> Self {
        self.move_per_click = offset;
        self
    }

    /// The reader window vanishes for good once `captures` captures are done
    pub fn lose_window_after(mut self, captures: usize) -> Self {
        self.window_gap = Some(WindowGap {
            after_captures: captures,
            lookups:        usize::MAX,
        });
        self
    }

    /// The reader window is missing from the next `lookups` window lists
    /// once `captures` captures are done, then comes back
    pub fn with_window_gap(mut self, captures: usize, lookups: usize) -> Self {
        self.window_gap = Some(WindowGap {
            after_captures: captures,
            lookups,
        });
        self
    }

    /// The `n`-th capture (1-based) fails
    pub fn fail_capture_at(mut self, n: usize) -> Self {
        self.fail_capture_at = Some(n);
        self
    }

    /// The `n`-th click (1-based) fails
    pub fn fail_click_at(mut self, n: usize) -> Self {
        self.fail_click_at = Some(n);
        self
    }

    /// Runs `hook` with the 1-based click count after every successful click
    pub fn with_click_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.click_hook = Some(Arc::new(hook));
        self
    }

    /// Runs `hook` with the 1-based capture count after every successful
    /// capture of the reader window
    pub fn with_capture_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.capture_hook = Some(Arc::new(hook));
        self
    }

    /// Points clicked so far, in order
    pub fn clicks(&self) -> Vec<Point> {
        self.read_state(|s| s.clicks.clone()).unwrap_or_default()
    }

    /// Number of successful captures so far
    pub fn capture_count(&self) -> usize {
        self.read_state(|s| s.captures).unwrap_or_default()
    }

    /// Current bounds of the reader window
    pub fn window_rect(&self) -> WindowRect {
        self.read_state(|s| s.rect)
            .unwrap_or_else(|| WindowRect::new(0, 0, 0, 0))
    }

    fn create_other_windows() -> Vec<WindowInfo> {
        let mut firefox = WindowInfo::new(1, "Mozilla Firefox", "firefox", WindowRect::new(0, 0, 1920, 1080));
        firefox.pid = 1000;
        let mut terminal = WindowInfo::new(2, "Terminal - bash", "gnome-terminal", WindowRect::new(40, 40, 900, 600));
        terminal.pid = 2000;
        vec![firefox, terminal]
    }

    fn read_state<T>(&self, f: impl FnOnce(&MockState) -> T) -> Option<T> {
        self.state.lock().ok().map(|s| f(&s))
    }

    fn update_state(&self, f: impl FnOnce(&mut MockState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    fn lock_state(&self) -> CaptureResult<std::sync::MutexGuard<'_, MockState>> {
        self.state.lock().map_err(|_| CaptureError::BackendNotAvailable {
            reason: "mock backend state poisoned".to_string(),
        })
    }

    /// Applies configured delay if set
    async fn apply_delay(&self) {
        if let Some(duration) = self.delay {
            sleep(duration).await;
        }
    }

    fn reader_window(&self, state: &MockState) -> Option<WindowInfo> {
        self.reader_title.as_ref().map(|title| {
            let mut window = WindowInfo::new(Self::READER_WINDOW_ID, title.clone(), "Bookshelf", state.rect);
            window.pid = 4242;
            window
        })
    }

    /// Page currently shown, 1-based
    fn current_page(&self, state: &MockState) -> usize {
        if self.static_content {
            return 1;
        }
        let page = state.clicks.len() + 1;
        self.last_page.map_or(page, |last| page.min(last))
    }

    /// Whether a lookup right now misses the reader window; consumes one
    /// lookup of an active gap
    fn window_missing(&self, state: &mut MockState) -> bool {
        match self.window_gap {
            Some(gap) if state.captures >= gap.after_captures && state.lost_lookups < gap.lookups => {
                state.lost_lookups += 1;
                true
            }
            _ => false,
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("delay", &self.delay)
            .field("reader_title", &self.reader_title)
            .field("last_page", &self.last_page)
            .field("static_content", &self.static_content)
            .field("move_per_click", &self.move_per_click)
            .field("window_gap", &self.window_gap)
            .field("fail_capture_at", &self.fail_capture_at)
            .field("fail_click_at", &self.fail_click_at)
            .field("click_hook", &self.click_hook.is_some())
            .field("capture_hook", &self.capture_hook.is_some())
            .field("state", &self.state)
            .finish()
    }
}

#[async_trait]
impl CaptureFacade for MockBackend {
    async fn list_windows(&self) -> CaptureResult<Vec<WindowInfo>> {
        self.apply_delay().await;
        let mut state = self.lock_state()?;

        let mut windows = self.other_windows.clone();
        if !self.window_missing(&mut state) {
            windows.extend(self.reader_window(&state));
        }
        Ok(windows)
    }

    async fn capture_window(&self, window: &WindowInfo) -> CaptureResult<ImageBuffer> {
        self.apply_delay().await;
        let mut state = self.lock_state()?;

        if window.id != Self::READER_WINDOW_ID {
            return Ok(ImageBuffer::from_test_pattern(window.rect.width, window.rect.height));
        }

        let attempt = state.captures + 1;
        if self.fail_capture_at == Some(attempt) {
            return Err(CaptureError::CaptureFailed {
                reason: format!("injected failure on capture {}", attempt),
            });
        }

        state.captures = attempt;
        let page = self.current_page(&state);
        let frame = ImageBuffer::from_page_pattern(state.rect.width, state.rect.height, page as u32);
        drop(state);

        if let Some(hook) = &self.capture_hook {
            hook(attempt);
        }
        Ok(frame)
    }
}

#[async_trait]
impl InputDriver for MockBackend {
    async fn click(&self, point: Point) -> CaptureResult<()> {
        self.apply_delay().await;

        let count = {
            let mut state = self.lock_state()?;
            let attempt = state.clicks.len() + 1;
            if self.fail_click_at == Some(attempt) {
                return Err(CaptureError::InputFailed {
                    reason: format!("injected failure on click {}", attempt),
                });
            }
            state.clicks.push(point);
            state.cursor = point;
            state.rect = state.rect.moved_by(self.move_per_click);
            attempt
        };

        if let Some(hook) = &self.click_hook {
            hook(count);
        }
        Ok(())
    }

    async fn cursor_position(&self) -> CaptureResult<Point> {
        self.apply_delay().await;
        Ok(self.lock_state()?.cursor)
    }
}
