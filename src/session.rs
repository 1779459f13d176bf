//! Shared session flags
//!
//! The capture loop and the foreground (CLI, hotkey listener) communicate
//! through a [`SessionState`] shared behind an `Arc`. Each field has a single
//! writer:
//!
//! - `paused` and `stopped` are written by the foreground
//! - `current_index` and `pages_captured` are written by the loop
//!
//! so plain atomics are enough.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use crate::hotkeys::HotkeyAction;

/// Shared handle to a session
pub type SessionHandle = Arc<SessionState>;

/// Pause / stop flags plus published progress
#[derive(Debug, Default)]
pub struct SessionState {
    paused:         AtomicBool,
    stopped:        AtomicBool,
    current_index:  AtomicU32,
    pages_captured: AtomicU32,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh session behind an `Arc`
    ///
    /// # Examples
    ///
    /// ```
    /// use page_capture::session::SessionState;
    ///
    /// let session = SessionState::shared();
    /// let loop_side = session.clone();
    ///
    /// session.stop();
    /// assert!(loop_side.is_stopped());
    /// ```
    pub fn shared() -> SessionHandle {
        Arc::new(Self::new())
    }

    /// Sets the kill switch
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            tracing::info!("Stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            tracing::info!("Paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            tracing::info!("Resumed");
        }
    }

    /// Flips the pause flag and returns the new value
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.paused.fetch_xor(true, Ordering::SeqCst);
        tracing::info!("{}", if paused { "Paused" } else { "Resumed" });
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Publishes the index of the page the loop is working on
    pub fn set_index(&self, index: u32) {
        self.current_index.store(index, Ordering::SeqCst);
    }

    pub fn current_index(&self) -> u32 {
        self.current_index.load(Ordering::SeqCst)
    }

    /// Publishes the number of pages written in this run
    pub fn set_pages_captured(&self, pages: u32) {
        self.pages_captured.store(pages, Ordering::SeqCst);
    }

    pub fn pages_captured(&self) -> u32 {
        self.pages_captured.load(Ordering::SeqCst)
    }

    /// Clears every flag so the session can drive a new run
    pub fn reset(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
        self.current_index.store(0, Ordering::SeqCst);
        self.pages_captured.store(0, Ordering::SeqCst);
    }

    /// Applies a hotkey action to the flags
    ///
    /// The calibration key has no effect on a running session.
    pub fn apply(&self, action: HotkeyAction) {
        match action {
            HotkeyAction::EmergencyStop | HotkeyAction::BackupStop => self.stop(),
            HotkeyAction::TogglePause => {
                self.toggle_pause();
            }
            HotkeyAction::Calibrate => {
                tracing::debug!("Calibration key ignored while capturing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session = SessionState::new();
        assert!(!session.is_paused());
        assert!(!session.is_stopped());
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.pages_captured(), 0);
    }

    #[test]
    fn test_toggle_pause() {
        let session = SessionState::new();
        assert!(session.toggle_pause());
        assert!(session.is_paused());
        assert!(!session.toggle_pause());
        assert!(!session.is_paused());
    }

    #[test]
    fn test_pause_resume_idempotent() {
        let session = SessionState::new();
        session.pause();
        session.pause();
        assert!(session.is_paused());
        session.resume();
        session.resume();
        assert!(!session.is_paused());
    }

    #[test]
    fn test_apply_actions() {
        let session = SessionState::new();

        session.apply(HotkeyAction::TogglePause);
        assert!(session.is_paused());
        session.apply(HotkeyAction::Calibrate);
        assert!(session.is_paused());
        assert!(!session.is_stopped());

        session.apply(HotkeyAction::BackupStop);
        assert!(session.is_stopped());

        session.reset();
        session.apply(HotkeyAction::EmergencyStop);
        assert!(session.is_stopped());
    }

    #[test]
    fn test_reset_clears_everything() {
        let session = SessionState::new();
        session.stop();
        session.pause();
        session.set_index(7);
        session.set_pages_captured(6);

        session.reset();
        assert!(!session.is_stopped());
        assert!(!session.is_paused());
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.pages_captured(), 0);
    }

    #[test]
    fn test_shared_across_threads() {
        let session = SessionState::shared();
        let writer = Arc::clone(&session);

        std::thread::spawn(move || writer.stop()).join().unwrap();
        assert!(session.is_stopped());
    }
}
