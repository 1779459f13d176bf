//! Global hotkeys
//!
//! A listener polls keyboard state, turns key-down edges into
//! [`HotkeyAction`]s and sends them over a tokio channel. The
//! [dispatcher](spawn_dispatcher) applies each action to the shared
//! [`SessionState`](crate::session::SessionState), so the capture loop only
//! ever reads flags.
//!
//! The keyboard listener itself needs the `desktop` feature; edge detection
//! and dispatch are platform independent.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::session::SessionHandle;

/// Operator command bound to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HotkeyAction {
    /// Kill switch
    EmergencyStop,
    /// Pause or resume the loop
    TogglePause,
    /// Second kill switch on an easy-to-reach key
    BackupStop,
    /// Record the cursor position as the next-page button
    Calibrate,
}

/// Key names bound to each action
///
/// Names follow `device_query`'s key names (`F10`, `Q`, `Space`, ...) and
/// are compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyBindings {
    pub emergency_stop: String,
    pub toggle_pause:   String,
    pub backup_stop:    String,
    pub calibrate:      String,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self {
            emergency_stop: "F10".to_string(),
            toggle_pause:   "F9".to_string(),
            backup_stop:    "Q".to_string(),
            calibrate:      "N".to_string(),
        }
    }
}

impl HotkeyBindings {
    /// Action bound to `key`, if any
    ///
    /// # Examples
    ///
    /// ```
    /// use page_capture::hotkeys::{HotkeyAction, HotkeyBindings};
    ///
    /// let bindings = HotkeyBindings::default();
    /// assert_eq!(bindings.action_for("f10"), Some(HotkeyAction::EmergencyStop));
    /// assert_eq!(bindings.action_for("F11"), None);
    /// ```
    pub fn action_for(&self, key: &str) -> Option<HotkeyAction> {
        self.pairs()
            .into_iter()
            .find(|(bound, _)| bound.eq_ignore_ascii_case(key))
            .map(|(_, action)| action)
    }

    /// Human-readable summary for the start banner
    pub fn describe(&self) -> String {
        format!(
            "{} = emergency stop, {} = pause/resume, {} = backup stop",
            self.emergency_stop, self.toggle_pause, self.backup_stop
        )
    }

    fn pairs(&self) -> [(&str, HotkeyAction); 4] {
        [
            (self.emergency_stop.as_str(), HotkeyAction::EmergencyStop),
            (self.toggle_pause.as_str(), HotkeyAction::TogglePause),
            (self.backup_stop.as_str(), HotkeyAction::BackupStop),
            (self.calibrate.as_str(), HotkeyAction::Calibrate),
        ]
    }
}

/// Turns polled key states into press events
///
/// A key fires once when it goes down; holding it does not repeat.
#[derive(Debug, Default)]
pub struct KeyEdgeDetector {
    previous: HashSet<String>,
}

impl KeyEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the keys currently held and returns those newly pressed
    pub fn presses<I, S>(&mut self, down: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let current: HashSet<String> = down.into_iter().map(Into::into).collect();
        let mut pressed: Vec<String> = current.difference(&self.previous).cloned().collect();
        pressed.sort();
        self.previous = current;
        pressed
    }

    /// Maps newly pressed keys to actions through `bindings`
    pub fn actions<I, S>(&mut self, down: I, bindings: &HotkeyBindings) -> Vec<HotkeyAction>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.presses(down)
            .iter()
            .filter_map(|key| bindings.action_for(key))
            .collect()
    }
}

/// Applies every received action to `session` until the channel closes
pub fn spawn_dispatcher(mut rx: mpsc::UnboundedReceiver<HotkeyAction>, session: SessionHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(action) = rx.recv().await {
            tracing::debug!("Hotkey: {:?}", action);
            session.apply(action);
        }
        tracing::debug!("Hotkey channel closed");
    })
}

#[cfg(feature = "desktop")]
pub use listener::KeyboardListener;

#[cfg(feature = "desktop")]
mod listener {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        thread,
        time::Duration,
    };

    use device_query::{DeviceQuery, DeviceState};
    use tokio::sync::mpsc;

    use super::{HotkeyAction, HotkeyBindings, KeyEdgeDetector};

    /// Background thread polling the keyboard
    ///
    /// Stops when dropped, when [`shutdown`](Self::shutdown) is called, or when
    /// the receiving side of the channel is gone.
    #[derive(Debug)]
    pub struct KeyboardListener {
        running: Arc<AtomicBool>,
        handle:  Option<thread::JoinHandle<()>>,
    }

    impl KeyboardListener {
        /// Starts polling every `poll_interval` and sending bound actions to `tx`
        pub fn spawn(
            bindings: HotkeyBindings,
            tx: mpsc::UnboundedSender<HotkeyAction>,
            poll_interval: Duration,
        ) -> Self {
            let running = Arc::new(AtomicBool::new(true));
            let running_clone = Arc::clone(&running);

            let handle = thread::spawn(move || {
                let device_state = DeviceState::new();
                let mut detector = KeyEdgeDetector::new();

                while running_clone.load(Ordering::Relaxed) {
                    let keys = device_state.get_keys();
                    let names = keys.iter().map(|k| format!("{:?}", k));

                    for action in detector.actions(names, &bindings) {
                        if tx.send(action).is_err() {
                            return;
                        }
                    }

                    thread::sleep(poll_interval);
                }
            });

            tracing::debug!("Keyboard listener started");
            Self {
                running,
                handle: Some(handle),
            }
        }

        pub fn shutdown(&mut self) {
            self.running.store(false, Ordering::Relaxed);
            if let Some(handle) = self.handle.take() {
                if handle.join().is_err() {
                    tracing::warn!("Keyboard listener thread panicked");
                }
            }
        }
    }

    impl Drop for KeyboardListener {
        fn drop(&mut self) {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[test]
    fn test_default_bindings() {
        let bindings = HotkeyBindings::default();
        assert_eq!(bindings.action_for("F10"), Some(HotkeyAction::EmergencyStop));
        assert_eq!(bindings.action_for("F9"), Some(HotkeyAction::TogglePause));
        assert_eq!(bindings.action_for("q"), Some(HotkeyAction::BackupStop));
        assert_eq!(bindings.action_for("N"), Some(HotkeyAction::Calibrate));
        assert_eq!(bindings.action_for("Escape"), None);
    }

    #[test]
    fn test_describe_lists_stop_keys() {
        let text = HotkeyBindings::default().describe();
        assert!(text.contains("F10"));
        assert!(text.contains("F9"));
        assert!(text.contains("Q"));
    }

    #[test]
    fn test_edge_detector_fires_once_per_press() {
        let mut detector = KeyEdgeDetector::new();

        assert_eq!(detector.presses(["F9"]), vec!["F9"]);
        // Still held
        assert!(detector.presses(["F9"]).is_empty());
        // Released
        assert!(detector.presses(Vec::<String>::new()).is_empty());
        // Pressed again
        assert_eq!(detector.presses(["F9"]), vec!["F9"]);
    }

    #[test]
    fn test_edge_detector_multiple_keys() {
        let mut detector = KeyEdgeDetector::new();
        assert_eq!(detector.presses(["LShift"]), vec!["LShift"]);
        assert_eq!(detector.presses(["LShift", "Q"]), vec!["Q"]);
    }

    #[test]
    fn test_edge_detector_actions() {
        let bindings = HotkeyBindings::default();
        let mut detector = KeyEdgeDetector::new();

        assert_eq!(detector.actions(["F9", "A"], &bindings), vec![HotkeyAction::TogglePause]);
        assert!(detector.actions(["F9"], &bindings).is_empty());
        assert_eq!(detector.actions(["F10"], &bindings), vec![HotkeyAction::EmergencyStop]);
    }

    #[test]
    fn test_action_serialization() {
        assert_eq!(
            serde_json::to_string(&HotkeyAction::EmergencyStop).unwrap(),
            r#""emergency-stop""#
        );
    }

    #[tokio::test]
    async fn test_dispatcher_applies_actions() {
        let session = SessionState::shared();
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = spawn_dispatcher(rx, session.clone());

        tx.send(HotkeyAction::TogglePause).unwrap();
        tx.send(HotkeyAction::EmergencyStop).unwrap();
        drop(tx);
        dispatcher.await.unwrap();

        assert!(session.is_paused());
        assert!(session.is_stopped());
    }
}
