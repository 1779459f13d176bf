//! Timing defaults for the capture loop.
//!
//! All values can be overridden at runtime via environment variables:
//!
//! | Environment Variable | Default | Description |
//! |---------------------|---------|-------------|
//! | `PAGE_CAPTURE_POLL_INTERVAL_MS` | 50 | Granularity of every interruptible wait |
//! | `PAGE_CAPTURE_WINDOW_GRACE_MS` | 2000 | Wait before the single retry when the window is lost |
//! | `PAGE_CAPTURE_START_DELAY_MS` | 3000 | Countdown before the first capture |

/// Granularity of every interruptible wait.
///
/// The kill switch and the pause toggle are observed at most this long after
/// they are set.
pub const POLL_INTERVAL_MS: u64 = 50;

/// How long the loop waits before looking for a lost window a second time.
pub const WINDOW_GRACE_MS: u64 = 2000;

/// Countdown before the first capture, giving the operator time to bring
/// the reader window to the front.
pub const START_DELAY_MS: u64 = 3000;

/// Default pause between a click and the next capture.
pub const DEFAULT_DELAY_MS: u64 = 500;

/// Smallest delay the command line accepts.
pub const MIN_CLI_DELAY_MS: u64 = 100;

/// Largest click offset (either axis) accepted from the window origin.
pub const MAX_CLICK_OFFSET: i32 = 32_768;

/// JPEG quality used when embedding pages into the PDF.
pub const PDF_JPEG_QUALITY: u8 = 90;

fn get_ms_from_env(env_var: &str, default: u64) -> u64 {
    std::env::var(env_var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Poll interval, overridable with `PAGE_CAPTURE_POLL_INTERVAL_MS`.
///
/// A value of zero falls back to the default.
pub fn poll_interval_ms() -> u64 {
    match get_ms_from_env("PAGE_CAPTURE_POLL_INTERVAL_MS", POLL_INTERVAL_MS) {
        0 => POLL_INTERVAL_MS,
        ms => ms,
    }
}

/// Window grace period, overridable with `PAGE_CAPTURE_WINDOW_GRACE_MS`.
pub fn window_grace_ms() -> u64 {
    get_ms_from_env("PAGE_CAPTURE_WINDOW_GRACE_MS", WINDOW_GRACE_MS)
}

/// Start countdown, overridable with `PAGE_CAPTURE_START_DELAY_MS`.
pub fn start_delay_ms() -> u64 {
    get_ms_from_env("PAGE_CAPTURE_START_DELAY_MS", START_DELAY_MS)
}

#[cfg(test)]
#[allow(clippy::assertions_on_constants)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_sanity() {
        assert!(POLL_INTERVAL_MS > 0);
        // A stop must be seen well inside one inter-click delay
        assert!(POLL_INTERVAL_MS < MIN_CLI_DELAY_MS);
        assert!(MIN_CLI_DELAY_MS <= DEFAULT_DELAY_MS);
        assert!(PDF_JPEG_QUALITY <= 100);
    }

    #[test]
    fn test_env_override_defaults() {
        temp_env::with_vars_unset(
            [
                "PAGE_CAPTURE_POLL_INTERVAL_MS",
                "PAGE_CAPTURE_WINDOW_GRACE_MS",
                "PAGE_CAPTURE_START_DELAY_MS",
            ],
            || {
                assert_eq!(poll_interval_ms(), POLL_INTERVAL_MS);
                assert_eq!(window_grace_ms(), WINDOW_GRACE_MS);
                assert_eq!(start_delay_ms(), START_DELAY_MS);
            },
        );
    }

    #[test]
    fn test_env_override_with_value() {
        temp_env::with_var("PAGE_CAPTURE_POLL_INTERVAL_MS", Some("20"), || {
            assert_eq!(poll_interval_ms(), 20);
        });

        temp_env::with_var("PAGE_CAPTURE_WINDOW_GRACE_MS", Some("0"), || {
            assert_eq!(window_grace_ms(), 0);
        });

        temp_env::with_var("PAGE_CAPTURE_START_DELAY_MS", Some("10000"), || {
            assert_eq!(start_delay_ms(), 10000);
        });
    }

    #[test]
    fn test_env_override_invalid_value() {
        temp_env::with_var("PAGE_CAPTURE_POLL_INTERVAL_MS", Some("fast"), || {
            assert_eq!(poll_interval_ms(), POLL_INTERVAL_MS);
        });

        temp_env::with_var("PAGE_CAPTURE_POLL_INTERVAL_MS", Some("0"), || {
            assert_eq!(poll_interval_ms(), POLL_INTERVAL_MS);
        });

        temp_env::with_var("PAGE_CAPTURE_START_DELAY_MS", Some("-1"), || {
            assert_eq!(start_delay_ms(), START_DELAY_MS);
        });
    }
}
