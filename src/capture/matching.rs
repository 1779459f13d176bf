//! Window matching strategies
//!
//! Finds the reader window among everything the backend lists. Each title
//! pattern of a [`WindowSelector`] is tried with three strategies in order:
//!
//! 1. **Regex match** - Case-insensitive regex on window title
//! 2. **Substring match** - Case-insensitive substring search on title
//! 3. **Fuzzy match** - Fuzzy matching on title using SkimMatcherV2
//!
//! An owner filter, when present, is applied before any title strategy.
//!
//! # Security
//!
//! Regex patterns are limited to 1MB to prevent ReDoS attacks.

use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use regex::RegexBuilder;

use crate::model::{WindowInfo, WindowSelector};

/// Maximum regex pattern size (1MB) to prevent ReDoS attacks
const MAX_REGEX_SIZE: usize = 1_048_576;

/// Minimum fuzzy match score for a positive match
const FUZZY_THRESHOLD: i64 = 60;

/// Picks the window described by `selector`
///
/// Title patterns are tried in the order given; the first pattern that
/// matches any window wins. Empty patterns are ignored.
///
/// # Examples
///
/// ```
/// use page_capture::{
///     capture::matching::select_window,
///     model::{WindowInfo, WindowRect, WindowSelector},
/// };
///
/// let windows = vec![
///     WindowInfo::new(1, "Terminal", "kitty", WindowRect::new(0, 0, 800, 600)),
///     WindowInfo::new(2, "Vitalsource Bookshelf", "Bookshelf", WindowRect::new(0, 0, 1280, 800)),
/// ];
/// let found = select_window(&WindowSelector::default(), &windows).unwrap();
/// assert_eq!(found.id, 2);
/// ```
pub fn select_window<'a>(selector: &WindowSelector, windows: &'a [WindowInfo]) -> Option<&'a WindowInfo> {
    let candidates: Vec<&WindowInfo> = match &selector.owner {
        Some(owner) => windows
            .iter()
            .filter(|w| w.owner.eq_ignore_ascii_case(owner))
            .collect(),
        None => windows.iter().collect(),
    };

    if candidates.is_empty() {
        return None;
    }

    for pattern in selector.titles.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        let found = try_regex_match(pattern, &candidates)
            .or_else(|| try_substring_match(pattern, &candidates))
            .or_else(|| try_fuzzy_match(pattern, &candidates));

        if let Some(window) = found {
            if window.minimized {
                tracing::warn!("Window '{}' is minimized; captures may be blank", window.title);
            }
            return Some(window);
        }
    }

    None
}

/// Tries to match windows by regex pattern on title
///
/// Returns the first window whose title matches the case-insensitive regex
/// pattern, or `None` on no match, an invalid regex, or an oversized pattern.
pub fn try_regex_match<'a>(pattern: &str, windows: &[&'a WindowInfo]) -> Option<&'a WindowInfo> {
    if pattern.len() > MAX_REGEX_SIZE {
        tracing::warn!("Regex pattern too large (>1MB), skipping regex match");
        return None;
    }

    let regex = match RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(MAX_REGEX_SIZE)
        .build()
    {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!("Pattern '{}' is not a valid regex: {}", pattern, e);
            return None;
        }
    };

    let found = windows.iter().copied().find(|w| regex.is_match(&w.title));
    if let Some(window) = found {
        tracing::debug!("Regex matched window: {} (title: {})", window.id, window.title);
    }
    found
}

/// Tries to match windows by case-insensitive substring in title
pub fn try_substring_match<'a>(substring: &str, windows: &[&'a WindowInfo]) -> Option<&'a WindowInfo> {
    let substring_lower = substring.to_lowercase();

    let found = windows
        .iter()
        .copied()
        .find(|w| w.title.to_lowercase().contains(&substring_lower));
    if let Some(window) = found {
        tracing::debug!("Substring matched window: {} (title: {})", window.id, window.title);
    }
    found
}

/// Tries to match windows using fuzzy matching on title
///
/// Uses SkimMatcherV2 with a threshold of 60. Returns the highest-scoring
/// match above the threshold.
pub fn try_fuzzy_match<'a>(pattern: &str, windows: &[&'a WindowInfo]) -> Option<&'a WindowInfo> {
    let matcher = SkimMatcherV2::default();

    let mut best_match: Option<(&WindowInfo, i64)> = None;

    for window in windows.iter().copied() {
        if let Some(score) = matcher.fuzzy_match(&window.title, pattern) {
            if score >= FUZZY_THRESHOLD {
                tracing::debug!(
                    "Fuzzy match candidate: {} (title: {}, score: {})",
                    window.id,
                    window.title,
                    score
                );

                if best_match.is_none_or(|(_, s)| score > s) {
                    best_match = Some((window, score));
                }
            }
        }
    }

    best_match.map(|(window, score)| {
        tracing::debug!("Best fuzzy match: {} (score: {})", window.id, score);
        window
    })
}
