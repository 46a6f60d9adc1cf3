//! Fullscreen transition tracking with throttled error logging.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Error;
use tracing::error;

use crate::constants::timing;

/// Edge-triggered change in the fullscreen state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullscreenTransition {
    Entered { app: String },
    Exited,
}

/// Remembers whether some application is fullscreen so the window only
/// reacts to changes, not to every poll.
#[derive(Debug, Default)]
pub struct FullscreenTracker {
    active: bool,
    last_error_log: Option<Instant>,
}

impl FullscreenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed the latest scan result. Repeated polls in the same state
    /// stay quiet.
    pub fn observe(&mut self, fullscreen_app: Option<String>) -> Option<FullscreenTransition> {
        match (self.active, fullscreen_app) {
            (false, Some(app)) => {
                self.active = true;
                Some(FullscreenTransition::Entered { app })
            }
            (true, None) => {
                self.active = false;
                Some(FullscreenTransition::Exited)
            }
            _ => None,
        }
    }

    /// Clear the active state, reporting whether it was set. Used when
    /// fullscreen hiding is switched off while an app is still up.
    pub fn reset(&mut self) -> bool {
        std::mem::take(&mut self.active)
    }

    /// Log a scan failure. Scans run every second, so repeats of a
    /// persistent failure are dropped for a minute at a time.
    pub fn note_error(&mut self, now: Instant, error: &Error) {
        if self.error_log_due(now) {
            error!(error = ?error, "Fullscreen detection failed");
        }
    }

    fn error_log_due(&mut self, now: Instant) -> bool {
        let interval = Duration::from_secs(timing::FULLSCREEN_ERROR_LOG_SECS);
        let due = self
            .last_error_log
            .is_none_or(|last| now.saturating_duration_since(last) >= interval);
        if due {
            self.last_error_log = Some(now);
        }
        due
    }
}

/// Split the configured exclusion list on commas, trimming each entry
pub fn parse_exclusions(raw: &str) -> HashSet<String> {
    raw.split(',').map(|entry| entry.trim().to_string()).collect()
}
