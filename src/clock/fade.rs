//! Opacity fade animation with cubic in-out easing.

use std::time::{Duration, Instant};

/// Action owed to the window once a fade settles at its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDone {
    /// Nothing beyond holding the target opacity
    Settle,
    /// Unmap the window (proximity or fullscreen hide)
    HideWindow,
    /// Tear the application down
    CloseApp,
}

/// One in-flight opacity animation. Starting a new fade replaces the
/// current one, which never reports its completion action.
#[derive(Debug)]
pub struct FadeAnimation {
    from: f64,
    to: f64,
    started: Instant,
    duration: Duration,
    on_finish: FadeDone,
}

impl FadeAnimation {
    pub fn new(from: f64, to: f64, duration: Duration, on_finish: FadeDone) -> Self {
        Self {
            from: from.clamp(0.0, 1.0),
            to: to.clamp(0.0, 1.0),
            started: Instant::now(),
            duration,
            on_finish,
        }
    }

    pub fn target(&self) -> f64 {
        self.to
    }

    /// Opacity at `now`, plus the completion action once the target is
    /// reached. The owner drops the animation when the action appears,
    /// so it is observed exactly once.
    pub fn sample(&self, now: Instant) -> (f64, Option<FadeDone>) {
        if self.duration.is_zero() {
            return (self.to, Some(self.on_finish));
        }
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= self.duration {
            return (self.to, Some(self.on_finish));
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let opacity = self.from + (self.to - self.from) * ease_in_out_cubic(t);
        (opacity, None)
    }
}

/// Slow start, slow stop: cubic below the midpoint, mirrored above
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
