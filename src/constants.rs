//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Application identity constants
pub mod app {
    /// Application name used for WM_CLASS, _NET_WM_NAME and the tray id
    pub const NAME: &str = "hoverclock";

    /// Directory under the platform config dir holding the settings file
    pub const CONFIG_DIR: &str = "hoverclock";

    /// Canonical settings file name
    pub const SETTINGS_FILE: &str = "settings.ini";

    /// Settings file name used by older releases, renamed on startup
    pub const LEGACY_SETTINGS_FILE: &str = "default.ini";

    /// Directory under the platform state dir receiving log files
    pub const LOG_DIR: &str = "logs";

    /// Number of rolled log files kept around
    pub const LOG_FILE_LIMIT: usize = 5;
}

/// X11 protocol and rendering constants
pub mod x11 {
    /// ARGB color depth (32-bit: 8 bits each for Alpha, Red, Green, Blue)
    pub const ARGB_DEPTH: u8 = 32;

    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// _NET_WM_WINDOW_OPACITY value for a fully opaque window
    pub const OPACITY_OPAQUE: u32 = u32::MAX;
}

/// Geometry and layout constants
pub mod layout {
    /// Padding between the text and the window edge at 96 dpi, in pixels
    pub const BASE_PADDING: f64 = 10.0;

    /// DPI corresponding to a scale factor of 1.0
    pub const BASELINE_DPI: f64 = 96.0;

    /// Window size used when the clock text cannot be measured
    pub const FALLBACK_SIZE: (u16, u16) = (100, 50);
}

/// Timer cadence constants, in milliseconds unless noted
pub mod timing {
    /// Interval between settings file mtime checks
    pub const SETTINGS_POLL_MS: u64 = 1000;

    /// Interval between fullscreen detection sweeps
    pub const FULLSCREEN_CHECK_MS: u64 = 1000;

    /// Delay between opacity animation steps (roughly 60 fps)
    pub const FADE_STEP_MS: u64 = 16;

    /// Upper bound on one event-loop sleep so tray commands, signals
    /// and X events are picked up promptly
    pub const LOOP_IDLE_CAP_MS: u64 = 50;

    /// Minimum spacing between repeated fullscreen enumeration error logs
    pub const FULLSCREEN_ERROR_LOG_SECS: u64 = 60;
}

/// Fullscreen detection constants
pub mod fullscreen {
    /// Fraction of the screen a window must cover on both axes to count
    pub const COVERAGE_THRESHOLD: f64 = 0.98;
}
