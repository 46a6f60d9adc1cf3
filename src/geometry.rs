//! DPI-aware window sizing and percentage-based placement math.

use anyhow::Result;
use tracing::error;

use crate::constants::layout;

/// Rectangle in root coordinates (screens, windows, proximity zones)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Rectangle grown by `margin` pixels on every side
    pub fn expanded(&self, margin: i32) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2 * margin,
            height: self.height + 2 * margin,
        }
    }

    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.left() && px < self.right() && py >= self.top() && py < self.bottom()
    }
}

/// One entry of the monitor list, in root coordinates
#[derive(Debug, Clone, Copy)]
pub struct Monitor {
    pub rect: Rect,
    pub primary: bool,
}

/// Text measurement supplied by the rendering surface
pub trait TextMetrics {
    /// (advance width, line height) of `text` in the main font
    fn text_size(&self, text: &str) -> Result<(f64, f64)>;
}

/// Raw shadow settings as read from the file, unscaled
#[derive(Debug, Clone, Copy)]
pub struct ShadowParams {
    pub blur: i64,
    pub offset_x: i64,
    pub offset_y: i64,
}

/// Sizing math for the clock window at a given display scale
#[derive(Debug, Clone, Copy)]
pub struct ClockGeometry {
    dpi_scale: f64,
}

impl ClockGeometry {
    pub fn new(dpi_scale: f64) -> Self {
        let dpi_scale = if dpi_scale.is_finite() && dpi_scale > 0.0 {
            dpi_scale
        } else {
            1.0
        };
        Self { dpi_scale }
    }

    pub fn dpi_scale(&self) -> f64 {
        self.dpi_scale
    }

    /// Padding between the text and the window edge
    pub fn padding(&self) -> i32 {
        (layout::BASE_PADDING * self.dpi_scale).round() as i32
    }

    /// Scale a raw pixel setting to device pixels, truncating
    pub fn scale_px(&self, value: i64) -> i32 {
        (value as f64 * self.dpi_scale) as i32
    }

    /// Extra space reserved per axis so the drop shadow is not clipped:
    /// twice the larger of the scaled offset magnitude and scaled blur.
    pub fn shadow_space(&self, shadow: ShadowParams) -> (i32, i32) {
        let blur = self.scale_px(shadow.blur);
        let offset_x = self.scale_px(shadow.offset_x);
        let offset_y = self.scale_px(shadow.offset_y);
        (2 * offset_x.abs().max(blur), 2 * offset_y.abs().max(blur))
    }

    /// Full window size for `text`: measured text plus padding on every
    /// side plus shadow slack when a shadow is drawn. Falls back to a
    /// small fixed size when the font cannot be measured.
    pub fn total_size(
        &self,
        metrics: &dyn TextMetrics,
        text: &str,
        shadow: Option<ShadowParams>,
    ) -> (u16, u16) {
        let (text_width, text_height) = match metrics.text_size(text) {
            Ok(size) => size,
            Err(e) => {
                error!(error = ?e, "Failed to measure clock text, using fallback size");
                return layout::FALLBACK_SIZE;
            }
        };
        let padding = self.padding();
        let (shadow_w, shadow_h) = shadow.map_or((0, 0), |params| self.shadow_space(params));
        let width = text_width.ceil() as i32 + 2 * padding + shadow_w;
        let height = text_height.ceil() as i32 + 2 * padding + shadow_h;
        (clamp_dimension(width), clamp_dimension(height))
    }
}

/// Inputs for percentage-based placement
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub screen: Rect,
    /// Anchor percentages, 0..=100
    pub position_x: f64,
    pub position_y: f64,
    /// Visual text extents: main run plus seconds run
    pub main_text_width: f64,
    pub seconds_text_width: f64,
    pub text_height: f64,
    /// Full window extents including padding and shadow slack
    pub window_width: f64,
    pub window_height: f64,
}

/// Resolve the window origin so the VISUAL text sits at the requested
/// percentage of the screen. The window box is larger than the text
/// (padding, shadow slack), so the anchor positions the text and the
/// window is then centered around it.
pub fn resolve_position(p: &Placement) -> (i32, i32) {
    let total_text_width = p.main_text_width + p.seconds_text_width;
    let text_x =
        p.screen.x as f64 + (p.screen.width as f64 - total_text_width) * p.position_x / 100.0;
    let text_y =
        p.screen.y as f64 + (p.screen.height as f64 - p.text_height) * p.position_y / 100.0;
    let window_x = text_x - (p.window_width - total_text_width) / 2.0;
    let window_y = text_y - (p.window_height - p.text_height) / 2.0;
    (window_x.round() as i32, window_y.round() as i32)
}

/// Pick the screen rectangle for a configured monitor index: the index
/// when in range, else the primary monitor, else the first one.
pub fn select_screen(monitors: &[Monitor], index: i64) -> Option<Rect> {
    if index >= 0 {
        if let Some(monitor) = monitors.get(index as usize) {
            return Some(monitor.rect);
        }
    }
    primary_screen(monitors)
}

/// Primary monitor rectangle, or the first monitor when none is marked
pub fn primary_screen(monitors: &[Monitor]) -> Option<Rect> {
    monitors
        .iter()
        .find(|monitor| monitor.primary)
        .or_else(|| monitors.first())
        .map(|monitor| monitor.rect)
}

fn clamp_dimension(value: i32) -> u16 {
    value.clamp(1, u16::MAX as i32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FakeMetrics {
        char_width: f64,
        height: f64,
        fail: bool,
    }

    impl TextMetrics for FakeMetrics {
        fn text_size(&self, text: &str) -> Result<(f64, f64)> {
            if self.fail {
                return Err(anyhow!("no font"));
            }
            Ok((self.char_width * text.chars().count() as f64, self.height))
        }
    }

    fn metrics() -> FakeMetrics {
        FakeMetrics {
            char_width: 10.0,
            height: 20.0,
            fail: false,
        }
    }

    #[test]
    fn test_new_sanitizes_bad_scale() {
        assert_eq!(ClockGeometry::new(f64::NAN).dpi_scale(), 1.0);
        assert_eq!(ClockGeometry::new(0.0).dpi_scale(), 1.0);
        assert_eq!(ClockGeometry::new(-2.0).dpi_scale(), 1.0);
        assert_eq!(ClockGeometry::new(1.5).dpi_scale(), 1.5);
    }

    #[test]
    fn test_padding_scales_and_rounds() {
        assert_eq!(ClockGeometry::new(1.0).padding(), 10);
        assert_eq!(ClockGeometry::new(1.5).padding(), 15);
        assert_eq!(ClockGeometry::new(1.26).padding(), 13);
    }

    #[test]
    fn test_shadow_space_uses_larger_of_offset_and_blur() {
        let geometry = ClockGeometry::new(1.0);
        let space = geometry.shadow_space(ShadowParams {
            blur: 2,
            offset_x: 4,
            offset_y: 1,
        });
        assert_eq!(space, (8, 4));
    }

    #[test]
    fn test_shadow_space_handles_negative_offsets() {
        let geometry = ClockGeometry::new(1.0);
        let space = geometry.shadow_space(ShadowParams {
            blur: 0,
            offset_x: -5,
            offset_y: -3,
        });
        assert_eq!(space, (10, 6));
    }

    #[test]
    fn test_shadow_space_truncates_scaled_inputs() {
        let geometry = ClockGeometry::new(1.5);
        // 3 * 1.5 = 4.5 truncates to 4 before doubling.
        let space = geometry.shadow_space(ShadowParams {
            blur: 3,
            offset_x: 0,
            offset_y: 0,
        });
        assert_eq!(space, (8, 8));
    }

    #[test]
    fn test_total_size_adds_padding_and_shadow() {
        let geometry = ClockGeometry::new(1.0);
        let shadow = ShadowParams {
            blur: 2,
            offset_x: 2,
            offset_y: 2,
        };
        assert_eq!(
            geometry.total_size(&metrics(), "12:34", None),
            (70, 40) // 5 chars * 10 + 2 * 10, 20 + 2 * 10
        );
        assert_eq!(
            geometry.total_size(&metrics(), "12:34", Some(shadow)),
            (74, 44)
        );
    }

    #[test]
    fn test_total_size_width_monotonic_in_text_length() {
        let geometry = ClockGeometry::new(1.0);
        let m = metrics();
        let mut last = 0;
        for text in ["1", "12", "12:3", "12:34", "12:34:56"] {
            let (width, _) = geometry.total_size(&m, text, None);
            assert!(width >= last, "{text} shrank the window");
            last = width;
        }
    }

    #[test]
    fn test_total_size_independent_of_shadow_when_disabled() {
        let geometry = ClockGeometry::new(1.0);
        let small = geometry.total_size(&metrics(), "12:34", None);
        // Blur and offsets must not leak into the size when no shadow
        // parameters are passed.
        assert_eq!(small, geometry.total_size(&metrics(), "12:34", None));
        let huge_shadow = ShadowParams {
            blur: 30,
            offset_x: 40,
            offset_y: 40,
        };
        assert_ne!(small, geometry.total_size(&metrics(), "12:34", Some(huge_shadow)));
    }

    #[test]
    fn test_total_size_falls_back_when_metrics_fail() {
        let geometry = ClockGeometry::new(1.0);
        let failing = FakeMetrics {
            char_width: 0.0,
            height: 0.0,
            fail: true,
        };
        assert_eq!(
            geometry.total_size(&failing, "12:34", None),
            layout::FALLBACK_SIZE
        );
    }

    fn placement() -> Placement {
        Placement {
            screen: Rect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            },
            position_x: 50.0,
            position_y: 50.0,
            main_text_width: 100.0,
            seconds_text_width: 20.0,
            text_height: 40.0,
            window_width: 160.0,
            window_height: 80.0,
        }
    }

    #[test]
    fn test_resolve_position_centers_at_fifty_percent() {
        let (x, y) = resolve_position(&placement());
        // Text centered: (1920 - 120) / 2 = 900; window starts 20 left of
        // the text ((160 - 120) / 2) at 880. Vertically the text sits at
        // (1080 - 40) / 2 = 520 and the window 20 above it.
        assert_eq!((x, y), (880, 500));
    }

    #[test]
    fn test_resolve_position_is_idempotent() {
        let p = placement();
        assert_eq!(resolve_position(&p), resolve_position(&p));
    }

    #[test]
    fn test_resolve_position_anchors_text_not_window() {
        let mut p = placement();
        p.position_x = 0.0;
        p.position_y = 0.0;
        let (x, y) = resolve_position(&p);
        // The text lands at the screen origin; the window sticks out by
        // its padding/shadow slack.
        assert_eq!((x, y), (-20, -20));
    }

    #[test]
    fn test_resolve_position_respects_screen_origin() {
        let mut p = placement();
        p.screen = Rect {
            x: 1920,
            y: 200,
            width: 1920,
            height: 1080,
        };
        p.position_x = 100.0;
        p.position_y = 100.0;
        let (x, _) = resolve_position(&p);
        // 1920 + (1920 - 120) = 3720 text x, minus 20 window slack.
        assert_eq!(x, 3700);
    }

    #[test]
    fn test_select_screen_prefers_index_then_primary_then_first() {
        let first = Rect {
            x: 0,
            y: 0,
            width: 800,
            height: 600,
        };
        let second = Rect {
            x: 800,
            y: 0,
            width: 1920,
            height: 1080,
        };
        let monitors = [
            Monitor {
                rect: first,
                primary: false,
            },
            Monitor {
                rect: second,
                primary: true,
            },
        ];
        assert_eq!(select_screen(&monitors, 0), Some(first));
        assert_eq!(select_screen(&monitors, 1), Some(second));
        assert_eq!(select_screen(&monitors, 5), Some(second));
        assert_eq!(select_screen(&monitors, -1), Some(second));

        let no_primary = [Monitor {
            rect: first,
            primary: false,
        }];
        assert_eq!(select_screen(&no_primary, 9), Some(first));
        assert_eq!(select_screen(&[], 0), None);
    }

    #[test]
    fn test_rect_expansion_and_containment() {
        let rect = Rect {
            x: 100,
            y: 100,
            width: 50,
            height: 20,
        };
        let zone = rect.expanded(10);
        assert_eq!(zone.left(), 90);
        assert_eq!(zone.right(), 170);
        assert!(zone.contains(90, 90));
        assert!(zone.contains(169, 129));
        assert!(!zone.contains(170, 100));
        assert!(!rect.contains(99, 100));
    }
}
