//! Software composition of the clock frame: drop shadow, gradient
//! outline, and text fill over a transparent background, producing
//! premultiplied ARGB pixels ready for upload.

use anyhow::Result;

use super::font::ClockFont;
use crate::geometry::TextMetrics;
use crate::settings::Rgba;

/// Dilation cost grows with the square of the outline radius, so absurd
/// configured widths are capped instead of stalling the clock tick.
const MAX_OUTLINE_RADIUS: i32 = 64;

/// Visual parameters resolved from settings. Shadow fields are in
/// device pixels; the outline width is used as configured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub text_color: Rgba,
    pub outline_width: i32,
    pub gradient_angle_deg: f64,
    pub gradient_start: Rgba,
    pub gradient_end: Rgba,
    pub shadow: Option<ShadowStyle>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowStyle {
    pub color: Rgba,
    pub blur: i32,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            text_color: Rgba::WHITE,
            outline_width: 1,
            gradient_angle_deg: 90.0,
            gradient_start: Rgba::BLACK,
            gradient_end: Rgba::WHITE,
            shadow: None,
        }
    }
}

/// Finished frame at the window size, premultiplied ARGB
pub struct RenderedFrame {
    pub width: u16,
    pub height: u16,
    pub data: Vec<u32>,
}

impl RenderedFrame {
    fn blank(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }
}

/// Holds everything needed to draw the clock: the typeface, the two run
/// sizes, the current texts, and the style.
pub struct RenderSurface {
    font: ClockFont,
    main_px: f32,
    seconds_px: f32,
    time_text: String,
    seconds_text: String,
    style: TextStyle,
}

impl RenderSurface {
    pub fn new(font: ClockFont) -> Self {
        Self {
            font,
            main_px: 40.0,
            seconds_px: 20.0,
            time_text: String::new(),
            seconds_text: String::new(),
            style: TextStyle::default(),
        }
    }

    pub fn set_font(&mut self, font: ClockFont) {
        self.font = font;
    }

    pub fn set_sizes(&mut self, main_px: f32, seconds_px: f32) {
        self.main_px = main_px.max(1.0);
        self.seconds_px = seconds_px.max(1.0);
    }

    pub fn set_style(&mut self, style: TextStyle) {
        self.style = style;
    }

    pub fn set_texts(&mut self, time_text: &str, seconds_text: &str) {
        if self.time_text != time_text {
            self.time_text = time_text.to_string();
        }
        if self.seconds_text != seconds_text {
            self.seconds_text = seconds_text.to_string();
        }
    }

    pub fn time_text(&self) -> &str {
        &self.time_text
    }

    pub fn seconds_text(&self) -> &str {
        &self.seconds_text
    }

    /// Advance width of the main run at the main size
    pub fn main_text_width(&self) -> f64 {
        self.font.text_width(&self.time_text, self.main_px) as f64
    }

    /// Advance width of the seconds run at the seconds size
    pub fn seconds_text_width(&self) -> f64 {
        self.font.text_width(&self.seconds_text, self.seconds_px) as f64
    }

    /// Height of the main line box
    pub fn text_height(&self) -> Result<f64> {
        Ok(self.font.line_height(self.main_px)? as f64)
    }

    /// Draw the current texts into a fresh frame of the given size.
    pub fn compose(&self, width: u16, height: u16) -> Result<RenderedFrame> {
        if width == 0 || height == 0 {
            return Ok(RenderedFrame::blank(width, height));
        }
        let w = width as usize;
        let h = height as usize;

        let (_, descent) = self.font.line_metrics(self.main_px)?;
        let line_height = self.font.line_height(self.main_px)?;
        let main_width = self.font.text_width(&self.time_text, self.main_px);
        let seconds_width = self.font.text_width(&self.seconds_text, self.seconds_px);
        let total_width = main_width + seconds_width;

        // Both runs share the main baseline; the seconds run starts at
        // the main run's advance.
        let origin_x = (width as f32 - total_width) / 2.0;
        let baseline = ((height as f32 + line_height) / 2.0 - descent).round() as i32;

        let mut mask = vec![0u8; w * h];
        let advance = self
            .font
            .draw_run(&mut mask, w, h, origin_x, baseline, &self.time_text, self.main_px);
        self.font.draw_run(
            &mut mask,
            w,
            h,
            origin_x + advance,
            baseline,
            &self.seconds_text,
            self.seconds_px,
        );

        let Some(bounds) = ink_bounds(&mask, w) else {
            return Ok(RenderedFrame::blank(width, height));
        };

        let outline_radius = self.style.outline_width.clamp(0, MAX_OUTLINE_RADIUS);
        let outline = if outline_radius > 0 {
            Some(dilate_mask(&mask, w, h, outline_radius))
        } else {
            None
        };

        let mut frame = RenderedFrame::blank(width, height);

        if let Some(shadow) = self.style.shadow {
            let mut shape = match &outline {
                Some(outline) => max_mask(&mask, outline),
                None => mask.clone(),
            };
            blur_mask(&mut shape, w, h, shadow.blur.max(0));
            composite_offset_mask(
                &mut frame.data,
                w,
                h,
                &shape,
                shadow.color,
                shadow.offset_x,
                shadow.offset_y,
            );
        }

        if let Some(outline) = &outline {
            let (start, end) = gradient_axis(&bounds, self.style.gradient_angle_deg);
            for y in 0..h {
                for x in 0..w {
                    let coverage = outline[y * w + x];
                    if coverage == 0 {
                        continue;
                    }
                    let t = gradient_position(start, end, x as f64, y as f64);
                    let color = mix_color(self.style.gradient_start, self.style.gradient_end, t);
                    let cell = &mut frame.data[y * w + x];
                    *cell = composite_over(*cell, premultiply(color, coverage));
                }
            }
        }

        for y in 0..h {
            for x in 0..w {
                let coverage = mask[y * w + x];
                if coverage == 0 {
                    continue;
                }
                let cell = &mut frame.data[y * w + x];
                *cell = composite_over(*cell, premultiply(self.style.text_color, coverage));
            }
        }

        Ok(frame)
    }
}

impl TextMetrics for RenderSurface {
    fn text_size(&self, text: &str) -> Result<(f64, f64)> {
        let width = self.font.text_width(text, self.main_px) as f64;
        let height = self.font.line_height(self.main_px)? as f64;
        Ok((width, height))
    }
}

/// Inclusive bounding box of the set pixels of a coverage mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InkBounds {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

fn ink_bounds(mask: &[u8], width: usize) -> Option<InkBounds> {
    let mut bounds: Option<InkBounds> = None;
    for (index, &coverage) in mask.iter().enumerate() {
        if coverage == 0 {
            continue;
        }
        let x = index % width;
        let y = index / width;
        bounds = Some(match bounds {
            None => InkBounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            },
            Some(b) => InkBounds {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        });
    }
    bounds
}

/// Grow a coverage mask by `radius` pixels in every direction with a
/// one-pixel feathered rim, the raster version of a round-join stroke
/// of width `2 * radius` centered on the shape edge.
fn dilate_mask(mask: &[u8], width: usize, height: usize, radius: i32) -> Vec<u8> {
    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let distance = ((dx * dx + dy * dy) as f64).sqrt();
            let weight = (radius as f64 + 1.0 - distance).clamp(0.0, 1.0);
            if weight > 0.0 {
                offsets.push((dx, dy, (weight * 255.0) as u16));
            }
        }
    }

    let mut out = vec![0u8; mask.len()];
    for y in 0..height {
        for x in 0..width {
            let coverage = mask[y * width + x] as u16;
            if coverage == 0 {
                continue;
            }
            for &(dx, dy, weight) in &offsets {
                let tx = x as i32 + dx;
                let ty = y as i32 + dy;
                if tx < 0 || ty < 0 || tx >= width as i32 || ty >= height as i32 {
                    continue;
                }
                let stamped = (coverage * weight / 255) as u8;
                let cell = &mut out[ty as usize * width + tx as usize];
                *cell = (*cell).max(stamped);
            }
        }
    }
    out
}

fn max_mask(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(&x, &y)| x.max(y)).collect()
}

/// Separable box blur, split into two passes whose radii sum to `blur`
/// so the spread never exceeds the slack the geometry reserved.
fn blur_mask(mask: &mut [u8], width: usize, height: usize, blur: i32) {
    let first = blur / 2;
    for radius in [first, blur - first] {
        if radius > 0 {
            box_blur_pass(mask, width, height, radius as usize, true);
            box_blur_pass(mask, width, height, radius as usize, false);
        }
    }
}

/// One box pass. Pixels outside the mask count as transparent, so
/// edges fade instead of smearing.
fn box_blur_pass(mask: &mut [u8], width: usize, height: usize, radius: usize, horizontal: bool) {
    let window = 2 * radius + 1;
    let (outer, inner) = if horizontal {
        (height, width)
    } else {
        (width, height)
    };
    let index = |o: usize, i: usize| {
        if horizontal {
            o * width + i
        } else {
            i * width + o
        }
    };

    let mut line = vec![0u8; inner];
    for o in 0..outer {
        let mut sum: u32 = 0;
        for i in 0..inner.min(radius) {
            sum += mask[index(o, i)] as u32;
        }
        for i in 0..inner {
            if i + radius < inner {
                sum += mask[index(o, i + radius)] as u32;
            }
            line[i] = (sum / window as u32) as u8;
            if i >= radius {
                sum -= mask[index(o, i - radius)] as u32;
            }
        }
        for i in 0..inner {
            mask[index(o, i)] = line[i];
        }
    }
}

/// Composite a tinted coverage mask into the frame at an offset
fn composite_offset_mask(
    frame: &mut [u32],
    width: usize,
    height: usize,
    mask: &[u8],
    color: Rgba,
    offset_x: i32,
    offset_y: i32,
) {
    for y in 0..height {
        for x in 0..width {
            let coverage = mask[y * width + x];
            if coverage == 0 {
                continue;
            }
            let tx = x as i32 + offset_x;
            let ty = y as i32 + offset_y;
            if tx < 0 || ty < 0 || tx >= width as i32 || ty >= height as i32 {
                continue;
            }
            let cell = &mut frame[ty as usize * width + tx as usize];
            *cell = composite_over(*cell, premultiply(color, coverage));
        }
    }
}

/// Endpoints of the gradient axis: through the ink center at the
/// configured angle, half-length the larger ink extent.
fn gradient_axis(bounds: &InkBounds, angle_deg: f64) -> ((f64, f64), (f64, f64)) {
    let center_x = (bounds.min_x + bounds.max_x) as f64 / 2.0;
    let center_y = (bounds.min_y + bounds.max_y) as f64 / 2.0;
    let extent_w = (bounds.max_x - bounds.min_x + 1) as f64;
    let extent_h = (bounds.max_y - bounds.min_y + 1) as f64;
    let radius = extent_w.max(extent_h) / 2.0;
    let angle = angle_deg.to_radians();
    let (dx, dy) = (angle.cos() * radius, angle.sin() * radius);
    ((center_x - dx, center_y - dy), (center_x + dx, center_y + dy))
}

/// Projection of a point onto the gradient axis, clamped to [0, 1]
/// (pad spread: everything past the endpoints holds the end colors)
fn gradient_position(start: (f64, f64), end: (f64, f64), x: f64, y: f64) -> f64 {
    let axis = (end.0 - start.0, end.1 - start.1);
    let len_sq = axis.0 * axis.0 + axis.1 * axis.1;
    if len_sq == 0.0 {
        return 0.0;
    }
    let dot = (x - start.0) * axis.0 + (y - start.1) * axis.1;
    (dot / len_sq).clamp(0.0, 1.0)
}

fn mix_channel(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round() as u8
}

fn mix_color(a: Rgba, b: Rgba, t: f64) -> Rgba {
    Rgba::new(
        mix_channel(a.r, b.r, t),
        mix_channel(a.g, b.g, t),
        mix_channel(a.b, b.b, t),
        mix_channel(a.a, b.a, t),
    )
}

/// Coverage-scaled premultiplied ARGB pixel
fn premultiply(color: Rgba, coverage: u8) -> u32 {
    let alpha = color.a as u32 * coverage as u32 / 255;
    let scale = |c: u8| (c as u32 * alpha + 127) / 255;
    (alpha << 24) | (scale(color.r) << 16) | (scale(color.g) << 8) | scale(color.b)
}

/// Source-over for premultiplied pixels
fn composite_over(dst: u32, src: u32) -> u32 {
    let src_alpha = (src >> 24) & 0xFF;
    if src_alpha == 255 {
        return src;
    }
    let inverse = 255 - src_alpha;
    let blend = |shift: u32| {
        let s = (src >> shift) & 0xFF;
        let d = (dst >> shift) & 0xFF;
        (s + (d * inverse + 127) / 255).min(255)
    };
    (blend(24) << 24) | (blend(16) << 16) | (blend(8) << 8) | blend(0)
}
