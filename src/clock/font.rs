//! TrueType font loading and rasterization using fontdue (pure Rust),
//! with fontconfig resolving the configured family and weight.

use std::ffi::CString;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use fontconfig::{Fontconfig, Pattern};
use fontdue::{Font, FontSettings};
use tracing::{debug, info, warn};

/// Configured weight words mapped to fontconfig style names. `normal`
/// maps to no style so fontconfig picks the family default.
const WEIGHT_STYLES: &[(&str, &str)] = &[
    ("thin", "Thin"),
    ("extralight", "ExtraLight"),
    ("light", "Light"),
    ("medium", "Medium"),
    ("demibold", "SemiBold"),
    ("bold", "Bold"),
    ("extrabold", "ExtraBold"),
    ("black", "Black"),
];

/// One loaded typeface, rasterized at whatever pixel size each clock
/// run needs.
pub struct ClockFont {
    font: Font,
}

impl ClockFont {
    /// Load a TrueType font from a file path
    pub fn from_path(path: PathBuf) -> Result<Self> {
        let font_data = fs::read(&path)
            .with_context(|| format!("Failed to read font file: {}", path.display()))?;
        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font {}: {}", path.display(), e))?;
        debug!(path = %path.display(), "Loaded font");
        Ok(Self { font })
    }

    /// Resolve a family (and optional fontconfig style) to a file and
    /// load it
    pub fn from_family(family: &str, style: Option<&str>) -> Result<Self> {
        let path = find_font_path(family, style)
            .with_context(|| format!("Failed to resolve font '{family}'"))?;
        info!(family, style = ?style, path = %path.display(), "Resolved font via fontconfig");
        Self::from_path(path)
    }

    /// Load the configured family at the configured weight, degrading
    /// to the plain family and then to a system font. Only a system
    /// with no usable fonts at all makes this fail.
    pub fn load(family: &str, weight: &str) -> Result<Self> {
        if let Some(style) = style_for_weight(weight) {
            match Self::from_family(family, Some(style)) {
                Ok(font) => return Ok(font),
                Err(e) => debug!(family, style, error = %e, "Weight-specific face unavailable"),
            }
        }
        match Self::from_family(family, None) {
            Ok(font) => return Ok(font),
            Err(e) => warn!(family, error = %e, "Configured font unavailable, trying system fonts"),
        }
        Self::from_system()
    }

    /// Try to find and load a common system font
    pub fn from_system() -> Result<Self> {
        // Packagers can pin a font file at build time.
        const FONT_PATH: Option<&str> = option_env!("FONT_PATH");
        if let Some(pinned) = FONT_PATH {
            if let Ok(font) = Self::from_path(PathBuf::from(pinned)) {
                info!(path = %pinned, "Loaded font from FONT_PATH");
                return Ok(font);
            }
            warn!(path = %pinned, "Failed to load FONT_PATH font, trying fontconfig");
        }

        if let Ok(font) = Self::from_family("Sans", None) {
            return Ok(font);
        }

        let font_paths = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        ];
        for path in &font_paths {
            if let Ok(font) = Self::from_path(PathBuf::from(path)) {
                info!(path, "Loaded font from fallback path");
                return Ok(font);
            }
        }

        Err(anyhow::anyhow!(
            "Could not find any usable font. Tried FONT_PATH ({:?}), fontconfig, and fallback paths: {:?}",
            FONT_PATH,
            font_paths
        ))
    }

    /// Advance width of `text` at `px`
    pub fn text_width(&self, text: &str, px: f32) -> f32 {
        text.chars()
            .map(|ch| self.font.metrics(ch, px).advance_width)
            .sum()
    }

    /// (ascent, descent) above and below the baseline at `px`, both
    /// positive
    pub fn line_metrics(&self, px: f32) -> Result<(f32, f32)> {
        let metrics = self
            .font
            .horizontal_line_metrics(px)
            .context("Font has no horizontal line metrics")?;
        Ok((metrics.ascent, -metrics.descent))
    }

    /// Line box height at `px`
    pub fn line_height(&self, px: f32) -> Result<f32> {
        let (ascent, descent) = self.line_metrics(px)?;
        Ok(ascent + descent)
    }

    /// Rasterize `text` into a coverage mask shared with other runs.
    /// Returns the advance width actually consumed.
    pub fn draw_run(
        &self,
        mask: &mut [u8],
        mask_width: usize,
        mask_height: usize,
        origin_x: f32,
        baseline_y: i32,
        text: &str,
        px: f32,
    ) -> f32 {
        let mut x = origin_x;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, px);
            let glyph_x = x as i32;
            // The glyph box hangs from the baseline by its ymin.
            let glyph_y = baseline_y - (metrics.height as i32 + metrics.ymin);

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let px_x = glyph_x + gx as i32;
                    let px_y = glyph_y + gy as i32;
                    if px_x < 0
                        || px_y < 0
                        || px_x >= mask_width as i32
                        || px_y >= mask_height as i32
                    {
                        continue;
                    }
                    let coverage = bitmap[gy * metrics.width + gx];
                    let cell = &mut mask[(px_y as usize) * mask_width + px_x as usize];
                    *cell = (*cell).max(coverage);
                }
            }
            x += metrics.advance_width;
        }
        x - origin_x
    }
}

/// Fontconfig style name for a configured weight word, `None` for
/// `normal` and anything unrecognized
pub fn style_for_weight(weight: &str) -> Option<&'static str> {
    let weight = weight.trim().to_lowercase();
    WEIGHT_STYLES
        .iter()
        .find(|(word, _)| *word == weight)
        .map(|(_, style)| *style)
}

/// Find the font file for a family and optional style via fontconfig.
/// Fontconfig always fuzzy-matches something, so the returned family is
/// verified against the request.
fn find_font_path(family: &str, style: Option<&str>) -> Result<PathBuf> {
    let fc = Fontconfig::new().context("Failed to initialize fontconfig")?;

    let mut pattern = Pattern::new(&fc);
    let family_cstr =
        CString::new(family).with_context(|| format!("Invalid family name: {family}"))?;
    pattern.add_string(fontconfig::FC_FAMILY, &family_cstr);
    if let Some(style) = style {
        let style_cstr =
            CString::new(style).with_context(|| format!("Invalid style name: {style}"))?;
        pattern.add_string(fontconfig::FC_STYLE, &style_cstr);
    }

    let matched = pattern.font_match();

    if let Some(matched_family) = matched.get_string(fontconfig::FC_FAMILY) {
        if !matched_family.eq_ignore_ascii_case(family) {
            return Err(anyhow::anyhow!(
                "Font '{}' not found - fontconfig returned family '{}' instead",
                family,
                matched_family
            ));
        }
    }

    let file_path = matched
        .filename()
        .with_context(|| format!("No font file found for '{family}'"))?;
    let path = PathBuf::from(file_path);
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Font file path '{}' does not exist",
            path.display()
        ));
    }
    Ok(path)
}
