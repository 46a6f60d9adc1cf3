//! INI document model: parsing, typed value interpretation, and the
//! comment-preserving single-key rewrite used by the tray toggles.

use std::collections::HashMap;

use anyhow::{Result, bail};

/// Words accepted as true by [`parse_bool`], lowercase
const TRUE_WORDS: [&str; 5] = ["true", "yes", "1", "on", "t"];

/// RGBA color parsed from a settings value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Parsed view of a settings file: section name to key/value map.
///
/// Keys are trimmed and lowercased, section names trimmed and
/// case-sensitive. Values are trimmed but keep any inline `;` comment
/// so the typed parsers decide how much of the raw text to interpret.
#[derive(Debug, Default, Clone)]
pub struct ConfigDocument {
    sections: HashMap<String, HashMap<String, String>>,
}

impl ConfigDocument {
    /// Parse the full text of a settings file.
    ///
    /// A key/value line before any section header, or a non-comment line
    /// without `=` inside a section, fails the whole parse so the caller
    /// can keep its previously loaded document.
    pub fn parse(text: &str) -> Result<Self> {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current: Option<String> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                bail!("line {}: expected `key = value`, got {:?}", index + 1, raw);
            };
            let Some(section) = current.as_deref() else {
                bail!("line {}: key/value pair before any [section] header", index + 1);
            };
            if let Some(entries) = sections.get_mut(section) {
                entries.insert(key.trim().to_lowercase(), value.trim().to_string());
            }
        }

        Ok(Self { sections })
    }

    /// Raw value lookup. Inline comments are part of the raw value.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(&key.to_lowercase()))
            .map(String::as_str)
    }
}

/// Drop an inline `;` comment and surrounding whitespace from a raw value
pub fn strip_inline_comment(value: &str) -> &str {
    match value.split_once(';') {
        Some((body, _)) => body.trim(),
        None => value.trim(),
    }
}

/// Integer interpretation. Inline comments are NOT stripped, so a
/// commented integer value falls back to the caller's default.
pub fn parse_int(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

pub fn parse_float(value: &str) -> Option<f64> {
    strip_inline_comment(value).parse().ok()
}

/// Boolean vocabulary test. Anything outside [`TRUE_WORDS`] is false,
/// including garbage; absence is the caller's concern.
pub fn parse_bool(value: &str) -> bool {
    TRUE_WORDS.contains(&strip_inline_comment(value).to_lowercase().as_str())
}

/// Comma-separated color channels. Every segment must parse as a byte;
/// one to three segments are padded with opaque 255s, segments past the
/// fourth are ignored.
pub fn parse_color(value: &str) -> Option<Rgba> {
    let mut channels = Vec::new();
    for part in strip_inline_comment(value).split(',') {
        channels.push(part.trim().parse::<u8>().ok()?);
    }
    let channel = |i: usize| channels.get(i).copied().unwrap_or(255);
    Some(Rgba::new(channel(0), channel(1), channel(2), channel(3)))
}

/// Replace the value of a single key in a settings file, leaving every
/// other byte of the text untouched.
///
/// The first line in `section` whose text before the first `=` trims to
/// `key` becomes `{key-part}= {value}{;comment}`, where the comment tail
/// (from the first `;` to end of line) is carried over verbatim.
/// Returns `None` when the key is not present in that section.
pub fn rewrite_key(text: &str, section: &str, key: &str, value: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 16);
    let mut current_section: Option<&str> = None;
    let mut replaced = false;

    for piece in text.split_inclusive('\n') {
        let (line, eol) = split_line_ending(piece);
        if !replaced {
            let trimmed = line.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current_section = Some(trimmed[1..trimmed.len() - 1].trim());
            } else if current_section == Some(section) {
                if let Some((key_part, _)) = line.split_once('=') {
                    if key_part.trim() == key {
                        let (body, comment) = match line.split_once(';') {
                            Some((_, tail)) => (line_key_part(line), Some(tail)),
                            None => (key_part, None),
                        };
                        out.push_str(body);
                        out.push_str("= ");
                        out.push_str(value);
                        if let Some(tail) = comment {
                            out.push(';');
                            out.push_str(tail);
                        }
                        out.push_str(eol);
                        replaced = true;
                        continue;
                    }
                }
            }
        }
        out.push_str(piece);
    }

    replaced.then_some(out)
}

/// Text of a key/value line before its first `=`
fn line_key_part(line: &str) -> &str {
    match line.split_once('=') {
        Some((key_part, _)) => key_part,
        None => line,
    }
}

fn split_line_ending(piece: &str) -> (&str, &str) {
    if let Some(line) = piece.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = piece.strip_suffix('\n') {
        (line, "\n")
    } else {
        (piece, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections_and_values() {
        let doc = ConfigDocument::parse(
            "[window]\nposition_x = 50\n\n[behavior]\nauto_hide = true\n",
        )
        .unwrap();
        assert_eq!(doc.get("window", "position_x"), Some("50"));
        assert_eq!(doc.get("behavior", "auto_hide"), Some("true"));
        assert_eq!(doc.get("window", "missing"), None);
        assert_eq!(doc.get("missing", "position_x"), None);
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let doc = ConfigDocument::parse(
            "; leading comment\n\n[window]\n# hash comment\nposition_x = 10\n",
        )
        .unwrap();
        assert_eq!(doc.get("window", "position_x"), Some("10"));
    }

    #[test]
    fn test_parse_keeps_inline_comment_in_raw_value() {
        let doc = ConfigDocument::parse("[styling]\nfont_size = 40 ; px\n").unwrap();
        assert_eq!(doc.get("styling", "font_size"), Some("40 ; px"));
    }

    #[test]
    fn test_parse_lowercases_keys() {
        let doc = ConfigDocument::parse("[window]\nPosition_X = 5\n").unwrap();
        assert_eq!(doc.get("window", "position_x"), Some("5"));
        assert_eq!(doc.get("window", "POSITION_X"), Some("5"));
    }

    #[test]
    fn test_parse_rejects_orphan_key() {
        assert!(ConfigDocument::parse("position_x = 50\n[window]\n").is_err());
    }

    #[test]
    fn test_parse_rejects_bare_line_in_section() {
        assert!(ConfigDocument::parse("[window]\nnot a pair\n").is_err());
    }

    #[test]
    fn test_parse_int_rejects_inline_comment() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int(" -7 "), Some(-7));
        assert_eq!(parse_int("42 ; px"), None);
        assert_eq!(parse_int("4.2"), None);
        assert_eq!(parse_int("abc"), None);
    }

    #[test]
    fn test_parse_float_strips_inline_comment() {
        assert_eq!(parse_float("12.5 ; note"), Some(12.5));
        assert_eq!(parse_float("50"), Some(50.0));
        assert_eq!(parse_float("1e2"), Some(100.0));
        assert_eq!(parse_float("wide"), None);
    }

    #[test]
    fn test_parse_bool_vocabulary() {
        for word in ["true", "True", "YES", "1", "on", "t"] {
            assert!(parse_bool(word), "{word} should be true");
        }
        assert!(parse_bool("true ; keep me on"));
        for word in ["false", "no", "0", "off", "banana", ""] {
            assert!(!parse_bool(word), "{word} should be false");
        }
    }

    #[test]
    fn test_parse_color_pads_missing_channels() {
        assert_eq!(parse_color("10,20,30"), Some(Rgba::new(10, 20, 30, 255)));
        assert_eq!(parse_color("10, 20"), Some(Rgba::new(10, 20, 255, 255)));
        assert_eq!(
            parse_color("1, 2, 3, 4 ; rgba"),
            Some(Rgba::new(1, 2, 3, 4))
        );
    }

    #[test]
    fn test_parse_color_rejects_bad_segments() {
        assert_eq!(parse_color("white"), None);
        assert_eq!(parse_color(""), None);
        assert_eq!(parse_color("300,0,0"), None);
        assert_eq!(parse_color("10,20,30,"), None);
        // Extra channels are ignored, but each one must still parse.
        assert_eq!(parse_color("1,2,3,4,5"), Some(Rgba::new(1, 2, 3, 4)));
        assert_eq!(parse_color("1,2,3,4,bad"), None);
    }

    #[test]
    fn test_rewrite_preserves_every_other_line() {
        let text = "; header comment\n[window]\nposition_x = 50\nalways_on_top = true\n\n[behavior]\nauto_hide = true\n";
        let updated = rewrite_key(text, "window", "always_on_top", "false").unwrap();
        let expected = "; header comment\n[window]\nposition_x = 50\nalways_on_top = false\n\n[behavior]\nauto_hide = true\n";
        assert_eq!(updated, expected);
    }

    #[test]
    fn test_rewrite_keeps_inline_comment() {
        let text = "[behavior]\nauto_hide = true ; hide near pointer\n";
        let updated = rewrite_key(text, "behavior", "auto_hide", "false").unwrap();
        assert_eq!(updated, "[behavior]\nauto_hide = false; hide near pointer\n");
    }

    #[test]
    fn test_rewrite_targets_only_the_named_section() {
        let text = "[window]\nalways_on_top = true\n[behavior]\nalways_on_top = true\n";
        let updated = rewrite_key(text, "behavior", "always_on_top", "false").unwrap();
        assert_eq!(
            updated,
            "[window]\nalways_on_top = true\n[behavior]\nalways_on_top = false\n"
        );
    }

    #[test]
    fn test_rewrite_replaces_first_match_only() {
        let text = "[behavior]\nauto_hide = true\nauto_hide = true\n";
        let updated = rewrite_key(text, "behavior", "auto_hide", "false").unwrap();
        assert_eq!(updated, "[behavior]\nauto_hide = false\nauto_hide = true\n");
    }

    #[test]
    fn test_rewrite_missing_key_returns_none() {
        let text = "[window]\nposition_x = 50\n";
        assert!(rewrite_key(text, "window", "absent", "true").is_none());
        assert!(rewrite_key(text, "absent", "position_x", "1").is_none());
    }

    #[test]
    fn test_rewrite_without_trailing_newline() {
        let text = "[window]\nalways_on_top = true";
        let updated = rewrite_key(text, "window", "always_on_top", "false").unwrap();
        assert_eq!(updated, "[window]\nalways_on_top = false");
    }

    #[test]
    fn test_rewrite_preserves_crlf_endings() {
        let text = "[window]\r\nalways_on_top = true\r\n";
        let updated = rewrite_key(text, "window", "always_on_top", "false").unwrap();
        assert_eq!(updated, "[window]\r\nalways_on_top = false\r\n");
    }
}
