//! Live INI settings store.
//!
//! The settings file is the application's whole interface besides the
//! tray: reads are typed and never fail (callers supply defaults), the
//! file is polled for modification-time changes and reloaded in place,
//! and tray toggles write single keys back without disturbing the rest
//! of the file.

mod document;

pub use document::Rgba;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::constants::app;
use document::ConfigDocument;

/// Settings written on first run so the tray's "Open Config" entry has a
/// real file to open. Integer keys keep their comments on separate lines
/// because integer parsing does not strip inline comments.
const DEFAULT_TEMPLATE: &str = "\
; hoverclock settings
; Saved changes are picked up automatically within a second.

[window]
; Text anchor as a percentage of the target screen (0 = left/top edge,
; 50 = centered, 100 = right/bottom edge).
position_x = 50
position_y = 50
; Index into the monitor list; out-of-range values use the primary.
position_screen = 0
always_on_top = true
; Pointer distance in pixels that counts as \"near\" for auto hiding.
proximity_threshold = 50

[behavior]
auto_hide = true
hide_in_fullscreen = true
; Comma-separated application names ignored by fullscreen detection.
fullscreen_exclude =
; Durations in milliseconds.
fade_duration = 500
update_interval = 1000
mouse_check_interval = 200

[styling]
font_family = Sen
font_size = 40
; thin, extralight, light, normal, medium, demibold, bold, extrabold, black
font_weight = normal
outline_width = 1
; Outline gradient direction in degrees.
gradient_angle = 90
text = 255, 255, 255 ; r, g, b[, a]
gradient_start = 0, 0, 0
gradient_end = 255, 255, 255
shadow = 0, 0, 0, 160
shadow_enabled = true
shadow_blur = 2
shadow_offset_x = 2
shadow_offset_y = 2

[format]
; strftime-style formats. %I hours drop their leading zero.
time_format = %I:%M
time_seconds_format = %S
; Seconds text size as a fraction of font_size.
time_seconds_size = 0.5
";

/// Opaque registration token returned by [`SettingsStore::add_watcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherId(u64);

struct Watcher {
    id: WatcherId,
    callback: Box<dyn FnMut() -> Result<()>>,
}

pub struct SettingsStore {
    path: PathBuf,
    document: ConfigDocument,
    last_modified: Option<SystemTime>,
    watchers: Vec<Watcher>,
    next_watcher_id: u64,
}

impl SettingsStore {
    /// Open the store at the canonical per-user location, migrating a
    /// legacy file name and writing the default template when needed.
    pub fn open_default() -> Result<Self> {
        let path = default_settings_path()?;
        migrate_legacy_file(&path);
        write_template_if_missing(&path);
        Ok(Self::open(path))
    }

    /// Open the store over an explicit file path. A missing or malformed
    /// file yields an empty document; reads fall back to their defaults.
    pub fn open(path: PathBuf) -> Self {
        let mut store = Self {
            path,
            document: ConfigDocument::default(),
            last_modified: None,
            watchers: Vec::new(),
            next_watcher_id: 0,
        };
        store.load();
        store.last_modified = file_mtime(&store.path);
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read and re-parse the backing file. Never fails: problems are
    /// logged and the previously loaded document stays in effect.
    pub fn load(&mut self) {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read settings file, keeping current values");
                return;
            }
        };
        match ConfigDocument::parse(&text) {
            Ok(document) => {
                self.document = document;
                debug!(path = %self.path.display(), "Settings loaded");
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to parse settings file, keeping current values");
            }
        }
    }

    /// Check whether the backing file's modification time advanced; if
    /// so, reload and notify watchers in registration order. Driven by
    /// the main loop roughly once per second.
    pub fn poll(&mut self) {
        let Some(current) = file_mtime(&self.path) else {
            return;
        };
        if self.last_modified.is_none_or(|last| current > last) {
            info!(path = %self.path.display(), "Settings file changed, reloading");
            self.last_modified = Some(current);
            self.load();
            self.notify_watchers();
        }
    }

    /// Register a reload callback; runs after every detected file change.
    pub fn add_watcher<F>(&mut self, callback: F) -> WatcherId
    where
        F: FnMut() -> Result<()> + 'static,
    {
        let id = WatcherId(self.next_watcher_id);
        self.next_watcher_id += 1;
        self.watchers.push(Watcher {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Unregister a watcher. Unknown ids are ignored.
    pub fn remove_watcher(&mut self, id: WatcherId) {
        self.watchers.retain(|watcher| watcher.id != id);
    }

    fn notify_watchers(&mut self) {
        for watcher in &mut self.watchers {
            if let Err(e) = (watcher.callback)() {
                error!(watcher = watcher.id.0, error = ?e, "Settings watcher failed");
            }
        }
    }

    /// Raw value, inline comment and all
    pub fn get(&self, section: &str, key: &str, default: &str) -> String {
        self.document
            .get(section, key)
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.document
            .get(section, key)
            .and_then(document::parse_int)
            .unwrap_or(default)
    }

    pub fn get_float(&self, section: &str, key: &str, default: f64) -> f64 {
        self.document
            .get(section, key)
            .and_then(document::parse_float)
            .unwrap_or(default)
    }

    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        match self.document.get(section, key) {
            Some(value) => document::parse_bool(value),
            None => default,
        }
    }

    pub fn get_color(&self, section: &str, key: &str, default: Rgba) -> Rgba {
        self.document
            .get(section, key)
            .and_then(document::parse_color)
            .unwrap_or(default)
    }

    /// Rewrite a single boolean key in the backing file, preserving all
    /// other lines and the key's inline comment, then reload so reads
    /// are immediately consistent. The modification-time poll still
    /// observes the write and notifies watchers on its next pass.
    pub fn set_bool(&mut self, section: &str, key: &str, value: bool) -> Result<()> {
        let text = fs::read_to_string(&self.path).with_context(|| {
            format!("Failed to read settings file {}", self.path.display())
        })?;
        let value_text = if value { "true" } else { "false" };
        let Some(updated) = document::rewrite_key(&text, section, key, value_text) else {
            warn!(section, key, "Setting not found in file, nothing to rewrite");
            return Ok(());
        };
        fs::write(&self.path, updated).with_context(|| {
            format!("Failed to write settings file {}", self.path.display())
        })?;
        info!(section, key, value, "Updated setting");
        self.load();
        Ok(())
    }
}

/// Canonical settings path, creating the config directory if needed
pub fn default_settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join(app::CONFIG_DIR);
    fs::create_dir_all(&config_dir).with_context(|| {
        format!("Failed to create config directory {}", config_dir.display())
    })?;
    Ok(config_dir.join(app::SETTINGS_FILE))
}

/// Rename the pre-0.3 settings file to the canonical name. Failures are
/// logged; startup continues with defaults.
pub fn migrate_legacy_file(path: &Path) {
    let legacy = path.with_file_name(app::LEGACY_SETTINGS_FILE);
    if path.exists() || !legacy.exists() {
        return;
    }
    match fs::rename(&legacy, path) {
        Ok(()) => info!(from = %legacy.display(), to = %path.display(), "Migrated legacy settings file"),
        Err(e) => warn!(from = %legacy.display(), error = %e, "Failed to migrate legacy settings file"),
    }
}

/// Write the commented default template on first run. Never overwrites
/// an existing file and never runs as part of a reload.
pub fn write_template_if_missing(path: &Path) {
    if path.exists() {
        return;
    }
    match fs::write(path, DEFAULT_TEMPLATE) {
        Ok(()) => info!(path = %path.display(), "Wrote default settings file"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to write default settings file"),
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn write_file(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn set_mtime(path: &Path, when: SystemTime) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(when).unwrap();
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("absent.ini"));
        assert_eq!(store.get("window", "position_x", "raw"), "raw");
        assert_eq!(store.get_int("window", "proximity_threshold", 50), 50);
        assert_eq!(store.get_float("window", "position_x", 50.0), 50.0);
        assert!(store.get_bool("behavior", "auto_hide", true));
        assert_eq!(
            store.get_color("styling", "text", Rgba::WHITE),
            Rgba::WHITE
        );
    }

    #[test]
    fn test_typed_getters_fall_back_on_malformed_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "settings.ini",
            "[styling]\nfont_size = large\ntext = not-a-color\n[window]\nposition_x = 12.5 ; note\n",
        );
        let store = SettingsStore::open(path);
        assert_eq!(store.get_int("styling", "font_size", 40), 40);
        assert_eq!(store.get_color("styling", "text", Rgba::WHITE), Rgba::WHITE);
        assert_eq!(store.get_float("window", "position_x", 0.0), 12.5);
    }

    #[test]
    fn test_get_returns_raw_value_including_comment() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.ini", "[behavior]\nfullscreen_exclude = mpv ; video\n");
        let store = SettingsStore::open(path);
        assert_eq!(
            store.get("behavior", "fullscreen_exclude", ""),
            "mpv ; video"
        );
    }

    #[test]
    fn test_poll_reloads_once_per_mtime_advance() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.ini", "[window]\nposition_x = 10\n");
        let mut store = SettingsStore::open(path.clone());

        let fired = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&fired);
        store.add_watcher(move || {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        store.poll();
        assert_eq!(*fired.borrow(), 0);

        fs::write(&path, "[window]\nposition_x = 20\n").unwrap();
        set_mtime(&path, SystemTime::now() + Duration::from_secs(5));
        store.poll();
        assert_eq!(*fired.borrow(), 1);
        assert_eq!(store.get_float("window", "position_x", 0.0), 20.0);

        store.poll();
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_poll_ignores_backdated_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.ini", "[window]\nposition_x = 10\n");
        let mut store = SettingsStore::open(path.clone());

        let fired = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&fired);
        store.add_watcher(move || {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        fs::write(&path, "[window]\nposition_x = 30\n").unwrap();
        set_mtime(&path, SystemTime::now() - Duration::from_secs(100));
        store.poll();
        assert_eq!(*fired.borrow(), 0);
    }

    #[test]
    fn test_watchers_run_in_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.ini", "[window]\nposition_x = 10\n");
        let mut store = SettingsStore::open(path.clone());

        let order = Rc::new(RefCell::new(Vec::new()));
        let first = Rc::clone(&order);
        let second = Rc::clone(&order);
        store.add_watcher(move || {
            first.borrow_mut().push("first");
            Ok(())
        });
        store.add_watcher(move || {
            second.borrow_mut().push("second");
            Ok(())
        });

        set_mtime(&path, SystemTime::now() + Duration::from_secs(5));
        store.poll();
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_watcher_error_does_not_block_later_watchers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.ini", "[window]\nposition_x = 10\n");
        let mut store = SettingsStore::open(path.clone());

        let fired = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&fired);
        store.add_watcher(|| Err(anyhow::anyhow!("boom")));
        store.add_watcher(move || {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        set_mtime(&path, SystemTime::now() + Duration::from_secs(5));
        store.poll();
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_remove_watcher_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.ini", "[window]\nposition_x = 10\n");
        let mut store = SettingsStore::open(path.clone());

        let fired = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&fired);
        let id = store.add_watcher(move || {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        store.remove_watcher(id);
        store.remove_watcher(id);

        set_mtime(&path, SystemTime::now() + Duration::from_secs(5));
        store.poll();
        assert_eq!(*fired.borrow(), 0);
    }

    #[test]
    fn test_set_bool_rewrites_file_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "settings.ini",
            "[window]\nalways_on_top = true ; stay up\n[behavior]\nauto_hide = true\n",
        );
        let mut store = SettingsStore::open(path.clone());

        store.set_bool("window", "always_on_top", false).unwrap();
        assert!(!store.get_bool("window", "always_on_top", true));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "[window]\nalways_on_top = false; stay up\n[behavior]\nauto_hide = true\n"
        );
    }

    #[test]
    fn test_set_bool_missing_key_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let text = "[window]\nposition_x = 50\n";
        let path = write_file(&dir, "settings.ini", text);
        let mut store = SettingsStore::open(path.clone());

        store.set_bool("window", "absent", true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_parse_error_keeps_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.ini", "[window]\nposition_x = 10\n");
        let mut store = SettingsStore::open(path.clone());
        assert_eq!(store.get_float("window", "position_x", 0.0), 10.0);

        fs::write(&path, "orphan = before any section\n").unwrap();
        set_mtime(&path, SystemTime::now() + Duration::from_secs(5));
        store.poll();
        assert_eq!(store.get_float("window", "position_x", 0.0), 10.0);
    }

    #[test]
    fn test_legacy_file_is_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = write_file(&dir, app::LEGACY_SETTINGS_FILE, "[window]\nposition_x = 33\n");
        let path = dir.path().join(app::SETTINGS_FILE);

        migrate_legacy_file(&path);
        assert!(path.exists());
        assert!(!legacy.exists());

        let store = SettingsStore::open(path);
        assert_eq!(store.get_float("window", "position_x", 0.0), 33.0);
    }

    #[test]
    fn test_migration_never_clobbers_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir, app::LEGACY_SETTINGS_FILE, "[window]\nposition_x = 1\n");
        let path = write_file(&dir, app::SETTINGS_FILE, "[window]\nposition_x = 2\n");

        migrate_legacy_file(&path);
        let store = SettingsStore::open(path);
        assert_eq!(store.get_float("window", "position_x", 0.0), 2.0);
    }

    #[test]
    fn test_template_written_once_and_parseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(app::SETTINGS_FILE);

        write_template_if_missing(&path);
        let store = SettingsStore::open(path.clone());
        assert_eq!(store.get_float("window", "position_x", 0.0), 50.0);
        assert!(store.get_bool("styling", "shadow_enabled", false));
        assert_eq!(
            store.get_color("styling", "text", Rgba::BLACK),
            Rgba::WHITE
        );
        assert_eq!(store.get("format", "time_format", ""), "%I:%M");
        assert_eq!(store.get_int("behavior", "fade_duration", 0), 500);

        fs::write(&path, "[window]\nposition_x = 7\n").unwrap();
        write_template_if_missing(&path);
        let store = SettingsStore::open(path);
        assert_eq!(store.get_float("window", "position_x", 0.0), 7.0);
    }
}
