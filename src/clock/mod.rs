//! The clock window and its event loop.
//!
//! One override-redirect ARGB window with an empty input shape: always
//! frameless, click-through, resized every tick to fit the rendered
//! text. Visibility reacts to pointer proximity and fullscreen
//! applications through opacity fades.

mod fade;
mod font;
mod format;
mod fullscreen;
mod surface;

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::shape::{ConnectionExt as ShapeExt, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::constants::{app, timing, x11};
use crate::geometry::{self, ClockGeometry, Monitor, Rect, ShadowParams};
use crate::platform::WmIntegration;
use crate::settings::{Rgba, SettingsStore, WatcherId};
use crate::tray::{self, ToggleSetting, TrayCommand, TrayHandle, TrayState};
use crate::x11_utils::{self, AppContext};

use fade::{FadeAnimation, FadeDone};
use font::ClockFont;
use format::{clock_texts, DEFAULT_SECONDS_FORMAT, DEFAULT_TIME_FORMAT};
use fullscreen::{parse_exclusions, FullscreenTracker, FullscreenTransition};
use surface::{RenderSurface, RenderedFrame, ShadowStyle, TextStyle};

/// Deadline tracker for one periodic job of the single-threaded loop
struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    /// Change the cadence. An unchanged interval keeps its phase; a new
    /// one restarts from now, like resetting a timer.
    fn set_interval(&mut self, interval: Duration) {
        if interval != self.interval {
            self.interval = interval;
            self.next = Instant::now() + interval;
        }
    }

    fn due(&mut self, now: Instant) -> bool {
        if now >= self.next {
            self.next = now + self.interval;
            true
        } else {
            false
        }
    }

    fn deadline(&self) -> Instant {
        self.next
    }
}

fn interval_ms(value: i64) -> Duration {
    Duration::from_millis(value.max(1) as u64)
}

/// Edge-triggered auto-hide decision: a fade target only when the
/// pointer crosses the proximity boundary, never while it stays put.
fn proximity_fade(near: bool, hidden: bool) -> Option<f64> {
    match (near, hidden) {
        (true, false) => Some(0.0),
        (false, true) => Some(1.0),
        _ => None,
    }
}

pub struct ClockWindow<'a> {
    ctx: AppContext<'a>,
    wm: Box<dyn WmIntegration>,
    settings: SettingsStore,

    window: Window,
    colormap: Colormap,
    gc: Gcontext,

    monitors: Vec<Monitor>,
    geometry: ClockGeometry,
    surface: RenderSurface,
    frame: Option<RenderedFrame>,

    size: (u16, u16),
    position: (i32, i32),
    opacity: f64,
    fade: Option<FadeAnimation>,
    mapped: bool,
    proximity_hidden: bool,
    fullscreen: FullscreenTracker,
    closing: bool,
    done: bool,

    watcher: WatcherId,
    reload_rx: mpsc::Receiver<()>,
    tray: Option<TrayHandle>,
    tray_rx: mpsc::Receiver<TrayCommand>,

    time_ticker: Ticker,
    mouse_ticker: Ticker,
    fullscreen_ticker: Ticker,
    settings_ticker: Ticker,
}

impl<'a> ClockWindow<'a> {
    pub fn new(
        ctx: AppContext<'a>,
        wm: Box<dyn WmIntegration>,
        mut settings: SettingsStore,
    ) -> Result<Self> {
        let monitors = x11_utils::monitors(&ctx)?;
        let geometry = ClockGeometry::new(x11_utils::dpi_scale(ctx.screen));
        info!(
            monitors = monitors.len(),
            dpi_scale = geometry.dpi_scale(),
            "Display layout"
        );

        let family = settings.get("styling", "font_family", "Sen");
        let weight = settings.get("styling", "font_weight", "normal");
        let clock_font = ClockFont::load(&family, &weight)
            .context("Failed to load any usable font")?;
        let surface = RenderSurface::new(clock_font);

        let visual = x11_utils::find_argb_visual(ctx.screen)?;
        let colormap = ctx
            .conn
            .generate_id()
            .context("Failed to generate X11 colormap ID")?;
        ctx.conn
            .create_colormap(ColormapAlloc::NONE, colormap, ctx.screen.root, visual)
            .context("Failed to create colormap for ARGB visual")?;

        let window = ctx
            .conn
            .generate_id()
            .context("Failed to generate X11 window ID")?;
        ctx.conn
            .create_window(
                x11::ARGB_DEPTH,
                window,
                ctx.screen.root,
                0,
                0,
                1,
                1,
                0,
                WindowClass::INPUT_OUTPUT,
                visual,
                &CreateWindowAux::new()
                    .background_pixel(0)
                    .border_pixel(0)
                    .colormap(colormap)
                    .override_redirect(x11::OVERRIDE_REDIRECT)
                    .event_mask(EventMask::EXPOSURE),
            )
            .context("Failed to create clock window")?;

        // Cleanup guard that releases the X resources if we fail during
        // initialization, so nothing leaks into the running server.
        struct WindowGuard<'b> {
            conn: &'b RustConnection,
            window: Window,
            colormap: Colormap,
            should_cleanup: bool,
        }

        impl Drop for WindowGuard<'_> {
            fn drop(&mut self) {
                if self.should_cleanup {
                    if let Err(e) = self.conn.destroy_window(self.window) {
                        error!(
                            "Failed to cleanup window {} after initialization failure: {}",
                            self.window, e
                        );
                    }
                    if let Err(e) = self.conn.free_colormap(self.colormap) {
                        error!(
                            "Failed to cleanup colormap {} after initialization failure: {}",
                            self.colormap, e
                        );
                    }
                    let _ = self.conn.flush();
                }
            }
        }

        let mut window_guard = WindowGuard {
            conn: ctx.conn,
            window,
            colormap,
            should_cleanup: true,
        };

        Self::setup_window_properties(&ctx, window)?;

        let gc = ctx
            .conn
            .generate_id()
            .context("Failed to generate X11 graphics context ID")?;
        ctx.conn
            .create_gc(gc, window, &CreateGCAux::new())
            .context("Failed to create graphics context for clock window")?;

        // Transparent until the startup fade brings it in.
        x11_utils::set_window_opacity(&ctx, window, 0.0)?;

        let (tray_tx, tray_rx) = mpsc::channel();
        let initial_tray_state = TrayState {
            always_on_top: settings.get_bool("window", "always_on_top", true),
            hide_in_fullscreen: settings.get_bool("behavior", "hide_in_fullscreen", true),
            auto_hide: settings.get_bool("behavior", "auto_hide", true),
        };
        let tray = match tray::spawn(initial_tray_state, tray_tx) {
            Ok(handle) => Some(handle),
            Err(error) => {
                warn!(error = ?error, "Running without a tray icon");
                None
            }
        };

        let (reload_tx, reload_rx) = mpsc::channel();
        let watcher = settings.add_watcher(move || {
            reload_tx
                .send(())
                .context("Settings reload channel closed")?;
            Ok(())
        });

        let time_ticker = Ticker::new(interval_ms(settings.get_int(
            "behavior",
            "update_interval",
            1000,
        )));
        let mouse_ticker = Ticker::new(interval_ms(settings.get_int(
            "behavior",
            "mouse_check_interval",
            200,
        )));

        let clock = Self {
            ctx,
            wm,
            settings,
            window,
            colormap,
            gc,
            monitors,
            geometry,
            surface,
            frame: None,
            size: (1, 1),
            position: (0, 0),
            opacity: 0.0,
            fade: None,
            mapped: false,
            proximity_hidden: false,
            fullscreen: FullscreenTracker::new(),
            closing: false,
            done: false,
            watcher,
            reload_rx,
            tray,
            tray_rx,
            time_ticker,
            mouse_ticker,
            fullscreen_ticker: Ticker::new(Duration::from_millis(timing::FULLSCREEN_CHECK_MS)),
            settings_ticker: Ticker::new(Duration::from_millis(timing::SETTINGS_POLL_MS)),
        };

        window_guard.should_cleanup = false;
        Ok(clock)
    }

    fn setup_window_properties(ctx: &AppContext, window: Window) -> Result<()> {
        // Set WM_CLASS
        ctx.conn
            .change_property8(
                PropMode::REPLACE,
                window,
                AtomEnum::WM_CLASS,
                AtomEnum::STRING,
                b"hoverclock\0hoverclock\0",
            )
            .context("Failed to set WM_CLASS on clock window")?;

        ctx.conn
            .change_property8(
                PropMode::REPLACE,
                window,
                ctx.atoms.net_wm_name,
                ctx.atoms.utf8_string,
                app::NAME.as_bytes(),
            )
            .context("Failed to set _NET_WM_NAME on clock window")?;

        // An empty input region makes the whole window click-through.
        ctx.conn
            .shape_rectangles(
                SO::SET,
                SK::INPUT,
                ClipOrdering::UNSORTED,
                window,
                0,
                0,
                &[],
            )
            .context("Failed to clear input shape on clock window")?;
        Ok(())
    }

    /// Main loop. Returns once a close request has finished its
    /// fade-out or the X connection dies.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        self.apply_settings()
            .context("Failed to apply settings at startup")?;
        self.animate_opacity(1.0, FadeDone::Settle);

        while !self.done {
            while let Some(event) = self
                .ctx
                .conn
                .poll_for_event()
                .context("Lost connection to X server")?
            {
                self.handle_x_event(event);
            }

            if shutdown.load(Ordering::Relaxed) && !self.closing {
                info!("Received shutdown signal");
                self.begin_close();
            }

            while let Ok(command) = self.tray_rx.try_recv() {
                let _ = self
                    .handle_tray_command(command)
                    .inspect_err(|err| error!(error = ?err, "Tray command failed"));
            }

            let now = Instant::now();
            if self.settings_ticker.due(now) {
                self.settings.poll();
            }
            let mut reload = false;
            while self.reload_rx.try_recv().is_ok() {
                reload = true;
            }
            if reload {
                let _ = self
                    .apply_settings()
                    .inspect_err(|err| error!(error = ?err, "Failed to apply reloaded settings"));
            }

            if self.time_ticker.due(now) {
                let _ = self
                    .update_time()
                    .inspect_err(|err| error!(error = ?err, "Failed to update clock"));
            }
            if self.mouse_ticker.due(now) {
                let _ = self
                    .check_mouse_proximity()
                    .inspect_err(|err| error!(error = ?err, "Proximity check failed"));
            }
            if self.fullscreen_ticker.due(now) {
                self.check_fullscreen();
            }
            if self.fade.is_some() {
                let _ = self
                    .step_fade()
                    .inspect_err(|err| error!(error = ?err, "Fade step failed"));
            }

            self.sleep_until_next_deadline();
        }

        self.settings.remove_watcher(self.watcher);
        if let Some(tray) = self.tray.take() {
            tray.shutdown();
        }
        info!("Clock loop finished");
        Ok(())
    }

    fn sleep_until_next_deadline(&self) {
        let deadline = self
            .time_ticker
            .deadline()
            .min(self.mouse_ticker.deadline())
            .min(self.fullscreen_ticker.deadline())
            .min(self.settings_ticker.deadline());
        let mut wait = deadline.saturating_duration_since(Instant::now());
        if self.fade.is_some() {
            wait = wait.min(Duration::from_millis(timing::FADE_STEP_MS));
        }
        wait = wait
            .min(Duration::from_millis(timing::LOOP_IDLE_CAP_MS))
            .max(Duration::from_millis(1));
        thread::sleep(wait);
    }

    fn handle_x_event(&mut self, event: Event) {
        match event {
            Event::Expose(expose) if expose.window == self.window && expose.count == 0 => {
                let _ = self
                    .push_frame()
                    .inspect_err(|err| error!(error = ?err, "Failed to repaint after expose"));
            }
            Event::Error(error) => {
                error!(error = ?error, "X11 error event");
            }
            _ => {}
        }
    }

    /// Startup, every settings reload, and the poll after tray toggles
    fn apply_settings(&mut self) -> Result<()> {
        if self.closing {
            return Ok(());
        }
        info!("Applying settings");
        let saved_opacity = self.opacity;
        self.set_mapped(false)?;

        let on_top = self.settings.get_bool("window", "always_on_top", true);
        self.wm.set_always_on_top(&self.ctx, self.window, on_top)?;

        let family = self.settings.get("styling", "font_family", "Sen");
        let weight = self.settings.get("styling", "font_weight", "normal");
        match ClockFont::load(&family, &weight) {
            Ok(clock_font) => self.surface.set_font(clock_font),
            Err(error) => {
                error!(error = ?error, family, "Could not load configured font, keeping the previous one");
            }
        }
        let style = self.text_style();
        self.surface.set_style(style);

        self.monitors = x11_utils::monitors(&self.ctx)?;
        self.update_time()?;

        self.set_opacity(saved_opacity)?;
        self.set_mapped(true)?;
        if on_top {
            x11_utils::raise_window(&self.ctx, self.window)?;
        }

        self.time_ticker.set_interval(interval_ms(self.settings.get_int(
            "behavior",
            "update_interval",
            1000,
        )));
        self.mouse_ticker.set_interval(interval_ms(self.settings.get_int(
            "behavior",
            "mouse_check_interval",
            200,
        )));

        if !self.settings.get_bool("behavior", "hide_in_fullscreen", true)
            && self.fullscreen.reset()
        {
            info!("Fullscreen hiding disabled while hidden, restoring clock");
            self.animate_opacity(1.0, FadeDone::Settle);
        }
        if !self.settings.get_bool("behavior", "auto_hide", true) && self.proximity_hidden {
            self.proximity_hidden = false;
            self.set_opacity(1.0)?;
        }

        self.refresh_tray();
        self.ctx
            .conn
            .flush()
            .context("Failed to flush X11 connection after settings apply")?;
        Ok(())
    }

    /// Once per tick: render the current time and refit the window
    fn update_time(&mut self) -> Result<()> {
        let time_format = self
            .settings
            .get("format", "time_format", DEFAULT_TIME_FORMAT);
        let seconds_format =
            self.settings
                .get("format", "time_seconds_format", DEFAULT_SECONDS_FORMAT);
        let (time_text, seconds_text) =
            clock_texts(Local::now().naive_local(), &time_format, &seconds_format);
        self.surface.set_texts(&time_text, &seconds_text);

        let font_size = self.settings.get_int("styling", "font_size", 40).max(1);
        let ratio = self.settings.get_float("format", "time_seconds_size", 0.5);
        let seconds_px = (font_size as f64 * ratio).round().max(1.0) as f32;
        self.surface.set_sizes(font_size as f32, seconds_px);

        self.layout()?;
        self.repaint()
    }

    /// Resize to fit the text and reassert the percentage placement
    fn layout(&mut self) -> Result<()> {
        let combined = format!(
            "{}{}",
            self.surface.time_text(),
            self.surface.seconds_text()
        );
        let (width, height) = self
            .geometry
            .total_size(&self.surface, &combined, self.shadow_params());
        if (width, height) != self.size {
            self.ctx
                .conn
                .configure_window(
                    self.window,
                    &ConfigureWindowAux::new()
                        .width(width as u32)
                        .height(height as u32),
                )
                .context("Failed to resize clock window")?;
            self.size = (width, height);
        }
        self.reposition()
    }

    fn reposition(&mut self) -> Result<()> {
        let index = self.settings.get_int("window", "position_screen", 0);
        let Some(screen) = geometry::select_screen(&self.monitors, index) else {
            warn!(index, "No usable monitor, leaving the clock in place");
            return Ok(());
        };
        let text_height = self
            .surface
            .text_height()
            .unwrap_or_else(|_| self.size.1 as f64);
        let placement = geometry::Placement {
            screen,
            position_x: self.settings.get_float("window", "position_x", 50.0),
            position_y: self.settings.get_float("window", "position_y", 50.0),
            main_text_width: self.surface.main_text_width(),
            seconds_text_width: self.surface.seconds_text_width(),
            text_height,
            window_width: self.size.0 as f64,
            window_height: self.size.1 as f64,
        };
        let (x, y) = geometry::resolve_position(&placement);
        if (x, y) != self.position {
            self.ctx
                .conn
                .configure_window(self.window, &ConfigureWindowAux::new().x(x).y(y))
                .context("Failed to move clock window")?;
            self.position = (x, y);
        }
        Ok(())
    }

    fn repaint(&mut self) -> Result<()> {
        match self.surface.compose(self.size.0, self.size.1) {
            Ok(frame) => {
                self.frame = Some(frame);
                self.push_frame()
            }
            Err(error) => {
                error!(error = ?error, "Failed to compose clock frame");
                Ok(())
            }
        }
    }

    /// Upload the cached frame to the window
    fn push_frame(&self) -> Result<()> {
        let Some(frame) = &self.frame else {
            return Ok(());
        };
        if frame.width == 0 || frame.height == 0 {
            return Ok(());
        }

        // Convert Vec<u32> ARGB to bytes in X11 native format (little-endian BGRA)
        let mut image_data = Vec::with_capacity(frame.data.len() * 4);
        for pixel in &frame.data {
            image_data.push(*pixel as u8); // B
            image_data.push((pixel >> 8) as u8); // G
            image_data.push((pixel >> 16) as u8); // R
            image_data.push((pixel >> 24) as u8); // A
        }

        self.ctx
            .conn
            .put_image(
                ImageFormat::Z_PIXMAP,
                self.window,
                self.gc,
                frame.width,
                frame.height,
                0,
                0,
                0,
                x11::ARGB_DEPTH,
                &image_data,
            )
            .context("Failed to upload clock frame")?;
        self.ctx
            .conn
            .flush()
            .context("Failed to flush X11 connection after frame upload")?;
        Ok(())
    }

    fn check_mouse_proximity(&mut self) -> Result<()> {
        if self.closing || !self.mapped {
            return Ok(());
        }
        if !self.settings.get_bool("behavior", "auto_hide", true) {
            return Ok(());
        }
        let threshold = self.settings.get_int("window", "proximity_threshold", 50);
        let threshold = threshold.clamp(0, i32::MAX as i64) as i32;
        let (pointer_x, pointer_y) = x11_utils::pointer_position(&self.ctx)?;
        let near = Rect::new(
            self.position.0,
            self.position.1,
            self.size.0 as i32,
            self.size.1 as i32,
        )
        .expanded(threshold)
        .contains(pointer_x, pointer_y);

        if let Some(target) = proximity_fade(near, self.proximity_hidden) {
            debug!(near, "Pointer proximity changed");
            self.proximity_hidden = near;
            self.animate_opacity(target, FadeDone::Settle);
        }
        Ok(())
    }

    fn check_fullscreen(&mut self) {
        if self.closing || !self.wm.supports_fullscreen() {
            return;
        }
        if !self.settings.get_bool("behavior", "hide_in_fullscreen", true) {
            return;
        }
        let Some(screen) = geometry::primary_screen(&self.monitors) else {
            return;
        };
        let exclusions =
            parse_exclusions(&self.settings.get("behavior", "fullscreen_exclude", ""));

        let scan = self
            .wm
            .fullscreen_app(&self.ctx, self.window, &screen, &exclusions);
        let app = match scan {
            Ok(app) => app,
            Err(error) => {
                self.fullscreen.note_error(Instant::now(), &error);
                return;
            }
        };

        match self.fullscreen.observe(app) {
            Some(FullscreenTransition::Entered { app }) => {
                info!(app, "Fullscreen application detected, hiding clock");
                self.animate_opacity(0.0, FadeDone::HideWindow);
            }
            Some(FullscreenTransition::Exited) => {
                info!("Fullscreen application gone, restoring clock");
                let _ = self
                    .set_mapped(true)
                    .inspect_err(|err| error!(error = ?err, "Failed to remap clock window"));
                if !self.proximity_hidden {
                    self.animate_opacity(1.0, FadeDone::Settle);
                }
            }
            None => {}
        }
    }

    /// Replace any in-flight fade with one from the current opacity
    fn animate_opacity(&mut self, target: f64, on_finish: FadeDone) {
        let duration = self
            .settings
            .get_int("behavior", "fade_duration", 500)
            .max(0) as u64;
        self.fade = Some(FadeAnimation::new(
            self.opacity,
            target,
            Duration::from_millis(duration),
            on_finish,
        ));
    }

    fn step_fade(&mut self) -> Result<()> {
        let Some(fade) = &self.fade else {
            return Ok(());
        };
        let (opacity, done) = fade.sample(Instant::now());
        self.set_opacity(opacity)?;
        if let Some(action) = done {
            self.fade = None;
            match action {
                FadeDone::Settle => {}
                FadeDone::HideWindow => self.set_mapped(false)?,
                FadeDone::CloseApp => self.done = true,
            }
        }
        Ok(())
    }

    fn set_opacity(&mut self, opacity: f64) -> Result<()> {
        if opacity != self.opacity {
            x11_utils::set_window_opacity(&self.ctx, self.window, opacity)?;
            self.opacity = opacity;
        }
        Ok(())
    }

    fn set_mapped(&mut self, mapped: bool) -> Result<()> {
        if mapped == self.mapped {
            return Ok(());
        }
        self.mapped = mapped;
        if mapped {
            self.ctx
                .conn
                .map_window(self.window)
                .context("Failed to map clock window")?;
        } else {
            self.ctx
                .conn
                .unmap_window(self.window)
                .context("Failed to unmap clock window")?;
        }
        self.ctx
            .conn
            .flush()
            .context("Failed to flush X11 connection after visibility change")?;
        Ok(())
    }

    fn handle_tray_command(&mut self, command: TrayCommand) -> Result<()> {
        match command {
            TrayCommand::OpenConfig => {
                self.open_config();
                Ok(())
            }
            TrayCommand::Toggle(setting, value) => {
                info!(setting = ?setting, value, "Tray toggle");
                self.settings
                    .set_bool(setting.section(), setting.key(), value)?;
                // Cheap immediate effects; the settings poll notices the
                // rewrite and runs the full apply on its next pass.
                match setting {
                    ToggleSetting::AlwaysOnTop => {
                        self.wm.set_always_on_top(&self.ctx, self.window, value)?;
                        if value {
                            x11_utils::raise_window(&self.ctx, self.window)?;
                        }
                        self.ctx
                            .conn
                            .flush()
                            .context("Failed to flush X11 connection after level change")?;
                    }
                    ToggleSetting::AutoHide if !value => {
                        if self.proximity_hidden {
                            self.proximity_hidden = false;
                            self.set_opacity(1.0)?;
                        }
                    }
                    _ => {}
                }
                Ok(())
            }
            TrayCommand::Quit => {
                self.begin_close();
                Ok(())
            }
        }
    }

    fn open_config(&self) {
        let path = self.settings.path().to_path_buf();
        info!(path = %path.display(), "Opening settings file");
        match Command::new("xdg-open").arg(&path).spawn() {
            Ok(mut child) => {
                // Reap the handler so it never lingers as a zombie.
                thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(error) => error!(error = ?error, "Failed to open settings file"),
        }
    }

    /// Fade out, then let the loop tear everything down
    fn begin_close(&mut self) {
        if self.closing {
            return;
        }
        info!("Shutting down");
        self.closing = true;
        self.animate_opacity(0.0, FadeDone::CloseApp);
    }

    fn shadow_params(&self) -> Option<ShadowParams> {
        if !self.settings.get_bool("styling", "shadow_enabled", true) {
            return None;
        }
        Some(ShadowParams {
            blur: self.settings.get_int("styling", "shadow_blur", 2),
            offset_x: self.settings.get_int("styling", "shadow_offset_x", 2),
            offset_y: self.settings.get_int("styling", "shadow_offset_y", 2),
        })
    }

    fn text_style(&self) -> TextStyle {
        let shadow = self.shadow_params().map(|params| ShadowStyle {
            color: self.settings.get_color("styling", "shadow", Rgba::WHITE),
            blur: self.geometry.scale_px(params.blur).max(0),
            offset_x: self.geometry.scale_px(params.offset_x),
            offset_y: self.geometry.scale_px(params.offset_y),
        });
        let outline_width = self.settings.get_int("styling", "outline_width", 1);
        TextStyle {
            text_color: self.settings.get_color("styling", "text", Rgba::WHITE),
            outline_width: i32::try_from(outline_width.max(0)).unwrap_or(i32::MAX),
            gradient_angle_deg: self.settings.get_float("styling", "gradient_angle", 90.0),
            gradient_start: self.settings.get_color("styling", "gradient_start", Rgba::BLACK),
            gradient_end: self.settings.get_color("styling", "gradient_end", Rgba::WHITE),
            shadow,
        }
    }

    fn tray_state(&self) -> TrayState {
        TrayState {
            always_on_top: self.settings.get_bool("window", "always_on_top", true),
            hide_in_fullscreen: self.settings.get_bool("behavior", "hide_in_fullscreen", true),
            auto_hide: self.settings.get_bool("behavior", "auto_hide", true),
        }
    }

    fn refresh_tray(&self) {
        if let Some(tray) = &self.tray {
            tray.update(self.tray_state());
        }
    }
}

impl Drop for ClockWindow<'_> {
    fn drop(&mut self) {
        // Clean up each resource independently to prevent cascade failures
        if let Err(e) = self.ctx.conn.free_gc(self.gc) {
            error!("Failed to free GC {}: {}", self.gc, e);
        }
        if let Err(e) = self.ctx.conn.destroy_window(self.window) {
            error!("Failed to destroy window {}: {}", self.window, e);
        }
        if let Err(e) = self.ctx.conn.free_colormap(self.colormap) {
            error!("Failed to free colormap {}: {}", self.colormap, e);
        }
        let _ = self.ctx.conn.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_fires_once_per_interval() {
        let mut ticker = Ticker::new(Duration::from_millis(100));
        let start = ticker.deadline();
        assert!(!ticker.due(start - Duration::from_millis(1)));
        assert!(ticker.due(start));
        assert!(!ticker.due(start));
        assert!(ticker.due(start + Duration::from_millis(100)));
    }

    #[test]
    fn test_ticker_interval_change_restarts_phase() {
        let mut ticker = Ticker::new(Duration::from_millis(100));
        let original = ticker.deadline();
        ticker.set_interval(Duration::from_millis(100));
        assert_eq!(ticker.deadline(), original); // unchanged keeps phase
        ticker.set_interval(Duration::from_millis(500));
        assert!(ticker.deadline() >= original);
    }

    #[test]
    fn test_interval_ms_clamps_nonpositive() {
        assert_eq!(interval_ms(1000), Duration::from_millis(1000));
        assert_eq!(interval_ms(0), Duration::from_millis(1));
        assert_eq!(interval_ms(-50), Duration::from_millis(1));
    }

    #[test]
    fn test_proximity_crossing_fades_once() {
        // Pointer approaches: one fade out, then quiet while it stays.
        assert_eq!(proximity_fade(true, false), Some(0.0));
        assert_eq!(proximity_fade(true, true), None);
        // Pointer leaves: one fade in, then quiet.
        assert_eq!(proximity_fade(false, true), Some(1.0));
        assert_eq!(proximity_fade(false, false), None);
    }
}
