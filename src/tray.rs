//! Status notifier item. The tray runs on its own thread inside a
//! single-threaded tokio runtime (ksni speaks D-Bus asynchronously);
//! menu activations flow back to the main loop over a channel.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use ksni::menu::{CheckmarkItem, MenuItem, StandardItem};
use ksni::{Icon, TrayMethods};
use tracing::{error, info, warn};

use crate::constants::app;

/// How long to wait for the status notifier host to accept us
const REGISTER_TIMEOUT: Duration = Duration::from_secs(5);

/// Actions requested from the tray menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    OpenConfig,
    Toggle(ToggleSetting, bool),
    Quit,
}

/// The three settings exposed as tray checkboxes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleSetting {
    AlwaysOnTop,
    HideInFullscreen,
    AutoHide,
}

impl ToggleSetting {
    pub fn section(self) -> &'static str {
        match self {
            Self::AlwaysOnTop => "window",
            Self::HideInFullscreen | Self::AutoHide => "behavior",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::AlwaysOnTop => "always_on_top",
            Self::HideInFullscreen => "hide_in_fullscreen",
            Self::AutoHide => "auto_hide",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AlwaysOnTop => "Always on Top",
            Self::HideInFullscreen => "Hide in Fullscreen",
            Self::AutoHide => "Auto Hide",
        }
    }
}

/// Checkbox state shown in the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrayState {
    pub always_on_top: bool,
    pub hide_in_fullscreen: bool,
    pub auto_hide: bool,
}

struct ClockTray {
    state: TrayState,
    commands: mpsc::Sender<TrayCommand>,
}

impl ClockTray {
    fn send(&self, command: TrayCommand) {
        if self.commands.send(command).is_err() {
            warn!("Main loop is gone, dropping tray command");
        }
    }

    /// Flip a checkbox optimistically and tell the main loop; the
    /// authoritative state comes back through `TrayHandle::update`.
    fn toggle(&mut self, setting: ToggleSetting) {
        let flag = match setting {
            ToggleSetting::AlwaysOnTop => &mut self.state.always_on_top,
            ToggleSetting::HideInFullscreen => &mut self.state.hide_in_fullscreen,
            ToggleSetting::AutoHide => &mut self.state.auto_hide,
        };
        *flag = !*flag;
        let value = *flag;
        self.send(TrayCommand::Toggle(setting, value));
    }
}

impl ksni::Tray for ClockTray {
    fn id(&self) -> String {
        app::NAME.to_string()
    }

    fn title(&self) -> String {
        app::NAME.to_string()
    }

    fn icon_pixmap(&self) -> Vec<Icon> {
        vec![clock_icon(22), clock_icon(48)]
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        vec![
            StandardItem {
                label: "Open Config".into(),
                activate: Box::new(|tray: &mut Self| tray.send(TrayCommand::OpenConfig)),
                ..Default::default()
            }
            .into(),
            MenuItem::Separator,
            CheckmarkItem {
                label: ToggleSetting::AlwaysOnTop.label().into(),
                checked: self.state.always_on_top,
                activate: Box::new(|tray: &mut Self| tray.toggle(ToggleSetting::AlwaysOnTop)),
                ..Default::default()
            }
            .into(),
            CheckmarkItem {
                label: ToggleSetting::HideInFullscreen.label().into(),
                checked: self.state.hide_in_fullscreen,
                activate: Box::new(|tray: &mut Self| tray.toggle(ToggleSetting::HideInFullscreen)),
                ..Default::default()
            }
            .into(),
            CheckmarkItem {
                label: ToggleSetting::AutoHide.label().into(),
                checked: self.state.auto_hide,
                activate: Box::new(|tray: &mut Self| tray.toggle(ToggleSetting::AutoHide)),
                ..Default::default()
            }
            .into(),
            MenuItem::Separator,
            StandardItem {
                label: "Quit".into(),
                activate: Box::new(|tray: &mut Self| tray.send(TrayCommand::Quit)),
                ..Default::default()
            }
            .into(),
        ]
    }
}

/// Handle owned by the main loop. Dropping it (or calling `shutdown`)
/// ends the tray thread.
pub struct TrayHandle {
    updates: tokio::sync::mpsc::UnboundedSender<TrayState>,
    thread: thread::JoinHandle<()>,
}

impl TrayHandle {
    /// Push authoritative checkbox state after a settings apply
    pub fn update(&self, state: TrayState) {
        // A closed channel means the notifier host went away; the
        // clock keeps running without a tray.
        let _ = self.updates.send(state);
    }

    pub fn shutdown(self) {
        let TrayHandle { updates, thread } = self;
        drop(updates);
        if thread.join().is_err() {
            error!("Tray thread panicked during shutdown");
        }
    }
}

/// Register the status notifier item on a dedicated thread and wait
/// for the registration to succeed or fail.
pub fn spawn(initial: TrayState, commands: mpsc::Sender<TrayCommand>) -> Result<TrayHandle> {
    let (update_tx, mut update_rx) = tokio::sync::mpsc::unbounded_channel::<TrayState>();
    let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

    let thread = thread::Builder::new()
        .name("tray".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build tray runtime")
            {
                Ok(runtime) => runtime,
                Err(error) => {
                    let _ = ready_tx.send(Err(error));
                    return;
                }
            };

            runtime.block_on(async move {
                let tray = ClockTray {
                    state: initial,
                    commands,
                };
                let handle = match tray
                    .spawn()
                    .await
                    .context("Failed to register status notifier item")
                {
                    Ok(handle) => {
                        let _ = ready_tx.send(Ok(()));
                        handle
                    }
                    Err(error) => {
                        let _ = ready_tx.send(Err(error));
                        return;
                    }
                };

                while let Some(state) = update_rx.recv().await {
                    let _ = handle.update(|tray| tray.state = state).await;
                }
                handle.shutdown().await;
            });
        })
        .context("Failed to spawn tray thread")?;

    match ready_rx.recv_timeout(REGISTER_TIMEOUT) {
        Ok(Ok(())) => {
            info!("Tray icon registered");
            Ok(TrayHandle {
                updates: update_tx,
                thread,
            })
        }
        Ok(Err(error)) => {
            let _ = thread.join();
            Err(error)
        }
        // The thread winds down on its own once update_tx drops.
        Err(_) => anyhow::bail!("Timed out waiting for status notifier registration"),
    }
}

/// Draw the clock-face icon: a ring with two hands, white on
/// transparent so it reads on both panel themes. ksni wants ARGB32 in
/// network byte order.
fn clock_icon(size: i32) -> Icon {
    let dimension = size as usize;
    let center = (size as f64 - 1.0) / 2.0;
    let radius = size as f64 / 2.0 - 1.0;
    let ring_width = (size as f64 / 16.0).max(1.0);

    let mut data = Vec::with_capacity(dimension * dimension * 4);
    for y in 0..dimension {
        for x in 0..dimension {
            let dx = x as f64 - center;
            let dy = y as f64 - center;
            let distance = (dx * dx + dy * dy).sqrt();

            let outer = (radius + 0.5 - distance).clamp(0.0, 1.0);
            let inner = (distance - (radius - ring_width) + 0.5).clamp(0.0, 1.0);
            let ring = outer.min(inner);

            // Minute hand points at twelve, hour hand at two.
            let minute = hand_coverage(dx, dy, 0.0, -1.0, radius * 0.72, ring_width / 2.0);
            let hour = hand_coverage(dx, dy, 0.866, -0.5, radius * 0.48, ring_width / 2.0);

            let alpha = (ring.max(minute).max(hour) * 255.0).round() as u8;
            data.extend_from_slice(&[alpha, 255, 255, 255]);
        }
    }

    Icon {
        width: size,
        height: size,
        data,
    }
}

/// Coverage of a hand segment running from the center along a unit
/// direction, with feathered sides and tip
fn hand_coverage(dx: f64, dy: f64, ux: f64, uy: f64, length: f64, half_width: f64) -> f64 {
    let along = dx * ux + dy * uy;
    if along < 0.0 {
        return 0.0;
    }
    let across = (dx * uy - dy * ux).abs();
    let side = (half_width + 0.5 - across).clamp(0.0, 1.0);
    let tip = (length + 0.5 - along).clamp(0.0, 1.0);
    side.min(tip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_setting_names_match_config_keys() {
        assert_eq!(ToggleSetting::AlwaysOnTop.section(), "window");
        assert_eq!(ToggleSetting::AlwaysOnTop.key(), "always_on_top");
        assert_eq!(ToggleSetting::HideInFullscreen.section(), "behavior");
        assert_eq!(ToggleSetting::HideInFullscreen.key(), "hide_in_fullscreen");
        assert_eq!(ToggleSetting::AutoHide.section(), "behavior");
        assert_eq!(ToggleSetting::AutoHide.key(), "auto_hide");
    }

    #[test]
    fn test_toggle_flips_state_and_reports_new_value() {
        let (tx, rx) = mpsc::channel();
        let mut tray = ClockTray {
            state: TrayState {
                always_on_top: true,
                hide_in_fullscreen: false,
                auto_hide: true,
            },
            commands: tx,
        };

        tray.toggle(ToggleSetting::AlwaysOnTop);
        assert!(!tray.state.always_on_top);
        assert_eq!(
            rx.try_recv().unwrap(),
            TrayCommand::Toggle(ToggleSetting::AlwaysOnTop, false)
        );

        tray.toggle(ToggleSetting::HideInFullscreen);
        assert!(tray.state.hide_in_fullscreen);
        assert_eq!(
            rx.try_recv().unwrap(),
            TrayCommand::Toggle(ToggleSetting::HideInFullscreen, true)
        );
    }

    #[test]
    fn test_toggle_survives_disconnected_main_loop() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut tray = ClockTray {
            state: TrayState::default(),
            commands: tx,
        };
        tray.toggle(ToggleSetting::AutoHide);
        assert!(tray.state.auto_hide);
    }

    #[test]
    fn test_clock_icon_shape() {
        let icon = clock_icon(22);
        assert_eq!(icon.width, 22);
        assert_eq!(icon.height, 22);
        assert_eq!(icon.data.len(), 22 * 22 * 4);

        let alpha_at = |x: usize, y: usize| icon.data[(y * 22 + x) * 4];
        // Corners are transparent, the ring and hands are not.
        assert_eq!(alpha_at(0, 0), 0);
        assert_eq!(alpha_at(21, 21), 0);
        assert!(alpha_at(10, 1) > 0); // top of the ring
        assert!(alpha_at(10, 6) > 0); // minute hand
    }
}
