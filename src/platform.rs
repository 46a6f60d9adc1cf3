//! Window manager integration seam. The always-on-top hint and the
//! fullscreen scan sit behind a capability trait with a no-op fallback,
//! so the clock keeps running under window managers without EWMH.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use x11rb::protocol::xproto::{AtomEnum, PropMode, Window};
use x11rb::wrapper::ConnectionExt;

use crate::constants::fullscreen;
use crate::geometry::Rect;
use crate::x11_utils::{self, AppContext};

pub trait WmIntegration {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Publish or withdraw the above hint on the clock window
    fn set_always_on_top(&self, ctx: &AppContext, window: Window, on_top: bool) -> Result<()>;

    /// Whether the fullscreen scan can work in this session
    fn supports_fullscreen(&self) -> bool;

    /// Class name of a window covering the given screen, if any
    fn fullscreen_app(
        &self,
        ctx: &AppContext,
        own_window: Window,
        screen_rect: &Rect,
        exclusions: &HashSet<String>,
    ) -> Result<Option<String>>;
}

/// Real integration for EWMH-compliant window managers
pub struct EwmhIntegration;

impl WmIntegration for EwmhIntegration {
    fn name(&self) -> &'static str {
        "ewmh"
    }

    fn set_always_on_top(&self, ctx: &AppContext, window: Window, on_top: bool) -> Result<()> {
        let states: &[u32] = if on_top {
            &[ctx.atoms.net_wm_state_above]
        } else {
            &[]
        };
        ctx.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                ctx.atoms.net_wm_state,
                AtomEnum::ATOM,
                states,
            )
            .context(format!(
                "Failed to update _NET_WM_STATE for window {}",
                window
            ))?;
        Ok(())
    }

    fn supports_fullscreen(&self) -> bool {
        true
    }

    fn fullscreen_app(
        &self,
        ctx: &AppContext,
        own_window: Window,
        screen_rect: &Rect,
        exclusions: &HashSet<String>,
    ) -> Result<Option<String>> {
        let min_width = screen_rect.width as f64 * fullscreen::COVERAGE_THRESHOLD;
        let min_height = screen_rect.height as f64 * fullscreen::COVERAGE_THRESHOLD;

        for window in x11_utils::client_list(ctx)? {
            if window == own_window {
                continue;
            }
            // Windows can vanish between listing and querying; a failed
            // query just drops that window from this scan.
            match covering_class(ctx, window, min_width, min_height, exclusions) {
                Ok(Some(class)) => return Ok(Some(class)),
                Ok(None) => {}
                Err(error) => {
                    debug!(window, error = ?error, "Skipping window that vanished during scan");
                }
            }
        }
        Ok(None)
    }
}

/// Stub used when the window manager does not advertise what we need.
/// Window-level calls succeed silently and the fullscreen scan stays off.
pub struct NoWmIntegration;

impl WmIntegration for NoWmIntegration {
    fn name(&self) -> &'static str {
        "none"
    }

    fn set_always_on_top(&self, _ctx: &AppContext, _window: Window, _on_top: bool) -> Result<()> {
        Ok(())
    }

    fn supports_fullscreen(&self) -> bool {
        false
    }

    fn fullscreen_app(
        &self,
        _ctx: &AppContext,
        _own_window: Window,
        _screen_rect: &Rect,
        _exclusions: &HashSet<String>,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

fn covering_class(
    ctx: &AppContext,
    window: Window,
    min_width: f64,
    min_height: f64,
    exclusions: &HashSet<String>,
) -> Result<Option<String>> {
    if !x11_utils::is_viewable(ctx, window)? {
        return Ok(None);
    }
    let states = x11_utils::window_states(ctx, window)?;
    if states.contains(&ctx.atoms.net_wm_state_hidden) {
        return Ok(None);
    }
    let class = x11_utils::window_class(ctx, window)?.unwrap_or_default();
    if exclusions.contains(&class) {
        debug!(class, "Ignoring excluded application");
        return Ok(None);
    }
    let rect = x11_utils::window_geometry(ctx, window)?;
    if rect.width as f64 >= min_width && rect.height as f64 >= min_height {
        Ok(Some(class))
    } else {
        Ok(None)
    }
}

/// Pick the integration by probing _NET_SUPPORTED on the root window
pub fn detect(ctx: &AppContext) -> Box<dyn WmIntegration> {
    let required = [ctx.atoms.net_wm_state_above, ctx.atoms.net_client_list];
    match x11_utils::wm_supports(ctx, &required) {
        Ok(true) => {
            info!("Window manager advertises EWMH hints");
            Box::new(EwmhIntegration)
        }
        Ok(false) => {
            warn!("Window manager lacks EWMH hints, fullscreen detection disabled");
            Box::new(NoWmIntegration)
        }
        Err(error) => {
            warn!(error = ?error, "Could not probe window manager capabilities, fullscreen detection disabled");
            Box::new(NoWmIntegration)
        }
    }
}
