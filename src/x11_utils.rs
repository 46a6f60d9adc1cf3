use anyhow::{Context, Result};
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as RandrExt;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::constants::{layout, x11};
use crate::geometry::{Monitor, Rect};

/// Application context holding immutable shared state
pub struct AppContext<'a> {
    pub conn: &'a RustConnection,
    pub screen: &'a Screen,
    pub atoms: &'a CachedAtoms,
}

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub net_wm_window_opacity: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_state_hidden: Atom,
    pub net_wm_name: Atom,
    pub net_client_list: Atom,
    pub net_supported: Atom,
    pub utf8_string: Atom,
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        // Do all intern_atom roundtrips once at startup
        Ok(Self {
            net_wm_window_opacity: conn.intern_atom(false, b"_NET_WM_WINDOW_OPACITY")
                .context("Failed to intern _NET_WM_WINDOW_OPACITY atom")?
                .reply()
                .context("Failed to get reply for _NET_WM_WINDOW_OPACITY atom")?
                .atom,
            net_wm_state: conn.intern_atom(false, b"_NET_WM_STATE")
                .context("Failed to intern _NET_WM_STATE atom")?
                .reply()
                .context("Failed to get reply for _NET_WM_STATE atom")?
                .atom,
            net_wm_state_above: conn.intern_atom(false, b"_NET_WM_STATE_ABOVE")
                .context("Failed to intern _NET_WM_STATE_ABOVE atom")?
                .reply()
                .context("Failed to get reply for _NET_WM_STATE_ABOVE atom")?
                .atom,
            net_wm_state_hidden: conn.intern_atom(false, b"_NET_WM_STATE_HIDDEN")
                .context("Failed to intern _NET_WM_STATE_HIDDEN atom")?
                .reply()
                .context("Failed to get reply for _NET_WM_STATE_HIDDEN atom")?
                .atom,
            net_wm_name: conn.intern_atom(false, b"_NET_WM_NAME")
                .context("Failed to intern _NET_WM_NAME atom")?
                .reply()
                .context("Failed to get reply for _NET_WM_NAME atom")?
                .atom,
            net_client_list: conn.intern_atom(false, b"_NET_CLIENT_LIST")
                .context("Failed to intern _NET_CLIENT_LIST atom")?
                .reply()
                .context("Failed to get reply for _NET_CLIENT_LIST atom")?
                .atom,
            net_supported: conn.intern_atom(false, b"_NET_SUPPORTED")
                .context("Failed to intern _NET_SUPPORTED atom")?
                .reply()
                .context("Failed to get reply for _NET_SUPPORTED atom")?
                .atom,
            utf8_string: conn.intern_atom(false, b"UTF8_STRING")
                .context("Failed to intern UTF8_STRING atom")?
                .reply()
                .context("Failed to get reply for UTF8_STRING atom")?
                .atom,
        })
    }
}

/// Find the 32-bit TrueColor visual needed for a translucent window
pub fn find_argb_visual(screen: &Screen) -> Result<Visualid> {
    for depth in &screen.allowed_depths {
        if depth.depth != x11::ARGB_DEPTH {
            continue;
        }
        if let Some(visual) = depth
            .visuals
            .iter()
            .find(|visual| visual.class == VisualClass::TRUE_COLOR)
        {
            debug!(visual = visual.visual_id, "Found 32-bit TrueColor visual");
            return Ok(visual.visual_id);
        }
    }
    anyhow::bail!("No 32-bit TrueColor visual on this screen. Check that the X server supports the RENDER extension.")
}

/// Set _NET_WM_WINDOW_OPACITY on a window. The compositor reads it as
/// a CARDINAL fraction of u32::MAX.
pub fn set_window_opacity(ctx: &AppContext, window: Window, opacity: f64) -> Result<()> {
    let value = (opacity.clamp(0.0, 1.0) * x11::OPACITY_OPAQUE as f64) as u32;
    ctx.conn
        .change_property32(
            PropMode::REPLACE,
            window,
            ctx.atoms.net_wm_window_opacity,
            AtomEnum::CARDINAL,
            &[value],
        )
        .context(format!("Failed to set opacity on window {}", window))?;
    ctx.conn
        .flush()
        .context("Failed to flush X11 connection after opacity change")?;
    Ok(())
}

/// Raise a window to the top of the stack
pub fn raise_window(ctx: &AppContext, window: Window) -> Result<()> {
    ctx.conn
        .configure_window(
            window,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )
        .context(format!("Failed to raise window {} to top of stack", window))?;
    Ok(())
}

/// Current pointer position in root coordinates
pub fn pointer_position(ctx: &AppContext) -> Result<(i32, i32)> {
    let reply = ctx
        .conn
        .query_pointer(ctx.screen.root)
        .context("Failed to query pointer position")?
        .reply()
        .context("Failed to get reply for pointer query")?;
    Ok((reply.root_x as i32, reply.root_y as i32))
}

/// Monitor layout from RandR, falling back to the core screen size
/// when the extension reports nothing usable
pub fn monitors(ctx: &AppContext) -> Result<Vec<Monitor>> {
    let reply = ctx
        .conn
        .randr_get_monitors(ctx.screen.root, true)
        .context("Failed to query RandR monitors")?
        .reply()
        .context("Failed to get reply for RandR monitor query")?;

    let mut found: Vec<Monitor> = reply
        .monitors
        .iter()
        .map(|info| Monitor {
            rect: Rect::new(
                info.x as i32,
                info.y as i32,
                info.width as i32,
                info.height as i32,
            ),
            primary: info.primary,
        })
        .collect();

    if found.is_empty() {
        warn!("RandR reported no monitors, using core screen dimensions");
        found.push(Monitor {
            rect: Rect::new(
                0,
                0,
                ctx.screen.width_in_pixels as i32,
                ctx.screen.height_in_pixels as i32,
            ),
            primary: true,
        });
    }
    debug!(count = found.len(), "Enumerated monitors");
    Ok(found)
}

/// Display scale factor derived from the reported physical size
pub fn dpi_scale(screen: &Screen) -> f64 {
    if screen.width_in_millimeters == 0 {
        return 1.0;
    }
    let dpi = screen.width_in_pixels as f64 * 25.4 / screen.width_in_millimeters as f64;
    let scale = dpi / layout::BASELINE_DPI;
    debug!(dpi, scale, "Computed display scale");
    scale
}

/// Resource class from WM_CLASS, the stable name under which window
/// managers and users know an application
pub fn window_class(ctx: &AppContext, window: Window) -> Result<Option<String>> {
    let reply = ctx
        .conn
        .get_property(
            false,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            0,
            1024,
        )
        .context(format!("Failed to query WM_CLASS for window {}", window))?
        .reply()
        .context(format!("Failed to get WM_CLASS reply for window {}", window))?;

    // WM_CLASS holds "instance\0class\0"; the class is the second field.
    let mut fields = reply
        .value
        .split(|&byte| byte == 0)
        .filter(|field| !field.is_empty());
    let instance = fields.next();
    let class = fields.next().or(instance);
    Ok(class.map(|field| String::from_utf8_lossy(field).into_owned()))
}

/// Window geometry in root coordinates
pub fn window_geometry(ctx: &AppContext, window: Window) -> Result<Rect> {
    let geometry = ctx
        .conn
        .get_geometry(window)
        .context(format!("Failed to query geometry for window {}", window))?
        .reply()
        .context(format!("Failed to get geometry reply for window {}", window))?;
    let translated = ctx
        .conn
        .translate_coordinates(window, ctx.screen.root, 0, 0)
        .context(format!("Failed to translate coordinates for window {}", window))?
        .reply()
        .context(format!(
            "Failed to get coordinate translation reply for window {}",
            window
        ))?;
    Ok(Rect::new(
        translated.dst_x as i32,
        translated.dst_y as i32,
        geometry.width as i32,
        geometry.height as i32,
    ))
}

/// Whether a window is currently viewable (mapped, all ancestors mapped)
pub fn is_viewable(ctx: &AppContext, window: Window) -> Result<bool> {
    let attributes = ctx
        .conn
        .get_window_attributes(window)
        .context(format!("Failed to query attributes for window {}", window))?
        .reply()
        .context(format!("Failed to get attributes reply for window {}", window))?;
    Ok(attributes.map_state == MapState::VIEWABLE)
}

/// _NET_WM_STATE atoms currently set on a window
pub fn window_states(ctx: &AppContext, window: Window) -> Result<Vec<Atom>> {
    let reply = ctx
        .conn
        .get_property(
            false,
            window,
            ctx.atoms.net_wm_state,
            AtomEnum::ATOM,
            0,
            1024,
        )
        .context(format!("Failed to query _NET_WM_STATE for window {}", window))?
        .reply()
        .context(format!(
            "Failed to get _NET_WM_STATE reply for window {}",
            window
        ))?;
    Ok(reply
        .value32()
        .map(|values| values.collect())
        .unwrap_or_default())
}

/// Check whether the window manager advertises every given atom in
/// _NET_SUPPORTED on the root window
pub fn wm_supports(ctx: &AppContext, required: &[Atom]) -> Result<bool> {
    let reply = ctx
        .conn
        .get_property(
            false,
            ctx.screen.root,
            ctx.atoms.net_supported,
            AtomEnum::ATOM,
            0,
            4096,
        )
        .context("Failed to query _NET_SUPPORTED on root window")?
        .reply()
        .context("Failed to get reply for _NET_SUPPORTED query")?;
    let supported: Vec<Atom> = reply
        .value32()
        .map(|values| values.collect())
        .unwrap_or_default();
    Ok(required.iter().all(|atom| supported.contains(atom)))
}

/// Top-level windows managed by the window manager
pub fn client_list(ctx: &AppContext) -> Result<Vec<Window>> {
    let reply = ctx
        .conn
        .get_property(
            false,
            ctx.screen.root,
            ctx.atoms.net_client_list,
            AtomEnum::WINDOW,
            0,
            4096,
        )
        .context("Failed to query _NET_CLIENT_LIST on root window")?
        .reply()
        .context("Failed to get reply for _NET_CLIENT_LIST query")?;
    Ok(reply
        .value32()
        .map(|values| values.collect())
        .unwrap_or_default())
}
