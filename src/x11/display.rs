//! Primary display geometry via RandR

use anyhow::{Context, Result};
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::randr::{ConnectionExt as RandrExt, NotifyMask, QueryVersionReply};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::common::types::Rect;

/// Subscribe to root resizes and (when RandR is present) output changes.
/// Returns whether RandR is available.
pub fn select_geometry_events(conn: &RustConnection, root: Window) -> Result<bool> {
    conn.change_window_attributes(
        root,
        &ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY),
    )
    .context("Failed to select StructureNotify on root window")?;

    // A server without RandR rejects the request before it is sent
    let query = conn
        .randr_query_version(1, 3)
        .map_err(ReplyError::from)
        .and_then(|cookie| cookie.reply());
    let randr = randr_supported(query);

    if randr {
        conn.randr_select_input(
            root,
            NotifyMask::SCREEN_CHANGE | NotifyMask::CRTC_CHANGE | NotifyMask::OUTPUT_CHANGE,
        )
        .context("Failed to select RandR notifications")?;
    }

    conn.flush().context("Failed to flush X11 connection")?;
    Ok(randr)
}

fn randr_supported(query: Result<QueryVersionReply, ReplyError>) -> bool {
    match query {
        Ok(version) => {
            debug!(
                major = version.major_version,
                minor = version.minor_version,
                "RandR available"
            );
            true
        }
        Err(e) => {
            warn!(error = %e, "RandR unavailable, using root window size as display bounds");
            false
        }
    }
}

/// Bounds of the primary output, falling back to the root window geometry
pub fn primary_bounds(conn: &RustConnection, root: Window, randr: bool) -> Result<Rect> {
    if randr {
        match primary_crtc_bounds(conn, root) {
            Ok(Some(rect)) => return Ok(rect),
            Ok(None) => debug!("No primary output with an active CRTC, using root geometry"),
            Err(e) => warn!(error = ?e, "Failed to query primary output, using root geometry"),
        }
    }

    let geometry = conn
        .get_geometry(root)
        .context("Failed to send geometry query for root window")?
        .reply()
        .context("Failed to get root window geometry")?;

    Ok(Rect::new(0, 0, geometry.width, geometry.height))
}

fn primary_crtc_bounds(conn: &RustConnection, root: Window) -> Result<Option<Rect>> {
    let output = conn
        .randr_get_output_primary(root)
        .context("Failed to send RandR GetOutputPrimary")?
        .reply()
        .context("Failed to get RandR primary output")?
        .output;
    if output == x11rb::NONE {
        return Ok(None);
    }

    let crtc = conn
        .randr_get_output_info(output, x11rb::CURRENT_TIME)
        .context("Failed to send RandR GetOutputInfo")?
        .reply()
        .with_context(|| format!("Failed to get RandR info for output {}", output))?
        .crtc;
    if crtc == x11rb::NONE {
        return Ok(None);
    }

    let info = conn
        .randr_get_crtc_info(crtc, x11rb::CURRENT_TIME)
        .context("Failed to send RandR GetCrtcInfo")?
        .reply()
        .with_context(|| format!("Failed to get RandR info for CRTC {}", crtc))?;

    let rect = Rect::new(info.x, info.y, info.width, info.height);
    Ok((!rect.is_empty()).then_some(rect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb::errors::ConnectionError;

    #[test]
    fn test_missing_randr_falls_back() {
        let unsupported = Err(ReplyError::from(ConnectionError::UnsupportedExtension));
        assert!(!randr_supported(unsupported));

        let version = QueryVersionReply {
            sequence: 1,
            length: 0,
            major_version: 1,
            minor_version: 6,
        };
        assert!(randr_supported(Ok(version)));
    }
}
