//! Protocol-upgrade gating at the proxy boundary.
//!
//! The engine only decides whether an upgrade negotiation passes through;
//! switching the connection into transparent streaming is the surrounding
//! gateway's job, signalled with the [`UpgradeTransition`] response
//! extension.

use http::{HeaderMap, StatusCode, Version};

/// The `Upgrade` header, naming the protocols a party wants to switch to.
pub const UPGRADE: http::HeaderName = http::header::UPGRADE;

/// Marker extension placed on a response when the backend accepted an
/// upgrade this request was allowed to pass through, and the connection
/// must be handed to the streaming layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeTransition;

/// Whether `version` can carry an `Upgrade` negotiation.
///
/// Upgrades exist only in HTTP/1.1; HTTP/1.0 lacks them and HTTP/2 onward
/// replaced them with protocol-level mechanisms.
pub fn version_supports_upgrade(version: Version) -> bool {
    version == Version::HTTP_11
}

/// Whether the client asked to upgrade the connection.
pub fn upgrade_requested(headers: &HeaderMap) -> bool {
    headers.contains_key(UPGRADE)
}

/// Whether this response completes an upgrade negotiation.
pub fn is_upgrade_response(status: StatusCode, headers: &HeaderMap) -> bool {
    if status != StatusCode::SWITCHING_PROTOCOLS {
        return false;
    }
    let upgrade = headers.contains_key(UPGRADE);
    if upgrade {
        tracing::trace!("backend answered 101 with an Upgrade header");
    }
    upgrade
}
