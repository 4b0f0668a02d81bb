//! Forwarding-identity headers.

pub mod forward;

pub(crate) mod parser;

pub use forward::{
    set_forwarded, BoundAddress, ConnectionIdentity, ForwardedOverrides, ForwardedParams,
    PeerAddress,
};
