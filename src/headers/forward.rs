//! Synthesis of the `Forwarded` header and its legacy `X-Forwarded-*`
//! companions for outbound proxy requests.
//!
//! See [RFC-7239](https://datatracker.ietf.org/doc/html/rfc7239) for the
//! specification of the `Forwarded` header.

use std::net::{IpAddr, SocketAddr};

use bytes::{BufMut, BytesMut};
use http::header::HeaderValue;
use http::HeaderMap;

use crate::escape::append_backslash_escaped;

use super::parser::address_list;

/// The `Forwarded` header, the standard header identifying the client and
/// the proxies a request traversed.
pub const FORWARDED: http::HeaderName = http::header::FORWARDED;

/// The `X-Forwarded-For` header, the de-facto predecessor of the
/// `Forwarded` header's `for=` directive.
pub const X_FORWARDED_FOR: http::HeaderName =
    http::header::HeaderName::from_static("x-forwarded-for");

/// The `X-Forwarded-Host` header, carrying the host the client originally
/// asked for.
pub const X_FORWARDED_HOST: http::HeaderName =
    http::header::HeaderName::from_static("x-forwarded-host");

/// The `X-Forwarded-Proto` header, carrying the scheme the client used to
/// reach the proxy.
pub const X_FORWARDED_PROTO: http::HeaderName =
    http::header::HeaderName::from_static("x-forwarded-proto");

/// The `X-Host` header, an older alias of `X-Forwarded-Host` still read by
/// some backends.
pub const X_HOST: http::HeaderName = http::header::HeaderName::from_static("x-host");

/// Which directives to emit for this proxy's hop.
///
/// Enabled directives are always emitted in the order `for`, `by`,
/// `proto`, `host`, `remote_user`, regardless of configuration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ForwardedParams {
    /// Emit `for=`, the client the request was received from.
    pub r#for: bool,
    /// Emit `by=`, the interface the request was received on.
    pub by: bool,
    /// Emit `proto=`, the scheme the client connected with.
    pub proto: bool,
    /// Emit `host=`, the host the client asked for, when one is known.
    pub host: bool,
    /// Emit `remote_user=`, the authenticated user, when one is known.
    pub remote_user: bool,
}

impl ForwardedParams {
    /// Whether any directive is enabled.
    ///
    /// When none are, no `Forwarded` header is created or extended; the
    /// legacy headers are emitted regardless.
    pub fn any(&self) -> bool {
        self.r#for || self.by || self.proto || self.host || self.remote_user
    }
}

/// The client-side peer of the proxied connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddress {
    /// An IP peer, rendered without a port.
    Inet(IpAddr),
    /// A local-domain socket peer, identified by its path token.
    Local(String),
}

impl From<IpAddr> for PeerAddress {
    fn from(ip: IpAddr) -> Self {
        PeerAddress::Inet(ip)
    }
}

impl PeerAddress {
    fn raw(&self) -> String {
        match self {
            PeerAddress::Inet(ip) => ip.to_string(),
            PeerAddress::Local(token) => token.clone(),
        }
    }
}

/// The locally bound address a request arrived on.
///
/// Listeners bound to a wildcard address must be resolved through the
/// accepted socket before this is filled in, so the reported `by=` names a
/// concrete interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundAddress {
    /// An IP listener, rendered as `ip:port` (with brackets for IPv6).
    Inet(SocketAddr),
    /// A local-domain socket, identified by its path token.
    Local(String),
}

impl From<SocketAddr> for BoundAddress {
    fn from(addr: SocketAddr) -> Self {
        BoundAddress::Inet(addr)
    }
}

/// Connection identity the hop's directives are drawn from.
#[derive(Debug, Clone, Default)]
pub struct ConnectionIdentity {
    /// Address of the client peer, when known.
    pub peer: Option<PeerAddress>,
    /// Resolved local bound address, when known.
    pub local: Option<BoundAddress>,
    /// Whether the client connection negotiated TLS.
    pub secure: bool,
    /// Authenticated user name, when authentication happened upstream.
    pub remote_user: Option<String>,
    /// The authority the client presented in its Host header.
    pub host: Option<String>,
}

/// Values resolved by an upstream trust layer.
///
/// When a chain of proxies has already validated an earlier hop, the
/// caller supplies the validated client address, scheme and host here and
/// they take precedence over the connection's own identity. This is an
/// explicit capability handed to the builder, never discovered from
/// ambient state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedOverrides {
    /// Replaces the peer address in `for=` and `X-Forwarded-For`.
    pub r#for: Option<String>,
    /// Replaces the negotiated scheme in `proto=` and `X-Forwarded-Proto`.
    pub proto: Option<String>,
    /// Replaces the client Host in `host=`, `X-Host` and
    /// `X-Forwarded-Host`.
    pub host: Option<String>,
}

/// Append the `Forwarded` header and the legacy `X-Forwarded-*` / `X-Host`
/// headers for this hop.
///
/// When `params` enables any directive and no `Forwarded` header exists
/// yet, a new one is created and seeded from an existing `X-Forwarded-For`
/// list, so history recorded by legacy-only upstream proxies is not lost.
/// An existing `Forwarded` header has the new hop appended after `", "`.
///
/// The legacy headers are appended unconditionally, each as a new header
/// line. In particular `X-Forwarded-For` is never merged into an existing
/// comma list; coalescing duplicate lines is the transport's business.
pub fn set_forwarded(
    headers: &mut HeaderMap,
    params: ForwardedParams,
    identity: &ConnectionIdentity,
    overrides: &ForwardedOverrides,
) {
    if params.any() {
        let mut value = BytesMut::new();
        match headers.get(&FORWARDED) {
            Some(existing) => {
                value.extend_from_slice(existing.as_bytes());
                value.extend_from_slice(b", ");
            }
            None => seed_from_x_forwarded_for(&mut value, headers),
        }
        append_hop(&mut value, params, identity, overrides);
        if let Ok(value) = HeaderValue::from_maybe_shared(value.freeze()) {
            headers.insert(FORWARDED, value);
        }
    }

    let peer = overrides
        .r#for
        .clone()
        .or_else(|| identity.peer.as_ref().map(PeerAddress::raw));
    if let Some(value) = peer.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.append(X_FORWARDED_FOR, value);
    }

    let host = overrides.host.as_deref().or(identity.host.as_deref());
    if let Some(value) = host
        .filter(|h| !h.is_empty())
        .and_then(|h| HeaderValue::from_str(h).ok())
    {
        headers.append(X_HOST, value.clone());
        headers.append(X_FORWARDED_HOST, value);
    }

    let proto = overrides
        .proto
        .as_deref()
        .unwrap_or(if identity.secure { "https" } else { "http" });
    if let Ok(value) = HeaderValue::from_str(proto) {
        headers.append(X_FORWARDED_PROTO, value);
    }
}

/// Translate each address in an existing `X-Forwarded-For` list into a
/// `for="…"` directive, so the new header starts with the recorded chain.
fn seed_from_x_forwarded_for(value: &mut BytesMut, headers: &HeaderMap) {
    let Some(xff) = headers.get(&X_FORWARDED_FOR) else {
        return;
    };
    let Ok(tokens) = address_list(xff.as_bytes()) else {
        return;
    };
    for token in tokens {
        value.extend_from_slice(b"for=");
        append_quoted_address(value, token);
        value.extend_from_slice(b", ");
    }
}

/// Quote an address token, bracketing it when it contains a `:`.
///
/// The colon test is a deliberately loose IPv6 heuristic: list entries are
/// copied from an untrusted header and are not validated as addresses,
/// which is also why the content is escaped.
fn append_quoted_address(out: &mut BytesMut, token: &[u8]) {
    let ipv6 = token.contains(&b':');
    out.put_u8(b'"');
    if ipv6 {
        out.put_u8(b'[');
    }
    append_backslash_escaped(out, token);
    if ipv6 {
        out.put_u8(b']');
    }
    out.put_u8(b'"');
}

fn append_hop(
    out: &mut BytesMut,
    params: ForwardedParams,
    identity: &ConnectionIdentity,
    overrides: &ForwardedOverrides,
) {
    let mut separate = false;
    let mut directive = |out: &mut BytesMut, name: &[u8]| {
        if separate {
            out.put_u8(b';');
        }
        out.extend_from_slice(name);
        out.put_u8(b'=');
        separate = true;
    };

    if params.r#for {
        if let Some(value) = &overrides.r#for {
            directive(out, b"for");
            append_quoted_address(out, value.as_bytes());
        } else {
            match &identity.peer {
                Some(PeerAddress::Inet(ip)) => {
                    directive(out, b"for");
                    out.put_u8(b'"');
                    if ip.is_ipv6() {
                        out.put_u8(b'[');
                        out.extend_from_slice(ip.to_string().as_bytes());
                        out.put_u8(b']');
                    } else {
                        out.extend_from_slice(ip.to_string().as_bytes());
                    }
                    out.put_u8(b'"');
                }
                Some(PeerAddress::Local(token)) => {
                    directive(out, b"for");
                    out.put_u8(b'"');
                    append_backslash_escaped(out, token.as_bytes());
                    out.put_u8(b'"');
                }
                None => {}
            }
        }
    }

    if params.by {
        match &identity.local {
            Some(BoundAddress::Inet(addr)) => {
                directive(out, b"by");
                out.put_u8(b'"');
                out.extend_from_slice(addr.to_string().as_bytes());
                out.put_u8(b'"');
            }
            Some(BoundAddress::Local(token)) => {
                directive(out, b"by");
                out.put_u8(b'"');
                append_backslash_escaped(out, token.as_bytes());
                out.put_u8(b'"');
            }
            None => {}
        }
    }

    if params.proto {
        directive(out, b"proto");
        let proto = overrides
            .proto
            .as_deref()
            .unwrap_or(if identity.secure { "https" } else { "http" });
        out.extend_from_slice(proto.as_bytes());
    }

    if params.host {
        if let Some(host) = overrides.host.as_deref().or(identity.host.as_deref()) {
            directive(out, b"host");
            out.put_u8(b'"');
            append_backslash_escaped(out, host.as_bytes());
            out.put_u8(b'"');
        }
    }

    if params.remote_user {
        if let Some(user) = &identity.remote_user {
            directive(out, b"remote_user");
            out.put_u8(b'"');
            append_backslash_escaped(out, user.as_bytes());
            out.put_u8(b'"');
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn identity(peer: &str, secure: bool) -> ConnectionIdentity {
        ConnectionIdentity {
            peer: Some(PeerAddress::Inet(peer.parse().unwrap())),
            local: None,
            secure,
            remote_user: None,
            host: None,
        }
    }

    #[test]
    fn for_and_proto_with_legacy_headers() {
        let mut headers = HeaderMap::new();
        let params = ForwardedParams {
            r#for: true,
            proto: true,
            ..Default::default()
        };

        set_forwarded(
            &mut headers,
            params,
            &identity("203.0.113.5", true),
            &ForwardedOverrides::default(),
        );

        assert_eq!(
            headers.get(FORWARDED).unwrap(),
            "for=\"203.0.113.5\";proto=https"
        );
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "203.0.113.5");
        assert_eq!(headers.get(X_FORWARDED_PROTO).unwrap(), "https");
        assert!(headers.get(X_HOST).is_none());
        assert!(headers.get(X_FORWARDED_HOST).is_none());
    }

    #[test]
    fn ipv6_peer_is_bracketed() {
        let mut headers = HeaderMap::new();
        let params = ForwardedParams {
            r#for: true,
            ..Default::default()
        };

        set_forwarded(
            &mut headers,
            params,
            &identity("::1", false),
            &ForwardedOverrides::default(),
        );

        assert_eq!(headers.get(FORWARDED).unwrap(), "for=\"[::1]\"");
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "::1");
    }

    #[test]
    fn directives_follow_the_fixed_order() {
        let mut headers = HeaderMap::new();
        let params = ForwardedParams {
            r#for: true,
            by: true,
            proto: true,
            host: true,
            remote_user: true,
        };
        let identity = ConnectionIdentity {
            peer: Some(PeerAddress::Inet(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 60)))),
            local: Some(BoundAddress::Inet("198.51.100.1:8080".parse().unwrap())),
            secure: false,
            remote_user: Some("alice".into()),
            host: Some("public.example".into()),
        };

        set_forwarded(
            &mut headers,
            params,
            &identity,
            &ForwardedOverrides::default(),
        );

        assert_eq!(
            headers.get(FORWARDED).unwrap(),
            "for=\"192.0.2.60\";by=\"198.51.100.1:8080\";proto=http;host=\"public.example\";remote_user=\"alice\""
        );
        assert_eq!(headers.get(X_HOST).unwrap(), "public.example");
        assert_eq!(headers.get(X_FORWARDED_HOST).unwrap(), "public.example");
    }

    #[test]
    fn local_socket_tokens_are_escaped() {
        let mut headers = HeaderMap::new();
        let params = ForwardedParams {
            by: true,
            ..Default::default()
        };
        let identity = ConnectionIdentity {
            local: Some(BoundAddress::Local("/run/proxy\"1\".sock".into())),
            ..Default::default()
        };

        set_forwarded(
            &mut headers,
            params,
            &identity,
            &ForwardedOverrides::default(),
        );

        assert_eq!(
            headers.get(FORWARDED).unwrap(),
            "by=\"/run/proxy\\\"1\\\".sock\""
        );
    }

    #[test]
    fn ipv6_bound_address_keeps_its_port() {
        let mut headers = HeaderMap::new();
        let params = ForwardedParams {
            by: true,
            ..Default::default()
        };
        let identity = ConnectionIdentity {
            local: Some(BoundAddress::Inet("[2001:db8::1]:443".parse().unwrap())),
            ..Default::default()
        };

        set_forwarded(
            &mut headers,
            params,
            &identity,
            &ForwardedOverrides::default(),
        );

        assert_eq!(headers.get(FORWARDED).unwrap(), "by=\"[2001:db8::1]:443\"");
    }

    #[test]
    fn existing_header_gets_the_hop_appended() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED, "for=192.0.2.43".parse().unwrap());
        let params = ForwardedParams {
            r#for: true,
            ..Default::default()
        };

        set_forwarded(
            &mut headers,
            params,
            &identity("203.0.113.5", false),
            &ForwardedOverrides::default(),
        );

        assert_eq!(
            headers.get(FORWARDED).unwrap(),
            "for=192.0.2.43, for=\"203.0.113.5\""
        );
    }

    #[test]
    fn fresh_header_is_seeded_from_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, "203.0.113.7, 2001:db8::1".parse().unwrap());
        let params = ForwardedParams {
            r#for: true,
            ..Default::default()
        };

        set_forwarded(
            &mut headers,
            params,
            &identity("203.0.113.5", false),
            &ForwardedOverrides::default(),
        );

        assert_eq!(
            headers.get(FORWARDED).unwrap(),
            "for=\"203.0.113.7\", for=\"[2001:db8::1]\", for=\"203.0.113.5\""
        );
    }

    #[test]
    fn x_forwarded_for_is_appended_as_a_new_line() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, "203.0.113.7".parse().unwrap());

        set_forwarded(
            &mut headers,
            ForwardedParams::default(),
            &identity("203.0.113.5", false),
            &ForwardedOverrides::default(),
        );

        let lines: Vec<_> = headers.get_all(X_FORWARDED_FOR).iter().collect();
        assert_eq!(lines, vec!["203.0.113.7", "203.0.113.5"]);
        assert!(headers.get(FORWARDED).is_none());
    }

    #[test]
    fn overrides_take_precedence() {
        let mut headers = HeaderMap::new();
        let params = ForwardedParams {
            r#for: true,
            proto: true,
            host: true,
            ..Default::default()
        };
        let mut identity = identity("203.0.113.5", false);
        identity.host = Some("internal.example".into());
        let overrides = ForwardedOverrides {
            r#for: Some("198.51.100.17".into()),
            proto: Some("https".into()),
            host: Some("public.example".into()),
        };

        set_forwarded(&mut headers, params, &identity, &overrides);

        assert_eq!(
            headers.get(FORWARDED).unwrap(),
            "for=\"198.51.100.17\";proto=https;host=\"public.example\""
        );
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "198.51.100.17");
        assert_eq!(headers.get(X_HOST).unwrap(), "public.example");
        assert_eq!(headers.get(X_FORWARDED_PROTO).unwrap(), "https");
    }

    #[test]
    fn escaped_host_survives_quoting() {
        let mut headers = HeaderMap::new();
        let params = ForwardedParams {
            host: true,
            ..Default::default()
        };
        let identity = ConnectionIdentity {
            host: Some("host\"with\\marks".into()),
            ..Default::default()
        };

        set_forwarded(
            &mut headers,
            params,
            &identity,
            &ForwardedOverrides::default(),
        );

        assert_eq!(
            headers.get(FORWARDED).unwrap().as_bytes(),
            b"host=\"host\\\"with\\\\marks\"".as_slice()
        );
    }
}
