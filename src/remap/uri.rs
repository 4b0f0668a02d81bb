//! URI rewriting: scheme, authority and url-path in one pass.

use crate::buffer::HeaderBuffer;

use super::context::RemapContext;
use super::host::{match_authority, HostMatch};
use super::table::{Direction, RemapTables};
use super::urlpath::remap_urlpath;

/// Rewrite the URI or URL starting at `off` in place.
///
/// A value beginning with `/` is a bare path and goes straight to the
/// url-path rules. Otherwise the value must read `scheme://authority[/..]`:
/// the first `:` after `off` has to be followed by `//`, and the authority
/// runs to the next `/` or to the end of the buffer (in which case a
/// trailing `/` is appended first). Anything else, including an empty
/// authority such as `http:///`, is left untouched.
///
/// When the authority matches a host rule and the scheme flip is active,
/// `https` becomes `http` on the way to the backend and `http` becomes
/// `https` on the way back; the authority and path offsets are recomputed
/// after each length-changing replacement.
pub fn remap_uri(
    buf: &mut HeaderBuffer,
    mut off: usize,
    tables: &RemapTables,
    direction: Direction,
    ctx: &mut RemapContext,
) {
    let Some(&first) = buf.get(off) else { return };
    if first != b'/' {
        let Some(colon) = buf.find(b':', off) else {
            return;
        };
        if !buf[colon..].starts_with(b"://") {
            return;
        }
        let scheme = off..colon;
        let mut auth_off = colon + 3;
        let mut auth_len = match buf.find(b'/', auth_off) {
            Some(slash) => slash - auth_off,
            None => {
                let len = buf.len() - auth_off;
                if len > 0 {
                    buf.push(b'/');
                }
                len
            }
        };
        if auth_len == 0 {
            return;
        }

        if let Some(matched) = match_authority(buf, auth_off, auth_len, tables, direction, ctx) {
            if ctx.https_remap() && scheme_flips(direction, &buf[scheme.clone()]) {
                let flipped: &[u8] = match direction {
                    Direction::Request => b"http",
                    Direction::Response => b"https",
                };
                buf.replace(scheme.clone(), flipped);
                auth_off = scheme.start + flipped.len() + 3;
            }
            if let HostMatch::Replace(replacement) = matched {
                buf.replace(auth_off..auth_off + auth_len, replacement.as_bytes());
                auth_len = replacement.len();
            }
        }
        off = auth_off + auth_len;
    }

    remap_urlpath(buf, off, tables, direction, ctx);
}

fn scheme_flips(direction: Direction, scheme: &[u8]) -> bool {
    match direction {
        Direction::Request => scheme == b"https",
        Direction::Response => scheme == b"http",
    }
}
