//! Authority (`host[:port]`) matching and replacement.

use crate::buffer::HeaderBuffer;

use super::context::RemapContext;
use super::table::{self, Direction, RemapTables};

/// Outcome of a successful authority match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMatch<'t> {
    /// Substitute the matched authority with this value.
    Replace(&'t str),
    /// The no-op sentinel: the entry matched and scanning stopped, but the
    /// text stays as it is. This still counts as a match, in particular
    /// for scheme-flip eligibility.
    Keep,
}

/// Look up a replacement for the authority at `off..off + len` in `buf`.
///
/// The table for `direction` is scanned in configured order; the first key
/// of equal length comparing ASCII-case-insensitively equal wins. A
/// wildcard key resolves its comparison target from the context (the
/// client's Host on requests, the recorded forwarded host on responses)
/// and is skipped when that target is absent. An empty replacement stops
/// the scan without matching.
///
/// The first request-side replacement is recorded in the context as the
/// forwarded host, so the response direction can match symmetrically; that
/// write happens at most once per request.
pub fn match_authority<'t>(
    buf: &HeaderBuffer,
    off: usize,
    len: usize,
    tables: &'t RemapTables,
    direction: Direction,
    ctx: &mut RemapContext,
) -> Option<HostMatch<'t>> {
    let authority = buf.get(off..off + len)?;
    for (key, replacement) in tables.host_table(direction).entries() {
        let target = if table::is_wildcard(key) {
            match direction {
                Direction::Request => ctx.request_host(),
                Direction::Response => ctx.forwarded_host(),
            }
        } else {
            Some(key.as_str())
        };
        let Some(target) = target else { continue };
        if target.len() != len || !authority.eq_ignore_ascii_case(target.as_bytes()) {
            continue;
        }
        if table::is_keep(replacement) {
            return Some(HostMatch::Keep);
        }
        if replacement.is_empty() {
            return None;
        }
        if direction == Direction::Request {
            ctx.record_forwarded_host(replacement);
        }
        return Some(HostMatch::Replace(replacement));
    }
    None
}

/// Match and replace the authority at `off..off + len` in place, returning
/// the authority's new length (the original length when nothing matched or
/// the no-op sentinel matched).
pub fn remap_authority(
    buf: &mut HeaderBuffer,
    off: usize,
    len: usize,
    tables: &RemapTables,
    direction: Direction,
    ctx: &mut RemapContext,
) -> usize {
    match match_authority(buf, off, len, tables, direction, ctx) {
        Some(HostMatch::Replace(replacement)) => {
            buf.replace(off..off + len, replacement.as_bytes());
            replacement.len()
        }
        Some(HostMatch::Keep) | None => len,
    }
}
