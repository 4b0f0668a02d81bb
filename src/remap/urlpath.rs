//! URL-path prefix remapping, applied forward on requests and in reverse
//! on responses.

use crate::buffer::HeaderBuffer;

use super::context::RemapContext;
use super::table::{Direction, RemapTables};

/// Remap the url-path starting at `off` in place.
///
/// Request direction: the first table key that is a byte-prefix of the path
/// wins; the prefix is replaced with the entry's value and the chosen pair
/// is remembered in the context (write-once) for the response.
///
/// Response direction: the remembered pair's *value*, when it prefixes the
/// path, is replaced with its *key* — the exact reverse of the request-side
/// substitution, taking precedence over the table. Otherwise the table's
/// values are scanned in order and the first prefix match is replaced with
/// the corresponding key.
///
/// A path matching no rule is left unchanged.
pub fn remap_urlpath(
    buf: &mut HeaderBuffer,
    off: usize,
    tables: &RemapTables,
    direction: Direction,
    ctx: &mut RemapContext,
) {
    if off > buf.len() {
        return;
    }
    match direction {
        Direction::Request => {
            for (key, replacement) in tables.urlpaths.entries() {
                if buf[off..].starts_with(key.as_bytes()) {
                    ctx.record_forwarded_urlpath(key, replacement);
                    buf.replace(off..off + key.len(), replacement.as_bytes());
                    return;
                }
            }
        }
        Direction::Response => {
            if let Some((key, replacement)) = ctx.forwarded_urlpath() {
                if buf[off..].starts_with(replacement.as_bytes()) {
                    buf.replace(off..off + replacement.len(), key.as_bytes());
                    return;
                }
            }
            for (key, replacement) in tables.urlpaths.entries() {
                if buf[off..].starts_with(replacement.as_bytes()) {
                    buf.replace(off..off + replacement.len(), key.as_bytes());
                    return;
                }
            }
        }
    }
}
