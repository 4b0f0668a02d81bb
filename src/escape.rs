//! Backslash escaping for quoted values in structured headers.
//!
//! The `Forwarded` header carries addresses and host names as
//! quoted-strings; bytes that would terminate or confuse the quoting are
//! escaped with a backslash.

use bytes::{BufMut, BytesMut};

/// Append `value` to `out`, escaping `"`, `\`, DEL and every control byte
/// below 0x20 except horizontal tab.
///
/// The escaped byte itself is kept; only a backslash is inserted before it.
pub fn append_backslash_escaped(out: &mut BytesMut, value: &[u8]) {
    out.reserve(value.len());
    for &c in value {
        if c == b'"' || c == b'\\' || c == 0x7F || (c < 0x20 && c != b'\t') {
            out.put_u8(b'\\');
        }
        out.put_u8(c);
    }
}
