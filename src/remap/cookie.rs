//! `Set-Cookie` attribute rewriting.

use crate::buffer::HeaderBuffer;

use super::context::RemapContext;
use super::host::remap_authority;
use super::table::{Direction, RemapTables};
use super::urlpath::remap_urlpath;

/// Token separating folded `Set-Cookie` lines after the newline.
const CONTINUATION: &[u8] = b"Set-Cookie: ";

/// Rewrite the `Domain=` and `Path=` attributes of a `Set-Cookie` value in
/// place, using the response-direction rules.
///
/// The value may be several original `Set-Cookie` lines folded into one,
/// each separated by a newline followed by a literal `Set-Cookie: ` token;
/// every segment is processed independently. Attributes are recognized
/// after a `;`, with leading whitespace skipped; anything other than
/// `Path` and `Domain` (both case-insensitive) passes through, as does an
/// attribute without `=`.
///
/// Replacement lengths differ from match lengths, so the scan position is
/// recomputed from the buffer after every replacement instead of being
/// cached across one.
pub fn remap_setcookie(
    buf: &mut HeaderBuffer,
    off: usize,
    tables: &RemapTables,
    ctx: &mut RemapContext,
) {
    let mut pos = off;
    while pos < buf.len() {
        match buf[pos] {
            b'\n' => {
                pos += 1;
                if buf[pos..].starts_with(CONTINUATION) {
                    pos += CONTINUATION.len();
                }
            }
            b';' => {
                pos += 1;
                while matches!(buf.get(pos).copied(), Some(b' ' | b'\t')) {
                    pos += 1;
                }
                pos = remap_attribute(buf, pos, tables, ctx);
            }
            _ => pos += 1,
        }
    }
}

/// Rewrite one attribute starting at `start` (its name), returning the
/// position to resume scanning from.
fn remap_attribute(
    buf: &mut HeaderBuffer,
    start: usize,
    tables: &RemapTables,
    ctx: &mut RemapContext,
) -> usize {
    let mut eq = start;
    loop {
        match buf.get(eq).copied() {
            Some(b'=') => break,
            Some(b';' | b'\n') | None => return eq,
            Some(_) => eq += 1,
        }
    }

    let mut value = eq + 1;
    if buf[start..eq].eq_ignore_ascii_case(b"path") {
        if buf.get(value) == Some(&b'"') {
            value += 1;
        }
        if buf.get(value) != Some(&b'/') {
            return value;
        }
        remap_urlpath(buf, value, tables, Direction::Response, ctx);
        value
    } else if buf[start..eq].eq_ignore_ascii_case(b"domain") {
        if buf.get(value) == Some(&b'"') {
            value += 1;
        }
        if buf.get(value) == Some(&b'.') {
            value += 1;
        }
        if buf.get(value) == Some(&b';') {
            return value;
        }
        let mut len = 0;
        while let Some(&c) = buf.get(value + len) {
            if matches!(c, b';' | b' ' | b'\t' | b'\r' | b'\n') {
                break;
            }
            len += 1;
        }
        if len == 0 {
            return value;
        }
        let len = remap_authority(buf, value, len, tables, Direction::Response, ctx);
        value + len
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remap::table::RemapTable;

    fn tables(hosts_response: &[(&str, &str)], urlpaths: &[(&str, &str)]) -> RemapTables {
        RemapTables {
            hosts_response: RemapTable::from_pairs(hosts_response.iter().copied()),
            urlpaths: RemapTable::from_pairs(urlpaths.iter().copied()),
            ..Default::default()
        }
    }

    #[test]
    fn domain_and_path_are_rewritten() {
        let tables = tables(
            &[("backend.internal", "public.example")],
            &[("/pub/", "/api/")],
        );
        let mut ctx = RemapContext::default();
        let mut buf = HeaderBuffer::from("id=42; Domain=backend.internal; Path=/api/x");

        remap_setcookie(&mut buf, 0, &tables, &mut ctx);
        assert_eq!(
            buf.as_bytes(),
            b"id=42; Domain=public.example; Path=/pub/x".as_slice()
        );
    }

    #[test]
    fn domain_wildcard_resolves_via_forwarded_host() {
        let tables = tables(&[("-", "public.example")], &[("/pub/", "/api/")]);
        let mut ctx = RemapContext::default();
        ctx.record_forwarded_host("backend.internal");
        let mut buf = HeaderBuffer::from("id=42; Domain=backend.internal; Path=/api/x");

        remap_setcookie(&mut buf, 0, &tables, &mut ctx);
        assert_eq!(
            buf.as_bytes(),
            b"id=42; Domain=public.example; Path=/pub/x".as_slice()
        );
    }

    #[test]
    fn attribute_names_are_case_insensitive() {
        let tables = tables(
            &[("backend.internal", "public.example")],
            &[("/pub/", "/api/")],
        );
        let mut ctx = RemapContext::default();
        let mut buf = HeaderBuffer::from("id=1; dOmAiN=backend.internal; PATH=/api/x");

        remap_setcookie(&mut buf, 0, &tables, &mut ctx);
        assert_eq!(
            buf.as_bytes(),
            b"id=1; dOmAiN=public.example; PATH=/pub/x".as_slice()
        );
    }

    #[test]
    fn leading_dot_and_quote_are_preserved() {
        let tables = tables(&[("backend.internal", "public.example")], &[]);
        let mut ctx = RemapContext::default();

        let mut buf = HeaderBuffer::from("id=1; Domain=.backend.internal");
        remap_setcookie(&mut buf, 0, &tables, &mut ctx);
        assert_eq!(buf.as_bytes(), b"id=1; Domain=.public.example".as_slice());

        let mut buf = HeaderBuffer::from("id=1; Domain=\"backend.internal\"");
        remap_setcookie(&mut buf, 0, &tables, &mut ctx);
        assert_eq!(buf.as_bytes(), b"id=1; Domain=\"public.example\"".as_slice());
    }

    #[test]
    fn path_not_starting_with_slash_is_skipped() {
        let tables = tables(&[], &[("/pub/", "/api/")]);
        let mut ctx = RemapContext::default();
        let mut buf = HeaderBuffer::from("id=1; Path=api/x");

        remap_setcookie(&mut buf, 0, &tables, &mut ctx);
        assert_eq!(buf.as_bytes(), b"id=1; Path=api/x".as_slice());
    }

    #[test]
    fn other_attributes_pass_through() {
        let tables = tables(
            &[("backend.internal", "public.example")],
            &[("/pub/", "/api/")],
        );
        let mut ctx = RemapContext::default();
        let mut buf =
            HeaderBuffer::from("id=1; Secure; HttpOnly; Max-Age=60; Domain=backend.internal");

        remap_setcookie(&mut buf, 0, &tables, &mut ctx);
        assert_eq!(
            buf.as_bytes(),
            b"id=1; Secure; HttpOnly; Max-Age=60; Domain=public.example".as_slice()
        );
    }

    #[test]
    fn folded_lines_are_each_rewritten() {
        let tables = tables(
            &[("backend.internal", "public.example")],
            &[("/pub/", "/api/")],
        );
        let mut ctx = RemapContext::default();
        let mut buf = HeaderBuffer::from(
            "a=1; Domain=backend.internal; Path=/api/a\r\nSet-Cookie: b=2; Path=/api/b; Domain=backend.internal",
        );

        remap_setcookie(&mut buf, 0, &tables, &mut ctx);
        assert_eq!(
            buf.as_bytes(),
            b"a=1; Domain=public.example; Path=/pub/a\r\nSet-Cookie: b=2; Path=/pub/b; Domain=public.example"
                .as_slice()
        );
    }

    #[test]
    fn domain_value_stops_at_whitespace_and_cr() {
        let tables = tables(&[("backend.internal", "public.example")], &[]);
        let mut ctx = RemapContext::default();
        let mut buf = HeaderBuffer::from("a=1; Domain=backend.internal\r\nSet-Cookie: b=2");

        remap_setcookie(&mut buf, 0, &tables, &mut ctx);
        assert_eq!(
            buf.as_bytes(),
            b"a=1; Domain=public.example\r\nSet-Cookie: b=2".as_slice()
        );
    }

    #[test]
    fn growing_replacement_keeps_later_attributes_aligned() {
        let tables = tables(
            &[("b.io", "a-much-longer.public.example")],
            &[("/pub/", "/api/")],
        );
        let mut ctx = RemapContext::default();
        let mut buf = HeaderBuffer::from("id=1; Domain=b.io; Path=/api/x; Secure");

        remap_setcookie(&mut buf, 0, &tables, &mut ctx);
        assert_eq!(
            buf.as_bytes(),
            b"id=1; Domain=a-much-longer.public.example; Path=/pub/x; Secure".as_slice()
        );
    }
}
