//! Remap rule tables and the direction they are applied in.

/// The `-` spelling that marks a wildcard key or a no-op replacement.
const DYNAMIC: &str = "-";

/// The direction a value is traveling through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to backend.
    Request,
    /// Backend to client.
    Response,
}

/// An ordered mapping table, scanned linearly; the first matching entry
/// wins, regardless of any longer or better match later in the table.
///
/// In the host tables a key of `-` is a wildcard whose comparison target is
/// resolved from the per-request context at match time, and a replacement
/// of `-` means "matched, stop scanning, leave the text alone". The
/// url-path table takes both spellings literally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    entries: Vec<(String, String)>,
}

impl RemapTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from key/value pairs, preserving their order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Append a rule at the end of the scan order.
    pub fn push(&mut self, key: impl Into<String>, replacement: impl Into<String>) {
        self.entries.push((key.into(), replacement.into()));
    }

    /// The number of rules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no rules.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

pub(crate) fn is_wildcard(key: &str) -> bool {
    key == DYNAMIC
}

pub(crate) fn is_keep(replacement: &str) -> bool {
    replacement == DYNAMIC
}

/// The full remapping configuration, built once and shared read-only by
/// every request.
#[derive(Debug, Clone, Default)]
pub struct RemapTables {
    /// Authority rules applied to values headed for the backend.
    pub hosts_request: RemapTable,
    /// Authority rules applied to values returning to the client.
    pub hosts_response: RemapTable,
    /// URL-path prefix rules, applied forward on requests and in reverse
    /// on responses.
    pub urlpaths: RemapTable,
    /// Flip `https` to `http` on request URIs whose authority matched, and
    /// back on responses. Effective only for requests that arrived over
    /// https.
    pub https_remap: bool,
    /// Permit protocol-upgrade passthrough.
    pub upgrade: bool,
}

impl RemapTables {
    /// Whether any request-side rewriting is configured.
    pub fn remaps_request(&self) -> bool {
        !self.urlpaths.is_empty() || !self.hosts_request.is_empty()
    }

    /// Whether any response-side rewriting is configured.
    pub fn remaps_response(&self) -> bool {
        !self.urlpaths.is_empty() || !self.hosts_response.is_empty()
    }

    /// The host table for `direction`.
    pub fn host_table(&self, direction: Direction) -> &RemapTable {
        match direction {
            Direction::Request => &self.hosts_request,
            Direction::Response => &self.hosts_response,
        }
    }
}
