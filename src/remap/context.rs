//! Per-request remapping state.

use super::table::RemapTables;

/// State threaded through all rewriting calls of one request/response pair.
///
/// A context is created when the request is accepted and owned exclusively
/// by that request's processing path. The matchers record the first
/// request-side host and url-path decisions here, write-once, so the
/// response direction can remap symmetrically.
#[derive(Debug, Clone, Default)]
pub struct RemapContext {
    request_host: Option<String>,
    forwarded_host: Option<String>,
    forwarded_urlpath: Option<(String, String)>,
    https_remap: bool,
    upgrade: bool,
}

impl RemapContext {
    /// Create the context for one request.
    ///
    /// `request_host` is the authority the client sent in its Host header,
    /// the wildcard's request-side match target. The configured
    /// `https_remap` flag takes effect only when the client connection was
    /// https, and `upgrade` only when the request version can carry an
    /// upgrade.
    pub fn new(
        tables: &RemapTables,
        request_host: Option<&str>,
        client_https: bool,
        version: http::Version,
    ) -> Self {
        RemapContext {
            request_host: request_host.map(str::to_owned),
            forwarded_host: None,
            forwarded_urlpath: None,
            https_remap: tables.https_remap && client_https,
            upgrade: tables.upgrade && crate::upgrade::version_supports_upgrade(version),
        }
    }

    /// The authority the client presented in its Host header.
    pub fn request_host(&self) -> Option<&str> {
        self.request_host.as_deref()
    }

    /// The authority chosen by the first successful request-side host
    /// match, the wildcard's response-side match target.
    pub fn forwarded_host(&self) -> Option<&str> {
        self.forwarded_host.as_deref()
    }

    /// The url-path pair chosen by the first request-side path match.
    pub fn forwarded_urlpath(&self) -> Option<(&str, &str)> {
        self.forwarded_urlpath
            .as_ref()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether the scheme flip is active for this request.
    pub fn https_remap(&self) -> bool {
        self.https_remap
    }

    /// Whether protocol-upgrade passthrough is permitted for this request.
    pub fn upgrade(&self) -> bool {
        self.upgrade
    }

    /// Record the authority chosen by the first request-side host match.
    ///
    /// The field is write-once per request; later calls are ignored.
    pub(crate) fn record_forwarded_host(&mut self, authority: &str) {
        if self.forwarded_host.is_none() {
            self.forwarded_host = Some(authority.to_owned());
        }
    }

    /// Record the url-path pair chosen by the first request-side path
    /// match. Write-once per request.
    pub(crate) fn record_forwarded_urlpath(&mut self, key: &str, replacement: &str) {
        if self.forwarded_urlpath.is_none() {
            self.forwarded_urlpath = Some((key.to_owned(), replacement.to_owned()));
        }
    }
}
