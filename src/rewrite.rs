//! Request and response rewriting at the proxy boundary.
//!
//! [`rewrite_request`] runs just before a request is sent to the backend;
//! [`rewrite_response`] just after response headers are parsed. Both are
//! synchronous, perform no I/O, and are total: a value that matches no
//! rule is left alone. [`RewriteLayer`] packages the pair as a tower
//! middleware that carries the per-request [`RemapContext`] from the
//! request side to the response side.

use std::sync::Arc;

use http::header::{
    HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_LOCATION, HOST, LOCATION, SET_COOKIE,
};
use hyperdriver::info::ConnectionInfo;

use crate::buffer::HeaderBuffer;
use crate::headers::forward::{
    set_forwarded, BoundAddress, ConnectionIdentity, ForwardedOverrides, ForwardedParams,
    PeerAddress,
};
use crate::remap::context::RemapContext;
use crate::remap::cookie::remap_setcookie;
use crate::remap::host::remap_authority;
use crate::remap::table::{Direction, RemapTables};
use crate::remap::uri::remap_uri;
use crate::upgrade::{is_upgrade_response, UpgradeTransition};

/// The WebDAV `Destination` request header, a URI the request operates on.
pub const DESTINATION: http::HeaderName = http::HeaderName::from_static("destination");

/// The non-standard `Proxy-Connection` header, stripped from outbound
/// requests.
pub const PROXY_CONNECTION: http::HeaderName =
    http::HeaderName::from_static("proxy-connection");

/// The `Proxy` request header, stripped so backends cannot be tricked into
/// reading it as an environment variable (httpoxy).
pub const PROXY: http::HeaderName = http::HeaderName::from_static("proxy");

/// Everything the rewriting service needs, fixed at configuration time and
/// shared read-only by all requests.
#[derive(Debug, Clone, Default)]
pub struct RewriteConfig {
    /// Remap tables and flags.
    pub remap: RemapTables,
    /// Directive switches for the `Forwarded` header.
    pub forwarded: ForwardedParams,
}

/// Authenticated user name, inserted as a request extension by an
/// authentication layer running before the rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser(pub String);

/// Rewrite an outbound request in place, returning the context the
/// response side needs.
///
/// `identity` must be captured from the request before this call, since
/// the Host header is rewritten here. `body_length` is the known request
/// body length, if any; it is written as `Content-Length` when the client
/// sent none (a fully buffered chunked body, typically).
pub fn rewrite_request<B>(
    request: &mut http::Request<B>,
    config: &RewriteConfig,
    identity: &ConnectionIdentity,
    overrides: &ForwardedOverrides,
    body_length: Option<u64>,
) -> RemapContext {
    let mut ctx = RemapContext::new(
        &config.remap,
        identity.host.as_deref(),
        identity.secure,
        request.version(),
    );

    if config.remap.remaps_request() {
        let mut buf = HeaderBuffer::from(request.uri().to_string());
        remap_uri(&mut buf, 0, &config.remap, Direction::Request, &mut ctx);
        if let Ok(uri) = http::Uri::try_from(buf.as_bytes()) {
            *request.uri_mut() = uri;
        }

        if let Some(host) = request.headers().get(HOST).cloned() {
            let mut buf = HeaderBuffer::from(host.as_bytes());
            let len = buf.len();
            remap_authority(&mut buf, 0, len, &config.remap, Direction::Request, &mut ctx);
            if let Ok(value) = HeaderValue::from_maybe_shared(buf.into_bytes()) {
                request.headers_mut().insert(HOST, value);
            }
        }

        for name in [DESTINATION, CONTENT_LOCATION] {
            rewrite_header_uri(
                request.headers_mut(),
                &name,
                &config.remap,
                Direction::Request,
                &mut ctx,
            );
        }
    }

    // Hop-local headers, and Set-Cookie to avoid reflecting a response
    // header at the backend.
    for name in [CONNECTION, PROXY_CONNECTION, PROXY, SET_COOKIE] {
        request.headers_mut().remove(&name);
    }

    set_forwarded(request.headers_mut(), config.forwarded, identity, overrides);

    let method = request.method();
    if method != http::Method::GET
        && method != http::Method::HEAD
        && !request.headers().contains_key(CONTENT_LENGTH)
    {
        if let Some(length) = body_length {
            request
                .headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(length));
        }
    }

    ctx
}

/// Rewrite an inbound response in place.
///
/// A `101` answering a permitted upgrade is marked with the
/// [`UpgradeTransition`] extension; actually switching the connection is
/// the gateway's job. `Location`, `Content-Location` and `Set-Cookie` are
/// rewritten only when response-side tables are configured.
pub fn rewrite_response<B>(
    response: &mut http::Response<B>,
    config: &RewriteConfig,
    ctx: &mut RemapContext,
) {
    if ctx.upgrade() && is_upgrade_response(response.status(), response.headers()) {
        tracing::debug!("backend switching protocols, handing the connection over");
        response.extensions_mut().insert(UpgradeTransition);
    }

    if !config.remap.remaps_response() {
        return;
    }

    for name in [LOCATION, CONTENT_LOCATION] {
        rewrite_header_uri(
            response.headers_mut(),
            &name,
            &config.remap,
            Direction::Response,
            ctx,
        );
    }

    let cookies: Vec<HeaderValue> = response.headers().get_all(SET_COOKIE).iter().cloned().collect();
    if !cookies.is_empty() {
        let headers = response.headers_mut();
        headers.remove(SET_COOKIE);
        for value in cookies {
            let mut buf = HeaderBuffer::from(value.as_bytes());
            remap_setcookie(&mut buf, 0, &config.remap, ctx);
            let rewritten =
                HeaderValue::from_maybe_shared(buf.into_bytes()).unwrap_or(value);
            headers.append(SET_COOKIE, rewritten);
        }
    }
}

fn rewrite_header_uri(
    headers: &mut http::HeaderMap,
    name: &http::HeaderName,
    tables: &RemapTables,
    direction: Direction,
    ctx: &mut RemapContext,
) {
    let Some(value) = headers.get(name).cloned() else {
        return;
    };
    let mut buf = HeaderBuffer::from(value.as_bytes());
    remap_uri(&mut buf, 0, tables, direction, ctx);
    if let Ok(value) = HeaderValue::from_maybe_shared(buf.into_bytes()) {
        headers.insert(name, value);
    }
}

/// Capture connection identity from a request, before it is rewritten.
///
/// Peer and local addresses come from the [`ConnectionInfo`] extension
/// added by the server's accept path; the trust overrides and the
/// authenticated user come from the [`ForwardedOverrides`] and
/// [`RemoteUser`] extensions when upstream middleware inserted them.
fn connection_identity<B>(request: &http::Request<B>) -> ConnectionIdentity {
    let info = request.extensions().get::<ConnectionInfo>();
    if info.is_none() {
        tracing::warn!("no connection info found in request extensions");
    }

    ConnectionIdentity {
        peer: info
            .and_then(|info| info.remote_addr.clone().canonical().tcp())
            .map(|addr| PeerAddress::Inet(addr.ip())),
        local: info
            .and_then(|info| info.local_addr.clone().canonical().tcp())
            .map(BoundAddress::Inet),
        secure: request.uri().scheme() == Some(&http::uri::Scheme::HTTPS),
        remote_user: request
            .extensions()
            .get::<RemoteUser>()
            .map(|user| user.0.clone()),
        host: request
            .headers()
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned),
    }
}

/// A layer applying the full request/response rewrite around an inner
/// proxy service.
#[derive(Debug, Clone, Default)]
pub struct RewriteLayer {
    config: Arc<RewriteConfig>,
}

impl RewriteLayer {
    /// Create a new `RewriteLayer` with the given configuration.
    pub fn new(config: RewriteConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> tower::layer::Layer<S> for RewriteLayer {
    type Service = RewriteService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RewriteService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Middleware applying [`rewrite_request`] on the way in and
/// [`rewrite_response`] on the way out.
#[derive(Debug, Clone)]
pub struct RewriteService<S> {
    inner: S,
    config: Arc<RewriteConfig>,
}

impl<S> RewriteService<S> {
    /// Create a new `RewriteService` wrapping `inner`.
    pub fn new(inner: S, config: RewriteConfig) -> Self {
        Self {
            inner,
            config: Arc::new(config),
        }
    }
}

impl<S, BIn, BOut> tower::Service<http::Request<BIn>> for RewriteService<S>
where
    S: tower::Service<http::Request<BIn>, Response = http::Response<BOut>>,
    BIn: hyper::body::Body,
{
    type Response = http::Response<BOut>;
    type Error = S::Error;
    type Future = future::RewriteFuture<S::Future>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<BIn>) -> Self::Future {
        let identity = connection_identity(&request);
        let overrides = request
            .extensions()
            .get::<ForwardedOverrides>()
            .cloned()
            .unwrap_or_default();
        let body_length = hyper::body::Body::size_hint(request.body()).exact();

        let ctx = rewrite_request(
            &mut request,
            &self.config,
            &identity,
            &overrides,
            body_length,
        );

        future::RewriteFuture {
            inner: self.inner.call(request),
            config: self.config.clone(),
            ctx: Some(ctx),
        }
    }
}

mod future {
    use std::future::Future;
    use std::sync::Arc;
    use std::task::ready;

    use crate::remap::context::RemapContext;

    use super::RewriteConfig;

    pin_project_lite::pin_project! {
        /// Response future for [`RewriteService`](super::RewriteService).
        #[derive(Debug)]
        pub struct RewriteFuture<F> {
            #[pin]
            pub(super) inner: F,
            pub(super) config: Arc<RewriteConfig>,
            pub(super) ctx: Option<RemapContext>,
        }
    }

    impl<F, BOut, E> Future for RewriteFuture<F>
    where
        F: Future<Output = Result<http::Response<BOut>, E>>,
    {
        type Output = Result<http::Response<BOut>, E>;

        fn poll(
            self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Self::Output> {
            let this = self.project();
            let mut outcome = ready!(this.inner.poll(cx));

            if let Ok(response) = &mut outcome {
                let mut ctx = this.ctx.take().unwrap_or_default();
                super::rewrite_response(response, this.config, &mut ctx);
            }

            std::task::Poll::Ready(outcome)
        }
    }
}
