use std::{
    sync::Arc,
    task::{Context as TaskContext, Poll},
    time::Duration,
};

use axum::{
    extract::MatchedPath,
    http::{HeaderValue, Request, Response, header::HeaderName},
};
use tower::{Layer, Service};
use tower_http::{
    request_id::PropagateRequestIdLayer,
    trace::{MakeSpan, OnResponse},
};
use tracing::{Level, Span, event, field};
use uuid::Uuid;

pub(crate) static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const CLIENT_VERSION_HEADER: &str = "x-taskhive-client";

/// Custom response logger that escalates log level for 4xx/5xx responses.
pub fn response_logger() -> ResponseLogger {
    ResponseLogger
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseLogger;

impl<B> OnResponse<B> for ResponseLogger {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        let latency_ms = latency.as_millis() as u64;

        span.record("http.status", field::display(status.as_u16()));

        if status.is_server_error() {
            event!(parent: span, Level::ERROR, status = status.as_u16(), latency_ms, "request completed");
        } else if status.is_client_error() {
            event!(parent: span, Level::WARN, status = status.as_u16(), latency_ms, "request completed");
        } else {
            event!(parent: span, Level::INFO, status = status.as_u16(), latency_ms, "request completed");
        }
    }
}

#[derive(Clone, Debug)]
pub struct RequestContext {
    inner: Arc<RequestContextInner>,
}

#[derive(Debug)]
struct RequestContextInner {
    request_id: String,
    client_version: Option<String>,
}

impl RequestContext {
    fn new(request_id: String, client_version: Option<String>) -> Self {
        Self {
            inner: Arc::new(RequestContextInner {
                request_id,
                client_version,
            }),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    pub fn client_version(&self) -> Option<&str> {
        self.inner.client_version.as_deref()
    }
}

pub fn request_context_layer() -> RequestContextLayer {
    RequestContextLayer
}

/// Copies the request's `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(REQUEST_ID_HEADER.clone())
}

#[derive(Clone, Default)]
pub struct RequestContextLayer;

#[derive(Clone)]
pub struct RequestContextMiddleware<S> {
    inner: S,
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextMiddleware { inner }
    }
}

impl<S, B> Service<Request<B>> for RequestContextMiddleware<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let existing = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        let request_id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                if let Ok(header_value) = HeaderValue::from_str(&id) {
                    request
                        .headers_mut()
                        .insert(REQUEST_ID_HEADER.clone(), header_value);
                }
                id
            }
        };

        let client_version = request
            .headers()
            .get(CLIENT_VERSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        request
            .extensions_mut()
            .insert(RequestContext::new(request_id, client_version));

        self.inner.call(request)
    }
}

pub fn http_make_span() -> HttpMakeSpan {
    HttpMakeSpan
}

#[derive(Clone, Default)]
pub struct HttpMakeSpan;

impl<B> MakeSpan<B> for HttpMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let context = request.extensions().get::<RequestContext>();
        let request_id = context.map(RequestContext::request_id).unwrap_or("unknown");
        let client_version = context
            .and_then(RequestContext::client_version)
            .unwrap_or("unknown");
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str)
            .unwrap_or_else(|| request.uri().path());

        tracing::info_span!(
            "http",
            method = %request.method(),
            route,
            target = %request.uri(),
            request_id,
            client_version,
            http.status = field::Empty,
            user_id = field::Empty,
        )
    }
}

/// Attach the authenticated user to the request span opened by [`HttpMakeSpan`].
pub fn record_authenticated_user(user_id: &str) {
    let span = Span::current();
    if span.is_disabled() {
        return;
    }
    span.record("user_id", field::display(user_id));
}
