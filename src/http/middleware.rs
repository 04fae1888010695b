//! Default middleware stack.
//!
//! # Responsibilities
//! - Assign and echo `x-request-id`
//! - Trace requests, recover panics, enforce the request timeout
//! - Strip `.ext` URL formats before routing
//! - Populate the request `Context` from correlation and test headers
//! - Log received requests
//! - Apply CORS and response compression
//!
//! # Design Decisions
//! - URL format extraction wraps the router as a service so the rewritten
//!   path is what gets routed
//! - The request logger reports the URI as received, extension included

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{OriginalUri, Request, State},
    http::{uri::PathAndQuery, HeaderMap, HeaderName, HeaderValue, Method, Uri},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tower::Layer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, ExposeHeaders},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::headers::{Headers, TEST_VALUE_DEFAULT};
use crate::config::{CorsConfig, ServiceConfig};
use crate::context::{self, Context};
use crate::log::{Client as LogClient, Field};

/// State shared by the context and logging middleware.
#[derive(Clone)]
pub struct MiddlewareState {
    pub headers: Headers,
    pub log: Arc<dyn LogClient>,
    pub exclude_log_paths: Arc<[String]>,
}

/// Format suffix stripped from the request path, e.g. `json` for `/a/1.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlFormat(pub String);

/// Wrap `router` in the default middleware stack.
#[allow(deprecated)]
pub fn defaults(
    router: Router,
    headers: Headers,
    log: Arc<dyn LogClient>,
    config: &ServiceConfig,
) -> Router {
    let state = MiddlewareState {
        headers,
        log,
        exclude_log_paths: config.http.exclude_log_paths.clone().into(),
    };

    let mut inner = router;
    if config.http.compression {
        inner = inner.layer(CompressionLayer::new());
    }
    let inner = inner
        .layer(cors(&config.cors))
        .layer(RequestBodyLimitLayer::new(config.http.body_limit_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(middleware::from_fn_with_state(state, populate_context));

    let routed = middleware::from_fn(url_format).layer(inner);

    Router::new()
        .fallback_service(routed)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.http.request_timeout_secs,
        )))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Build the request `Context` and install it for the rest of the request.
pub async fn populate_context(
    State(state): State<MiddlewareState>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = context_from_headers(&state.headers, req.headers());
    req.extensions_mut().insert(ctx.clone());
    context::scope(ctx, next.run(req)).await
}

/// Fresh context, appending any incoming correlation IDs.
pub fn context_from_headers(headers: &Headers, map: &HeaderMap) -> Context {
    let mut ctx = Context::new(None);
    if let Some(correlation_id) = joined(map, headers.correlation_id_key()) {
        ctx = ctx.with_correlation_id_append(&correlation_id);
    }
    let test = joined(map, headers.test_key()).is_some_and(|v| v == TEST_VALUE_DEFAULT);
    ctx.with_test(test)
}

fn joined(map: &HeaderMap, key: &str) -> Option<String> {
    let values: Vec<&str> = map
        .get_all(key)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}

/// Log "Request received" unless the URI is excluded.
pub async fn log_requests(
    State(state): State<MiddlewareState>,
    req: Request,
    next: Next,
) -> Response {
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.to_string())
        .unwrap_or_else(|| req.uri().to_string());

    if !state.exclude_log_paths.iter().any(|path| *path == uri) {
        let ctx = req
            .extensions()
            .get::<Context>()
            .cloned()
            .unwrap_or_else(context::current);
        state.log.info(
            &ctx,
            "Request received",
            &[
                Field::string("url", &uri),
                Field::string("method", req.method().as_str()),
                Field::any("headers", &header_values(req.headers())),
            ],
        );
    }
    next.run(req).await
}

fn header_values(map: &HeaderMap) -> BTreeMap<&str, Vec<String>> {
    let mut values: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, value) in map {
        values
            .entry(name.as_str())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    values
}

/// Strip a trailing `.ext` from the last path segment and record it.
pub async fn url_format(mut req: Request, next: Next) -> Response {
    if let Some((path, format)) = split_format(req.uri().path()) {
        let format = UrlFormat(format.to_string());
        if let Some(uri) = with_path(req.uri(), path) {
            *req.uri_mut() = uri;
            req.extensions_mut().insert(format);
        }
    }
    next.run(req).await
}

fn split_format(path: &str) -> Option<(&str, &str)> {
    let segment_start = path.rfind('/').map_or(0, |i| i + 1);
    let dot = path[segment_start..].rfind('.')?;
    if dot == 0 || dot + 1 == path.len() - segment_start {
        return None;
    }
    let dot = segment_start + dot;
    Some((&path[..dot], &path[dot + 1..]))
}

fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

/// CORS layer for the configured policy.
///
/// A `*` entry allows anything. With credentials allowed, `*` mirrors the
/// request instead, since browsers reject a literal `*` on credentialed
/// requests.
pub fn cors(config: &CorsConfig) -> CorsLayer {
    let mirror = config.allow_credentials;

    let origin = match (wildcard(&config.allowed_origins), mirror) {
        (true, true) => AllowOrigin::mirror_request(),
        (true, false) => AllowOrigin::any(),
        (false, _) => AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        ),
    };

    let methods = match (wildcard(&config.allowed_methods), mirror) {
        (true, true) => AllowMethods::mirror_request(),
        (true, false) => AllowMethods::any(),
        (false, _) => AllowMethods::list(
            config
                .allowed_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.as_bytes()).ok()),
        ),
    };

    let allow_headers = match (wildcard(&config.allowed_headers), mirror) {
        (true, true) => AllowHeaders::mirror_request(),
        (true, false) => AllowHeaders::any(),
        (false, _) => AllowHeaders::list(header_names(&config.allowed_headers)),
    };

    // Exposed headers have no mirror form; credentialed requests get none.
    let expose_headers = match (wildcard(&config.exposed_headers), mirror) {
        (true, true) => ExposeHeaders::list(Vec::<HeaderName>::new()),
        (true, false) => ExposeHeaders::any(),
        (false, _) => ExposeHeaders::list(header_names(&config.exposed_headers)),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(allow_headers)
        .expose_headers(expose_headers)
        .allow_credentials(config.allow_credentials)
        .max_age(Duration::from_secs(config.max_age_secs))
}

fn wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

fn header_names(names: &[String]) -> Vec<HeaderName> {
    names
        .iter()
        .filter(|n| n.as_str() != "*")
        .filter_map(|n| HeaderName::from_bytes(n.as_bytes()).ok())
        .collect()
}
