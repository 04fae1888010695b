//! Response rendering with correlation headers.

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::headers::{Headers, TEST_VALUE_DEFAULT};
use crate::context::Context;
use crate::errors::{self, Status, StatusBody};
use crate::log::{Client as LogClient, Field};

/// Set the correlation and test headers from `ctx`, then `extra`.
///
/// Extra headers override the defaults. Pairs that are not valid header
/// names or values are skipped. Returns what was applied.
pub fn set_headers_incl_defaults(
    ctx: &Context,
    headers: &Headers,
    response_headers: &mut HeaderMap,
    extra: &[(&str, &str)],
) -> BTreeMap<String, String> {
    let mut wanted = BTreeMap::new();
    wanted.insert(
        headers.correlation_id_key().to_string(),
        ctx.correlation_id().to_string(),
    );
    if ctx.test() {
        wanted.insert(headers.test_key().to_string(), TEST_VALUE_DEFAULT.to_string());
    }
    for (name, value) in extra {
        wanted.insert(name.to_string(), value.to_string());
    }

    let mut applied = BTreeMap::new();
    for (name, value) in wanted {
        let (Ok(header_name), Ok(header_value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) else {
            continue;
        };
        response_headers.insert(header_name, header_value);
        applied.insert(name, value);
    }
    applied
}

/// JSON response with default headers.
pub fn json<T: Serialize>(
    ctx: &Context,
    headers: &Headers,
    code: StatusCode,
    body: &T,
    extra: &[(&str, &str)],
) -> Response {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(err) => {
            let status = Status::with_cause(err, StatusCode::INTERNAL_SERVER_ERROR, "");
            return with_headers(ctx, headers, &[], status.into_response());
        }
    };
    let response = (
        code,
        [(header::CONTENT_TYPE, "application/json")],
        bytes,
    )
        .into_response();
    with_headers(ctx, headers, extra, response)
}

/// Empty 204 response with default headers.
pub fn no_content(ctx: &Context, headers: &Headers) -> Response {
    with_headers(ctx, headers, &[], StatusCode::NO_CONTENT.into_response())
}

/// Render any error.
///
/// The first `Status` in the chain decides the code and body; anything else
/// becomes a 500. Server errors log at error severity, the rest at info.
pub fn error(
    ctx: &Context,
    headers: &Headers,
    log: &Arc<dyn LogClient>,
    err: &(dyn Error + 'static),
) -> Response {
    let status = match errors::find_status(err) {
        Some(status) => status.clone(),
        None => Status::new(StatusCode::INTERNAL_SERVER_ERROR, ""),
    };

    if status.code.is_server_error() {
        log.error(ctx, "Rendering error", &[Field::error(err)]);
    } else {
        log.info(ctx, "Rendering error", &[Field::error(err)]);
    }

    let response = (status.code, Json(StatusBody::from(&status))).into_response();
    with_headers(ctx, headers, &[], response)
}

fn with_headers(
    ctx: &Context,
    headers: &Headers,
    extra: &[(&str, &str)],
    mut response: Response,
) -> Response {
    set_headers_incl_defaults(ctx, headers, response.headers_mut(), extra);
    response
}
