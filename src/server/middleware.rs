use std::time::Instant;

use axum::extract::{MatchedPath, RawPathParams, State};
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use super::AppState;
use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

/// Counts and times every response by route pattern and family.
///
/// The route label is the matched pattern, not the raw path. The family label
/// is only set for configured families so unknown names in URLs cannot grow
/// the label set.
pub async fn http_metrics(
    State(state): State<AppState>,
    matched_path: Option<MatchedPath>,
    params: Option<RawPathParams>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = matched_path
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let family = family_label(&state, params.as_ref());

    let start = Instant::now();
    let response = next.run(request).await;
    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path])
        .observe(start.elapsed().as_secs_f64());
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, response.status().as_str(), family])
        .inc();
    response
}

fn family_label<'a>(state: &'a AppState, params: Option<&RawPathParams>) -> &'a str {
    let requested = params.and_then(|p| {
        p.iter()
            .find(|(key, _)| *key == "family")
            .map(|(_, value)| value)
    });
    match requested {
        Some(name) => state
            .families
            .get_key_value(name)
            .map(|(known, _)| known.as_str())
            .unwrap_or("unknown"),
        None => "",
    }
}

/// Tags each request with an id and echoes it back in `x-request-id`.
///
/// A caller-supplied id is kept when it is short printable ASCII; anything
/// else is replaced with a fresh UUID v4. All logs for the request carry it.
pub async fn request_id(request: Request<axum::body::Body>, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| is_usable_request_id(v))
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let span = tracing::info_span!("request", request_id = %id);
    async move {
        let mut response = next.run(request).await;
        if let Ok(value) = HeaderValue::from_str(&id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

fn is_usable_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id.bytes().all(|b| b.is_ascii_graphic())
}
