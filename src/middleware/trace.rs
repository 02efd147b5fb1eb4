//! Per-request tracing span.

use std::future::Future;
use std::time::Instant;

use http::Method;
use tracing::{Instrument, info, info_span, warn};

use crate::response::Response;

/// Runs `fut` inside a `request` span and logs one line when it completes.
///
/// Server errors are logged at `warn` so they stand out from normal traffic;
/// the detailed cause is logged where it is classified.
pub(crate) async fn trace<F>(method: &Method, path: &str, fut: F) -> Response
where
    F: Future<Output = Response>,
{
    let span = info_span!("request", %method, path);
    let started = Instant::now();
    let response = fut.instrument(span.clone()).await;

    let status = response.status_code().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;
    span.in_scope(|| {
        if response.status_code().is_server_error() {
            warn!(status, latency_ms, "request failed");
        } else {
            info!(status, latency_ms, "request completed");
        }
    });
    response
}
