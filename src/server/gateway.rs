//! `GET /drain-delay` handler
//!
//! Query parameters: `ip`, `namespace`, `ingress`, and optional
//! `max-delay` (seconds, default 60). `ip` must parse as an IPv4 or IPv6
//! address, since members are matched by parsed address.
//!
//! - 200 `Success` once the IP has drained
//! - 400 `Bad request: ...` when the parameters are missing, repeated or
//!   malformed (including a non-IP `ip`)
//! - 500 when the drain could not be confirmed (timeout or not found)

use crate::drain::{DrainError, DrainParams, DrainRequest};
use crate::server::health::ServerState;
use crate::server::metrics::{OUTCOME_NOT_FOUND, OUTCOME_SUCCESS, OUTCOME_TIMEOUT};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{info, warn};

fn outcome(error: &DrainError) -> &'static str {
    if error.is_timeout() {
        OUTCOME_TIMEOUT
    } else {
        OUTCOME_NOT_FOUND
    }
}

pub async fn handle_drain_delay(
    State(state): State<ServerState>,
    query: Result<Query<DrainParams>, QueryRejection>,
) -> Response {
    let parsed = query
        .map_err(|rejection| rejection.body_text())
        .and_then(|Query(params)| DrainRequest::from_params(&params).map_err(|e| e.to_string()));
    let request = match parsed {
        Ok(request) => request,
        Err(reason) => {
            warn!(error = %reason, "Error building drain request from query");
            state.metrics.record_invalid();
            return (StatusCode::BAD_REQUEST, format!("Bad request: {}", reason)).into_response();
        }
    };

    let _in_flight = state.metrics.track_in_flight();
    let started = Instant::now();
    let result = state.resolver.delay_until_drain(&request).await;
    let seconds = started.elapsed().as_secs_f64();

    match result {
        Ok(report) => {
            info!(
                ip = %request.target_ip(),
                ingress = %request.ingress_key(),
                iterations = report.iterations,
                "Drain delay complete"
            );
            state.metrics.record(OUTCOME_SUCCESS, seconds);
            (StatusCode::OK, "Success").into_response()
        }
        Err(e) => {
            warn!(
                ip = %request.target_ip(),
                ingress = %request.ingress_key(),
                error = %e,
                "Error delaying until drain"
            );
            state.metrics.record(outcome(&e), seconds);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Drain delay failed: {}", e),
            )
                .into_response()
        }
    }
}
