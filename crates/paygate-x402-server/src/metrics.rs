use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use std::sync::LazyLock;

use crate::error::{GateError, Rejection};

pub static REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_server_requests_total",
        "Gated HTTP requests by route pattern and response status",
        &["endpoint", "status"]
    )
    .unwrap()
});

pub static PAYMENT_ATTEMPTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_server_payment_attempts_total",
        "Requests that carried an X-PAYMENT header, by outcome",
        &["result"]
    )
    .unwrap()
});

/// Outcome label of one payment attempt.
pub fn attempt_result(outcome: &Result<(), &GateError>) -> Option<&'static str> {
    match outcome {
        Ok(()) => Some("success"),
        Err(GateError::FacilitatorUnavailable(_)) => Some("error"),
        Err(err) => match err.rejection()? {
            // No header, so not an attempt.
            Rejection::PaymentRequired => None,
            Rejection::InvalidPayment => Some("invalid"),
            Rejection::NoMatchingRequirements => Some("no_match"),
            Rejection::VerificationFailed => Some("rejected"),
            Rejection::SettlementFailed => Some("settle_failed"),
        },
    }
}

/// Count a finished gated request. `endpoint` is the route pattern, never the
/// raw path, to keep label cardinality bounded.
pub fn record(endpoint: &str, status: u16, outcome: Result<(), &GateError>) {
    let status = status.to_string();
    REQUESTS
        .with_label_values(&[endpoint, status.as_str()])
        .inc();
    if let Some(result) = attempt_result(&outcome) {
        PAYMENT_ATTEMPTS.with_label_values(&[result]).inc();
    }
}

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
