//! Prometheus metrics exposition
//!
//! - `session_requests_total` (counter): labels `operation`, `outcome`
//! - `session_request_duration_seconds` (histogram): label `operation`
//! - `session_security_events_total` (counter): label `kind`
//!
//! `outcome` is `ok` or the public error code of the response.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "session_request_duration_seconds";

/// Store round trips dominate; the top bucket matches the OAuth timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed session operation.
pub fn record_request(operation: &'static str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!("session_requests_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "operation" => operation).record(duration_secs);
}

/// Record a security-relevant rejection (replay, mismatch, bad state).
pub fn record_security_event(kind: &'static str) {
    metrics::counter!("session_security_events_total", "kind" => kind).increment(1);
}

/// Process-local counters reported by `/health`.
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    /// Requests currently being handled; reported if draining times out
    pub in_flight: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("verify", "ok", 0.01);
        record_security_event("session_mismatch");
    }

    /// Isolated recorder; only one global recorder may exist per process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_request_increments_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("refresh", "ok", 0.012);
        record_request("refresh", "refresh_token_revoked", 0.004);

        let output = handle.render();
        assert!(output.contains("session_requests_total"));
        assert!(output.contains("operation=\"refresh\""));
        assert!(output.contains("outcome=\"ok\""));
        assert!(output.contains("outcome=\"refresh_token_revoked\""));
        assert!(
            output.contains("session_request_duration_seconds_bucket"),
            "duration must render as a histogram"
        );
    }

    #[test]
    fn histogram_buckets_span_one_ms_to_thirty_seconds() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("callback", "ok", 0.0005);

        let output = handle.render();
        assert!(output.contains("le=\"0.001\""));
        assert!(output.contains("le=\"30\""));
        assert!(output.contains("le=\"+Inf\""));
    }

    #[test]
    fn security_events_are_labelled_by_kind() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_security_event("session_mismatch");
        record_security_event("oauth_state_invalid");

        let output = handle.render();
        assert!(output.contains("session_security_events_total"));
        assert!(output.contains("kind=\"session_mismatch\""));
        assert!(output.contains("kind=\"oauth_state_invalid\""));
    }
}
