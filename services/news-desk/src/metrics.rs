//! Prometheus metrics exposition
//!
//! Registered here:
//!
//! - `news_requests_total` (counter): labels `route`, `status`
//! - `news_request_duration_seconds` (histogram): label `route`
//! - `generation_failures_total` (counter): label `kind`
//!
//! The key-pool crate emits `key_pool_rotations_total` and
//! `key_pool_exhausted_total` through the same recorder.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "news_request_duration_seconds";

/// 5ms to 60s; generation calls sit at the upper end.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Explicit buckets make the duration metric render as a histogram (with
/// `_bucket` lines) rather than the default summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed API request.
pub fn record_request(route: &'static str, status: u16, duration_secs: f64) {
    metrics::counter!("news_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "route" => route).record(duration_secs);
}

/// Record a generation call that did not produce content.
pub fn record_generation_failure(kind: &'static str) {
    metrics::counter!("generation_failures_total", "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("news.list", 200, 0.05);
        record_generation_failure("backend");
    }

    /// Isolated recorder/handle pair; `install_recorder()` can only succeed
    /// once per process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder()
            .expect("failed to set histogram buckets")
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_request_increments_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("news.create", 201, 0.042);
        record_request("news.generate", 503, 1.5);

        let output = handle.render();
        assert!(output.contains("news_requests_total"));
        assert!(output.contains("route=\"news.create\""));
        assert!(output.contains("status=\"201\""));
        assert!(output.contains("status=\"503\""));
        assert!(
            output.contains("news_request_duration_seconds_bucket"),
            "histogram must render _bucket lines for histogram_quantile() queries"
        );
    }

    #[test]
    fn generation_failures_are_labelled_by_kind() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_generation_failure("exhausted");
        record_generation_failure("backend");

        let output = handle.render();
        assert!(output.contains("generation_failures_total"));
        assert!(output.contains("kind=\"exhausted\""));
        assert!(output.contains("kind=\"backend\""));
    }

    #[test]
    fn histogram_buckets_cover_expected_range() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("health", 200, 0.003);

        let output = handle.render();
        assert!(output.contains("le=\"0.005\""), "5ms bucket must exist");
        assert!(output.contains("le=\"60\""), "60s bucket must exist");
        assert!(output.contains("le=\"+Inf\""));
    }
}
