//! Prometheus-backed and no-op implementations of the `MetricsSink` port.
//! The port trait itself lives here rather than in the domain crate: it is
//! parameterized over `prometheus`'s concrete counter/gauge/histogram
//! types at the implementation site, and the domain crate has no
//! dependency on the metrics backend.

use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};

/// Abstract interface the core depends on: five metric families, written by
/// the source readers, the batching sender, and the dispatch loop.
pub trait MetricsSink: Send + Sync {
    fn inc_logs_processed(&self, source_type: &str);
    fn inc_logs_sent(&self, source_type: &str);
    fn inc_logs_send_failures(&self, source_type: &str, error_type: &str);
    fn observe_batch_size(&self, size: usize);
    fn observe_send_latency(&self, source_type: &str, seconds: f64);

    /// Renders the registry in Prometheus text exposition format, for the
    /// health server's `/metrics` endpoint. The no-op sink returns an empty
    /// body.
    fn render(&self) -> String {
        String::new()
    }
}

pub struct PrometheusMetricsSink {
    registry: Registry,
    logs_processed_total: IntCounterVec,
    logs_sent_total: IntCounterVec,
    logs_send_failures_total: IntCounterVec,
    batch_size: prometheus::Gauge,
    send_latency_seconds: HistogramVec,
}

impl PrometheusMetricsSink {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let logs_processed_total = IntCounterVec::new(
            prometheus::Opts::new("tailpost_logs_processed_total", "Total log lines read from a source"),
            &["source_type"],
        )?;
        let logs_sent_total = IntCounterVec::new(
            prometheus::Opts::new("tailpost_logs_sent_total", "Total log lines successfully sent to the sink"),
            &["source_type"],
        )?;
        let logs_send_failures_total = IntCounterVec::new(
            prometheus::Opts::new("tailpost_logs_send_failures_total", "Total log lines dropped on send failure"),
            &["source_type", "error_type"],
        )?;
        let batch_size = prometheus::Gauge::new("tailpost_batch_size", "Size of the most recently flushed batch")?;
        let send_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new("tailpost_send_latency_seconds", "Sink round-trip latency"),
            &["source_type"],
        )?;

        registry.register(Box::new(logs_processed_total.clone()))?;
        registry.register(Box::new(logs_sent_total.clone()))?;
        registry.register(Box::new(logs_send_failures_total.clone()))?;
        registry.register(Box::new(batch_size.clone()))?;
        registry.register(Box::new(send_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            logs_processed_total,
            logs_sent_total,
            logs_send_failures_total,
            batch_size,
            send_latency_seconds,
        })
    }
}

impl MetricsSink for PrometheusMetricsSink {
    fn inc_logs_processed(&self, source_type: &str) {
        self.logs_processed_total.with_label_values(&[source_type]).inc();
    }

    fn inc_logs_sent(&self, source_type: &str) {
        self.logs_sent_total.with_label_values(&[source_type]).inc();
    }

    fn inc_logs_send_failures(&self, source_type: &str, error_type: &str) {
        self.logs_send_failures_total
            .with_label_values(&[source_type, error_type])
            .inc();
    }

    fn observe_batch_size(&self, size: usize) {
        self.batch_size.set(size as f64);
    }

    fn observe_send_latency(&self, source_type: &str, seconds: f64) {
        self.send_latency_seconds.with_label_values(&[source_type]).observe(seconds);
    }

    fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Used for tests and telemetry-disabled runs: the core must still run
/// with this interface present, it just observes nothing.
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn inc_logs_processed(&self, _source_type: &str) {}
    fn inc_logs_sent(&self, _source_type: &str) {}
    fn inc_logs_send_failures(&self, _source_type: &str, _error_type: &str) {}
    fn observe_batch_size(&self, _size: usize) {}
    fn observe_send_latency(&self, _source_type: &str, _seconds: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_family_names() {
        let sink = PrometheusMetricsSink::new().unwrap();
        sink.inc_logs_processed("file");
        let text = sink.render();
        assert!(text.contains("tailpost_logs_processed_total"));
    }
}
