//! Prometheus counters for extraction requests.

use std::time::Duration;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Request outcome and upstream latency metrics, exposed at `GET /metrics`.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    upstream_latency: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("pdf_extractor".to_string()), None)?;

        let requests = IntCounterVec::new(
            Opts::new("requests_total", "Extraction requests by variant and outcome"),
            &["variant", "outcome"],
        )?;
        let upstream_latency = HistogramVec::new(
            HistogramOpts::new(
                "upstream_seconds",
                "Time spent waiting on the model, including stream reassembly",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0, 160.0, 300.0]),
            &["variant"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(upstream_latency.clone()))?;

        Ok(Self {
            registry,
            requests,
            upstream_latency,
        })
    }

    /// Count one finished request. `outcome` is `ok`, `ping`, or an error stage.
    pub fn record(&self, variant: &str, outcome: &str) {
        self.requests.with_label_values(&[variant, outcome]).inc();
    }

    pub fn observe_upstream(&self, variant: &str, elapsed: Duration) {
        self.upstream_latency
            .with_label_values(&[variant])
            .observe(elapsed.as_secs_f64());
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}
