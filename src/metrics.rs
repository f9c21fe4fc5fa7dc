//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Swaps
    pub swaps_total: IntCounter,
    pub swaps_success: IntCounter,
    pub swaps_failed: IntCounterVec,

    // Simulation
    pub simulation_attempts: IntCounter,
    pub simulation_outcomes: IntCounterVec,

    // Relay
    pub bundles_submitted: IntCounter,
    pub bundle_status_not_found: IntCounter,

    // Histograms
    pub swap_latency: Histogram,
    pub read_phase_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let swaps_total =
            IntCounter::with_opts(Opts::new("swaps_total", "Total number of swap batches attempted"))?;

        let swaps_success =
            IntCounter::with_opts(Opts::new("swaps_success", "Swap batches submitted to the relay"))?;

        let swaps_failed = IntCounterVec::new(
            Opts::new("swaps_failed", "Swap batches that failed, by stage and error category"),
            &["stage", "category"],
        )?;

        let simulation_attempts = IntCounter::with_opts(Opts::new(
            "simulation_attempts_total",
            "Simulation round trips, including retries",
        ))?;

        let simulation_outcomes = IntCounterVec::new(
            Opts::new(
                "simulation_outcomes_total",
                "Compute estimates by outcome (units, rent, unknown)",
            ),
            &["outcome"],
        )?;

        let bundles_submitted = IntCounter::with_opts(Opts::new(
            "bundles_submitted_total",
            "Bundles accepted by the relay",
        ))?;

        let bundle_status_not_found = IntCounter::with_opts(Opts::new(
            "bundle_status_not_found_total",
            "Status checks that found no record or failed",
        ))?;

        let swap_latency = Histogram::with_opts(
            HistogramOpts::new("swap_latency_seconds", "End-to-end swap latency up to submission")
                .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        )?;

        let read_phase_latency = Histogram::with_opts(
            HistogramOpts::new(
                "read_phase_latency_seconds",
                "Decimals, quotes, and instruction fetches",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;

        registry.register(Box::new(swaps_total.clone()))?;
        registry.register(Box::new(swaps_success.clone()))?;
        registry.register(Box::new(swaps_failed.clone()))?;
        registry.register(Box::new(simulation_attempts.clone()))?;
        registry.register(Box::new(simulation_outcomes.clone()))?;
        registry.register(Box::new(bundles_submitted.clone()))?;
        registry.register(Box::new(bundle_status_not_found.clone()))?;
        registry.register(Box::new(swap_latency.clone()))?;
        registry.register(Box::new(read_phase_latency.clone()))?;

        Ok(Self {
            registry,
            swaps_total,
            swaps_success,
            swaps_failed,
            simulation_attempts,
            simulation_outcomes,
            bundles_submitted,
            bundle_status_not_found,
            swap_latency,
            read_phase_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
