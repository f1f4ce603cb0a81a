//! In-process metrics for the incident relay
//!
//! Counters, gauges and latency histograms keyed by dotted names, exported
//! as JSON or Prometheus text on `/metrics`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

/// Prefix applied to every exported Prometheus name.
const PROMETHEUS_PREFIX: &str = "relay";

fn prometheus_name(name: &str) -> String {
    format!("{}_{}", PROMETHEUS_PREFIX, name.replace(['.', '-'], "_"))
}

/// Metrics registry shared through application state
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    gauges: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    histograms: RwLock<BTreeMap<String, Arc<Histogram>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            gauges: RwLock::new(BTreeMap::new()),
            histograms: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Increment a counter
    pub async fn inc_counter(&self, name: &str) {
        self.add_counter(name, 1).await;
    }

    /// Add to a counter, creating it on first use
    pub async fn add_counter(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.read().await.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }

        let mut counters = self.counters.write().await;
        counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(value, Ordering::Relaxed);
    }

    pub async fn set_gauge(&self, name: &str, value: u64) {
        if let Some(gauge) = self.gauges.read().await.get(name) {
            gauge.store(value, Ordering::Relaxed);
            return;
        }

        let mut gauges = self.gauges.write().await;
        gauges
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .store(value, Ordering::Relaxed);
    }

    pub async fn get_counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .await
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub async fn get_gauge(&self, name: &str) -> u64 {
        self.gauges
            .read()
            .await
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Record a histogram observation (seconds for latency histograms)
    pub async fn observe_histogram(&self, name: &str, value: f64) {
        if let Some(histogram) = self.histograms.read().await.get(name) {
            histogram.observe(value);
            return;
        }

        let mut histograms = self.histograms.write().await;
        histograms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::default()))
            .observe(value);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn to_json(&self) -> serde_json::Value {
        let counters: BTreeMap<String, u64> = self
            .counters
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        let gauges: BTreeMap<String, u64> = self
            .gauges
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        let histograms: BTreeMap<String, serde_json::Value> = self
            .histograms
            .read()
            .await
            .iter()
            .map(|(k, h)| (k.clone(), h.to_json()))
            .collect();

        serde_json::json!({
            "uptime_seconds": self.uptime_seconds(),
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }

    /// Export metrics in Prometheus text format
    pub async fn to_prometheus(&self) -> String {
        let mut output = String::new();

        let uptime = prometheus_name("uptime_seconds");
        output.push_str(&format!("# HELP {uptime} Time since service start\n"));
        output.push_str(&format!("# TYPE {uptime} gauge\n"));
        output.push_str(&format!("{uptime} {}\n", self.uptime_seconds()));

        for (name, counter) in self.counters.read().await.iter() {
            let name = prometheus_name(name);
            output.push_str(&format!("# TYPE {name} counter\n"));
            output.push_str(&format!("{name} {}\n", counter.load(Ordering::Relaxed)));
        }

        for (name, gauge) in self.gauges.read().await.iter() {
            let name = prometheus_name(name);
            output.push_str(&format!("# TYPE {name} gauge\n"));
            output.push_str(&format!("{name} {}\n", gauge.load(Ordering::Relaxed)));
        }

        for (name, histogram) in self.histograms.read().await.iter() {
            output.push_str(&histogram.to_prometheus(name));
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket histogram. The sum is kept in microseconds.
pub struct Histogram {
    buckets: Vec<f64>,
    counts: Vec<AtomicU64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        let micros = (value.max(0.0) * 1_000_000.0) as u64;
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        if let Some(i) = self.buckets.iter().position(|b| value <= *b) {
            self.counts[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    pub fn to_json(&self) -> serde_json::Value {
        let counts: Vec<u64> = self.counts.iter().map(|c| c.load(Ordering::Relaxed)).collect();
        serde_json::json!({
            "buckets": self.buckets,
            "counts": counts,
            "sum": self.sum(),
            "count": self.count(),
        })
    }

    pub fn to_prometheus(&self, name: &str) -> String {
        let name = prometheus_name(name);
        let mut output = format!("# TYPE {name} histogram\n");

        let mut cumulative = 0u64;
        for (bucket, count) in self.buckets.iter().zip(&self.counts) {
            cumulative += count.load(Ordering::Relaxed);
            output.push_str(&format!("{name}_bucket{{le=\"{bucket}\"}} {cumulative}\n"));
        }
        output.push_str(&format!("{name}_bucket{{le=\"+Inf\"}} {}\n", self.count()));
        output.push_str(&format!("{name}_sum {}\n", self.sum()));
        output.push_str(&format!("{name}_count {}\n", self.count()));
        output
    }
}

impl Default for Histogram {
    /// Latency buckets in seconds, sized for calls to remote providers.
    fn default() -> Self {
        Self::new(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ])
    }
}

/// Predefined metric names
pub mod metric_names {
    // Submission pipeline
    pub const INCIDENTS_SUBMITTED: &str = "incidents.submitted";
    pub const INCIDENTS_REJECTED: &str = "incidents.rejected";
    pub const INCIDENTS_FAILED: &str = "incidents.failed";
    pub const MEDIA_PINNED: &str = "incidents.media.pinned";
    pub const MEDIA_ORPHANED: &str = "incidents.media.orphaned";

    // Listing
    pub const INCIDENTS_LISTED: &str = "incidents.listed";
    pub const FETCH_SKIPPED: &str = "incidents.fetch_skipped";
    pub const FEED_SIZE: &str = "incidents.feed.size";

    // Premium access
    pub const PAYMENTS_RECORDED: &str = "premium.payments.recorded";
    pub const ACCESS_GRANTED: &str = "premium.access.granted";
    pub const ACCESS_DENIED: &str = "premium.access.denied";

    // Proof verification
    pub const VERIFY_SUCCESS: &str = "verify.success";
    pub const VERIFY_FAILURE: &str = "verify.failure";

    // Latency histograms
    pub const SUBMIT_LATENCY: &str = "incidents.submit.latency_seconds";
    pub const FEED_LATENCY: &str = "incidents.feed.latency_seconds";
}

/// Time an async operation into a histogram
pub async fn timed<F, T>(metrics: &MetricsRegistry, metric_name: &str, f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = f.await;
    metrics
        .observe_histogram(metric_name, start.elapsed().as_secs_f64())
        .await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counter() {
        let registry = MetricsRegistry::new();

        registry.inc_counter(metric_names::INCIDENTS_SUBMITTED).await;
        registry.inc_counter(metric_names::INCIDENTS_SUBMITTED).await;
        registry.add_counter(metric_names::INCIDENTS_SUBMITTED, 5).await;

        assert_eq!(registry.get_counter(metric_names::INCIDENTS_SUBMITTED).await, 7);
        assert_eq!(registry.get_counter("never.touched").await, 0);
    }

    #[tokio::test]
    async fn test_gauge() {
        let registry = MetricsRegistry::new();

        registry.set_gauge(metric_names::FEED_SIZE, 100).await;
        registry.set_gauge(metric_names::FEED_SIZE, 50).await;
        assert_eq!(registry.get_gauge(metric_names::FEED_SIZE).await, 50);
    }

    #[tokio::test]
    async fn test_histogram() {
        let registry = MetricsRegistry::new();

        registry.observe_histogram(metric_names::SUBMIT_LATENCY, 0.004).await;
        registry.observe_histogram(metric_names::SUBMIT_LATENCY, 0.3).await;
        registry.observe_histogram(metric_names::SUBMIT_LATENCY, 45.0).await;

        let json = registry.to_json().await;
        let latency = &json["histograms"][metric_names::SUBMIT_LATENCY];
        assert_eq!(latency["count"], 3);
        assert_eq!(latency["counts"][0], 1);
    }

    #[tokio::test]
    async fn test_prometheus_format() {
        let registry = MetricsRegistry::new();

        registry.inc_counter(metric_names::VERIFY_SUCCESS).await;
        registry.set_gauge(metric_names::FEED_SIZE, 42).await;
        registry.observe_histogram(metric_names::FEED_LATENCY, 0.02).await;

        let text = registry.to_prometheus().await;
        assert!(text.contains("relay_verify_success 1"));
        assert!(text.contains("relay_incidents_feed_size 42"));
        assert!(text.contains("relay_incidents_feed_latency_seconds_bucket{le=\"0.025\"} 1"));
        assert!(text.contains("relay_incidents_feed_latency_seconds_count 1"));
    }

    #[tokio::test]
    async fn test_timed_records_observation() {
        let registry = MetricsRegistry::new();
        let value = timed(&registry, metric_names::FEED_LATENCY, async { 5 }).await;
        assert_eq!(value, 5);

        let json = registry.to_json().await;
        assert_eq!(json["histograms"][metric_names::FEED_LATENCY]["count"], 1);
    }
}
