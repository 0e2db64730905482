//! In-process metrics registry
//!
//! Collects request counters, a request-duration histogram, and business
//! counters (orders placed, payments confirmed), rendered in Prometheus text
//! format by `GET /api/metrics`. Single-instance deployment, so an in-process
//! registry is sufficient.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;

/// Histogram bucket upper bounds, in seconds
const DURATION_BUCKETS: [f64; 10] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

#[derive(Debug)]
pub struct Metrics {
    started_at: Instant,
    /// Request count keyed by (method, route, status)
    requests: DashMap<(String, String, u16), u64>,
    /// Cumulative bucket counts for request duration
    duration_bucket_counts: [AtomicU64; DURATION_BUCKETS.len()],
    duration_count: AtomicU64,
    /// Sum in microseconds; rendered as seconds
    duration_sum_micros: AtomicU64,
    orders_placed: AtomicU64,
    payments_confirmed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests: DashMap::new(),
            duration_bucket_counts: Default::default(),
            duration_count: AtomicU64::new(0),
            duration_sum_micros: AtomicU64::new(0),
            orders_placed: AtomicU64::new(0),
            payments_confirmed: AtomicU64::new(0),
        }
    }

    /// Record one finished request
    pub fn record_request(&self, method: &str, route: &str, status: u16, seconds: f64) {
        *self
            .requests
            .entry((method.to_string(), route.to_string(), status))
            .or_insert(0) += 1;

        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            if seconds <= *bound {
                self.duration_bucket_counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.duration_count.fetch_add(1, Ordering::Relaxed);
        self.duration_sum_micros
            .fetch_add((seconds * 1_000_000.0) as u64, Ordering::Relaxed);
    }

    pub fn record_order_placed(&self) {
        self.orders_placed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payment_confirmed(&self) {
        self.payments_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    /// Render all metrics in Prometheus text exposition format
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP http_requests_total Total HTTP requests\n");
        out.push_str("# TYPE http_requests_total counter\n");
        let mut entries: Vec<_> = self
            .requests
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        entries.sort();
        for ((method, route, status), count) in entries {
            let _ = writeln!(
                out,
                "http_requests_total{{method=\"{method}\",path=\"{route}\",status=\"{status}\"}} {count}"
            );
        }

        out.push_str("# HELP http_request_duration_seconds HTTP request duration\n");
        out.push_str("# TYPE http_request_duration_seconds histogram\n");
        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            let count = self.duration_bucket_counts[i].load(Ordering::Relaxed);
            let _ = writeln!(
                out,
                "http_request_duration_seconds_bucket{{le=\"{bound}\"}} {count}"
            );
        }
        let count = self.duration_count.load(Ordering::Relaxed);
        let sum = self.duration_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(
            out,
            "http_request_duration_seconds_bucket{{le=\"+Inf\"}} {count}"
        );
        let _ = writeln!(out, "http_request_duration_seconds_sum {sum}");
        let _ = writeln!(out, "http_request_duration_seconds_count {count}");

        out.push_str("# HELP orders_placed_total Orders successfully placed\n");
        out.push_str("# TYPE orders_placed_total counter\n");
        let _ = writeln!(
            out,
            "orders_placed_total {}",
            self.orders_placed.load(Ordering::Relaxed)
        );

        out.push_str("# HELP payments_confirmed_total Payments confirmed as succeeded\n");
        out.push_str("# TYPE payments_confirmed_total counter\n");
        let _ = writeln!(
            out,
            "payments_confirmed_total {}",
            self.payments_confirmed.load(Ordering::Relaxed)
        );

        out.push_str("# HELP process_uptime_seconds Seconds since server start\n");
        out.push_str("# TYPE process_uptime_seconds gauge\n");
        let _ = writeln!(
            out,
            "process_uptime_seconds {}",
            self.started_at.elapsed().as_secs()
        );

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_counter_accumulates() {
        let metrics = Metrics::new();
        metrics.record_request("GET", "/api/products", 200, 0.012);
        metrics.record_request("GET", "/api/products", 200, 0.200);
        metrics.record_request("POST", "/api/orders", 400, 0.003);

        let text = metrics.render();
        assert!(text.contains(
            "http_requests_total{method=\"GET\",path=\"/api/products\",status=\"200\"} 2"
        ));
        assert!(text.contains(
            "http_requests_total{method=\"POST\",path=\"/api/orders\",status=\"400\"} 1"
        ));
        assert!(text.contains("http_request_duration_seconds_count 3"));
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let metrics = Metrics::new();
        // 12ms falls into le=0.025 and every larger bucket
        metrics.record_request("GET", "/api/health", 200, 0.012);

        let text = metrics.render();
        assert!(text.contains("http_request_duration_seconds_bucket{le=\"0.01\"} 0"));
        assert!(text.contains("http_request_duration_seconds_bucket{le=\"0.025\"} 1"));
        assert!(text.contains("http_request_duration_seconds_bucket{le=\"5\"} 1"));
        assert!(text.contains("http_request_duration_seconds_bucket{le=\"+Inf\"} 1"));
    }

    #[test]
    fn test_business_counters() {
        let metrics = Metrics::new();
        metrics.record_order_placed();
        metrics.record_order_placed();
        metrics.record_payment_confirmed();

        let text = metrics.render();
        assert!(text.contains("orders_placed_total 2"));
        assert!(text.contains("payments_confirmed_total 1"));
    }
}
