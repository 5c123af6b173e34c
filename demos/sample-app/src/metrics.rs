//! Request metrics and their Prometheus text exposition.
//!
//! | Metric | Type | Labels |
//! |---|---|---|
//! | `in_flight_requests` | gauge | |
//! | `http_requests_total` | counter | `code`, `method` |
//! | `request_duration_seconds` | histogram | `code`, `method` |
//! | `response_size_bytes` | histogram | `code`, `method` |

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const DURATION_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
pub const SIZE_BUCKETS: &[f64] = &[200.0, 500.0, 900.0, 1500.0];

#[derive(Debug, Clone)]
struct Histogram {
    bounds: &'static [f64],
    /// Cumulative: `buckets[i]` counts observations `<= bounds[i]`.
    buckets: Vec<u64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    fn new(bounds: &'static [f64]) -> Self {
        Self {
            bounds,
            buckets: vec![0; bounds.len()],
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        for (bucket, bound) in self.buckets.iter_mut().zip(self.bounds) {
            if value <= *bound {
                *bucket += 1;
            }
        }
        self.sum += value;
        self.count += 1;
    }

    fn render(&self, out: &mut String, name: &str, labels: &str) {
        for (bucket, bound) in self.buckets.iter().zip(self.bounds) {
            let _ = writeln!(out, "{name}_bucket{{{labels},le=\"{bound}\"}} {bucket}");
        }
        let _ = writeln!(out, "{name}_bucket{{{labels},le=\"+Inf\"}} {}", self.count);
        let _ = writeln!(out, "{name}_sum{{{labels}}} {}", self.sum);
        let _ = writeln!(out, "{name}_count{{{labels}}} {}", self.count);
    }
}

#[derive(Debug, Clone)]
struct Series {
    requests: u64,
    duration: Histogram,
    size: Histogram,
}

impl Series {
    fn new() -> Self {
        Self {
            requests: 0,
            duration: Histogram::new(DURATION_BUCKETS),
            size: Histogram::new(SIZE_BUCKETS),
        }
    }
}

/// Shared request metrics, keyed by (status code, lowercased method).
#[derive(Debug, Default)]
pub struct Metrics {
    in_flight: AtomicI64,
    series: Mutex<BTreeMap<(u16, String), Series>>,
}

/// Decrements the in-flight gauge when dropped.
pub struct InFlight<'a>(&'a Metrics);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_request(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlight(self)
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn record(&self, code: u16, method: &str, elapsed: Duration, size: u64) {
        let mut series = self.lock();
        let entry = series
            .entry((code, method.to_ascii_lowercase()))
            .or_insert_with(Series::new);
        entry.requests += 1;
        entry.duration.observe(elapsed.as_secs_f64());
        entry.size.observe(size as f64);
    }

    pub fn requests_total(&self, code: u16, method: &str) -> u64 {
        self.lock()
            .get(&(code, method.to_ascii_lowercase()))
            .map_or(0, |s| s.requests)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(u16, String), Series>> {
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render every metric in Prometheus text format.
    pub fn render_prometheus(&self) -> String {
        let series = self.lock().clone();
        let mut out = String::new();

        out.push_str("# HELP in_flight_requests A gauge of requests currently being served.\n");
        out.push_str("# TYPE in_flight_requests gauge\n");
        let _ = writeln!(out, "in_flight_requests {}", self.in_flight());

        out.push_str("# HELP http_requests_total A counter for requests to the application.\n");
        out.push_str("# TYPE http_requests_total counter\n");
        for ((code, method), s) in &series {
            let _ = writeln!(
                out,
                "http_requests_total{{code=\"{code}\",method=\"{method}\"}} {}",
                s.requests
            );
        }

        out.push_str("# HELP request_duration_seconds A histogram of latencies for requests.\n");
        out.push_str("# TYPE request_duration_seconds histogram\n");
        for ((code, method), s) in &series {
            let labels = format!("code=\"{code}\",method=\"{method}\"");
            s.duration.render(&mut out, "request_duration_seconds", &labels);
        }

        out.push_str("# HELP response_size_bytes A histogram of response sizes for requests.\n");
        out.push_str("# TYPE response_size_bytes histogram\n");
        for ((code, method), s) in &series {
            let labels = format!("code=\"{code}\",method=\"{method}\"");
            s.size.render(&mut out, "response_size_bytes", &labels);
        }

        out
    }
}
