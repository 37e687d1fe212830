//! Load metrics for probe fan-outs.
//!
//! Captures one [`Outcome`] per probe and folds them into a
//! [`LoadReport`] with latency percentiles, throughput and error rate.

use crate::client::ApiSnapshot;
use crate::error::Result;
use hdrhistogram::Histogram;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::info;

/// Result of a single probe.
#[derive(Debug, Clone, Copy)]
pub struct Outcome {
    pub success: bool,
    pub status: Option<u16>,
    pub elapsed: Duration,
}

impl Outcome {
    pub fn of_snapshot(snapshot: &ApiSnapshot) -> Self {
        Self {
            success: snapshot.is_success(),
            status: Some(snapshot.status),
            elapsed: snapshot.elapsed,
        }
    }

    /// Transport-level failure (no response at all).
    pub fn failure(elapsed: Duration) -> Self {
        Self {
            success: false,
            status: None,
            elapsed,
        }
    }
}

/// Aggregated view over a set of probe outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub wall_time: Duration,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub requests_per_second: f64,
    pub error_rate: f64,
}

impl LoadReport {
    pub fn from_outcomes(outcomes: &[Outcome], wall_time: Duration) -> Self {
        // Three significant digits is plenty for wall-clock latencies.
        let mut histogram = Histogram::<u64>::new(3).unwrap();
        let mut succeeded = 0u64;
        for outcome in outcomes {
            if outcome.success {
                succeeded += 1;
            }
            let _ = histogram.record(outcome.elapsed.as_micros() as u64);
        }

        let total = outcomes.len() as u64;
        let failed = total - succeeded;
        let from_micros = Duration::from_micros;
        let wall_secs = wall_time.as_secs_f64();

        Self {
            total,
            succeeded,
            failed,
            wall_time,
            min: from_micros(if total > 0 { histogram.min() } else { 0 }),
            max: from_micros(histogram.max()),
            mean: Duration::from_secs_f64(histogram.mean() / 1e6),
            p50: from_micros(histogram.value_at_quantile(0.50)),
            p95: from_micros(histogram.value_at_quantile(0.95)),
            p99: from_micros(histogram.value_at_quantile(0.99)),
            requests_per_second: if wall_secs > 0.0 {
                total as f64 / wall_secs
            } else {
                0.0
            },
            error_rate: if total > 0 {
                failed as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Serializable view with latencies in milliseconds.
    pub fn to_json(&self) -> Value {
        let ms = |d: Duration| round3(d.as_secs_f64() * 1e3);
        serde_json::json!({
            "total_requests": self.total,
            "successful_requests": self.succeeded,
            "failed_requests": self.failed,
            "total_time_ms": ms(self.wall_time),
            "min_response_time_ms": ms(self.min),
            "max_response_time_ms": ms(self.max),
            "avg_response_time_ms": ms(self.mean),
            "p50_response_time_ms": ms(self.p50),
            "p95_response_time_ms": ms(self.p95),
            "p99_response_time_ms": ms(self.p99),
            "requests_per_second": round3(self.requests_per_second),
            "error_rate_percent": round3(self.error_rate * 100.0),
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Fan `total` probes out over at most `concurrency` in-flight tasks and
/// aggregate their outcomes. The probe factory is called once per request.
pub async fn run_load<F, Fut>(concurrency: usize, total: usize, probe: F) -> LoadReport
where
    F: Fn() -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<ApiSnapshot>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let started = Instant::now();

    let mut tasks = Vec::with_capacity(total);
    for _ in 0..total {
        let semaphore = semaphore.clone();
        let probe = probe.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let request_started = Instant::now();
            match probe().await {
                Ok(snapshot) => Outcome::of_snapshot(&snapshot),
                Err(_) => Outcome::failure(request_started.elapsed()),
            }
        }));
    }

    let mut outcomes = Vec::with_capacity(total);
    for task in tasks {
        if let Ok(outcome) = task.await {
            outcomes.push(outcome);
        }
    }

    let report = LoadReport::from_outcomes(&outcomes, started.elapsed());
    info!(
        total = report.total,
        failed = report.failed,
        p95_ms = report.p95.as_millis() as u64,
        "load run finished"
    );
    report
}
