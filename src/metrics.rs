//! Service counters and latency statistics.
//!
//! Only aggregate numbers are kept; answers and scores are never stored.

use crate::types::report::PredictionReport;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept per series before the oldest half is dropped
const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for the prediction service
pub struct ServiceMetrics {
    /// Predictions served
    pub predictions: AtomicU64,
    /// Results that carried the fallback score
    pub fallbacks: AtomicU64,
    /// Submissions rejected before scoring
    pub rejected: AtomicU64,
    /// Fallbacks per model label
    fallbacks_by_model: RwLock<HashMap<String, u64>>,
    /// Whole-request latency (microseconds)
    request_times: RwLock<Vec<u64>>,
    /// Per-model inference latency (microseconds)
    model_times: RwLock<HashMap<String, Vec<u64>>>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            fallbacks_by_model: RwLock::new(HashMap::new()),
            request_times: RwLock::new(Vec::with_capacity(1000)),
            model_times: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a served prediction
    pub fn record_prediction(&self, report: &PredictionReport, elapsed: Duration) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        push_sample(&self.request_times, elapsed.as_micros() as u64);

        for result in &report.results {
            if let Ok(mut times) = self.model_times.write() {
                let samples = times.entry(result.label.clone()).or_default();
                samples.push(result.latency_us);
                trim(samples);
            }

            if result.is_fallback() {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut by_model) = self.fallbacks_by_model.write() {
                    *by_model.entry(result.label.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    /// Record a submission that failed validation
    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let request_latency = self
            .request_times
            .read()
            .map(|times| LatencyStats::from_samples(&times))
            .unwrap_or_default();

        let model_latency = self
            .model_times
            .read()
            .map(|times| {
                times
                    .iter()
                    .filter(|(_, samples)| !samples.is_empty())
                    .map(|(model, samples)| (model.clone(), LatencyStats::from_samples(samples)))
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default();

        let fallbacks_by_model = self
            .fallbacks_by_model
            .read()
            .map(|m| m.clone())
            .unwrap_or_default();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            predictions: self.predictions.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            fallbacks_by_model,
            request_latency,
            model_latency,
        }
    }

    /// Log summary statistics
    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            predictions = snapshot.predictions,
            fallbacks = snapshot.fallbacks,
            rejected = snapshot.rejected,
            mean_us = snapshot.request_latency.mean_us,
            p99_us = snapshot.request_latency.p99_us,
            "Service metrics summary"
        );
        for (model, stats) in &snapshot.model_latency {
            info!(
                model = %model,
                calls = stats.count,
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p99_us = stats.p99_us,
                "Model inference times"
            );
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn push_sample(series: &RwLock<Vec<u64>>, sample: u64) {
    if let Ok(mut samples) = series.write() {
        samples.push(sample);
        trim(&mut samples);
    }
}

fn trim(samples: &mut Vec<u64>) {
    if samples.len() > MAX_SAMPLES {
        samples.drain(0..MAX_SAMPLES / 2);
    }
}

/// Latency statistics in microseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyStats {
    fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();

        Self {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }
}

/// Serializable view served on `/metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub predictions: u64,
    pub fallbacks: u64,
    pub rejected: u64,
    pub fallbacks_by_model: HashMap<String, u64>,
    pub request_latency: LatencyStats,
    pub model_latency: HashMap<String, LatencyStats>,
}

/// Periodic summary logger
pub struct MetricsReporter {
    metrics: std::sync::Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.log_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictError;
    use crate::types::report::ScoreResult;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();
        let report = PredictionReport::new(vec![
            ScoreResult::genuine("Logistic Regression", 0.4).with_latency_us(120),
            ScoreResult::fallback("Random Forest", &PredictError::estimation("rf", "boom"))
                .with_latency_us(80),
        ]);

        metrics.record_prediction(&report, Duration::from_micros(300));
        metrics.record_prediction(&report, Duration::from_micros(500));
        metrics.record_rejection();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.predictions, 2);
        assert_eq!(snapshot.fallbacks, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.fallbacks_by_model.get("Random Forest"), Some(&2));
        assert_eq!(snapshot.request_latency.count, 2);
        assert_eq!(snapshot.request_latency.mean_us, 400);
        assert_eq!(snapshot.model_latency["Logistic Regression"].p50_us, 120);
    }

    #[test]
    fn test_latency_stats() {
        let samples: Vec<u64> = (1..=100).collect();
        let stats = LatencyStats::from_samples(&samples);
        assert_eq!(stats.count, 100);
        assert_eq!(stats.mean_us, 50);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p99_us, 100);
        assert_eq!(stats.max_us, 100);

        assert_eq!(LatencyStats::from_samples(&[]), LatencyStats::default());
    }
}
