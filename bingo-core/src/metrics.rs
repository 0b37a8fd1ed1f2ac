//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the engine.
//!
//! # Metrics
//!
//! - `bingo_boards_assigned_total` - Boards generated and committed
//! - `bingo_submissions_total` - Submissions created
//! - `bingo_reviews_total{decision}` - Reviews committed, by decision
//! - `bingo_lines_awarded_total` - Bingo lines paid
//! - `bingo_points_granted_total` - Sum of all ledger grants
//! - `bingo_review_duration_seconds` - Histogram of review commit latency

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Each collector owns its registry, so several engines can live in one
/// process (as they do in tests).
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Boards committed
    pub boards_assigned: IntCounter,

    /// Submissions created
    pub submissions_total: IntCounter,

    /// Reviews by decision
    pub reviews_total: IntCounterVec,

    /// Lines awarded
    pub lines_awarded: IntCounter,

    /// Points granted
    pub points_granted: IntCounter,

    /// Review latency
    pub review_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let boards_assigned = IntCounter::new(
            "bingo_boards_assigned_total",
            "Boards generated and committed",
        )?;
        registry.register(Box::new(boards_assigned.clone()))?;

        let submissions_total = IntCounter::new("bingo_submissions_total", "Submissions created")?;
        registry.register(Box::new(submissions_total.clone()))?;

        let reviews_total = IntCounterVec::new(
            Opts::new("bingo_reviews_total", "Reviews committed"),
            &["decision"],
        )?;
        registry.register(Box::new(reviews_total.clone()))?;

        let lines_awarded = IntCounter::new("bingo_lines_awarded_total", "Bingo lines paid")?;
        registry.register(Box::new(lines_awarded.clone()))?;

        let points_granted =
            IntCounter::new("bingo_points_granted_total", "Sum of all ledger grants")?;
        registry.register(Box::new(points_granted.clone()))?;

        let review_duration = Histogram::with_opts(
            HistogramOpts::new(
                "bingo_review_duration_seconds",
                "Histogram of review commit latency",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(review_duration.clone()))?;

        Ok(Self {
            boards_assigned,
            submissions_total,
            reviews_total,
            lines_awarded,
            points_granted,
            review_duration,
            registry,
        })
    }

    /// Record a committed board
    pub fn record_board_assigned(&self) {
        self.boards_assigned.inc();
    }

    /// Record a created submission
    pub fn record_submission(&self) {
        self.submissions_total.inc();
    }

    /// Record a committed review
    pub fn record_review(&self, approved: bool, lines: usize, points: i64, seconds: f64) {
        let decision = if approved { "approve" } else { "reject" };
        self.reviews_total.with_label_values(&[decision]).inc();
        self.lines_awarded.inc_by(lines as u64);
        if points > 0 {
            self.points_granted.inc_by(points as u64);
        }
        self.review_duration.observe(seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.boards_assigned.get(), 0);
        assert_eq!(metrics.submissions_total.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_board_assigned();
        assert_eq!(a.boards_assigned.get(), 1);
        assert_eq!(b.boards_assigned.get(), 0);
    }

    #[test]
    fn test_record_review() {
        let metrics = Metrics::new().unwrap();
        metrics.record_review(true, 2, 260, 0.004);
        metrics.record_review(false, 0, 0, 0.001);

        assert_eq!(metrics.reviews_total.with_label_values(&["approve"]).get(), 1);
        assert_eq!(metrics.reviews_total.with_label_values(&["reject"]).get(), 1);
        assert_eq!(metrics.lines_awarded.get(), 2);
        assert_eq!(metrics.points_granted.get(), 260);
    }
}
