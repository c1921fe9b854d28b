//! # Mule Detection Engine
//!
//! A graph-based fraud and money-muling detection engine for transaction
//! CSV exports.
//!
//! Given a CSV export of transactions, [`MuleDetectionEngine::analyze`] builds
//! an aggregated transaction graph, runs a battery of independent pattern
//! detectors (cycles, fan-in/fan-out, layered chains, pass-through shells,
//! round-amount structuring, statistical amount anomalies, temporal
//! clustering, rapid-dormancy bursts, and smurfing), excludes accounts that
//! look like legitimate high-volume merchants, and fuses the results into a
//! single suspicion score per account plus a set of detected fraud rings.
//!
//! The engine holds no state across calls: every [`MuleDetectionEngine`] is a
//! zero-sized handle, and every threshold used by the detectors is a fixed
//! associated constant rather than runtime configuration.

pub mod csv_normalizer;
pub mod detectors;
pub mod graph;
pub mod merchants;
pub mod result;
pub mod scoring;

pub use csv_normalizer::{ParsedBatch, RawTransaction};
pub use detectors::DetectorSets;
pub use graph::{Aggregates, AggregatedEdge, TransactionGraph};
pub use result::{AnalysisResult, FraudRing, GraphData, GraphEdge, GraphNode, Summary, SuspiciousAccount};
pub use scoring::ScoreBoard;

use std::time::Instant;

use chrono::{TimeZone, Utc};
use thiserror::Error;

/// Errors returned while analyzing a CSV export.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("missing required column(s) {missing:?}; observed columns: {observed:?}")]
    SchemaError {
        missing: Vec<String>,
        observed: Vec<String>,
    },
    #[error("failed to parse CSV: {0}")]
    ParseError(String),
}

/// Stateless handle for running the detection pipeline. All thresholds are
/// fixed associated constants; construct with [`MuleDetectionEngine::new`] or
/// `Default::default`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MuleDetectionEngine;

impl MuleDetectionEngine {
    // Additive suspicion scores per detected pattern.
    pub const CYCLE_SCORE: u32 = 50;
    pub const PASSTHROUGH_SCORE: u32 = 30;
    pub const SMURF_SCORE: u32 = 40;
    pub const AMOUNT_ANOMALY_SCORE: u32 = 20;
    pub const TEMPORAL_SCORE: u32 = 20;
    pub const CHAIN_SCORE: u32 = 15;
    pub const ROUND_AMOUNT_SCORE: u32 = 15;
    pub const DORMANCY_SCORE: u32 = 15;
    pub const FAN_IO_SCORE: u32 = 10;
    pub const MAX_SCORE: u32 = 100;
    pub const SUSPICIOUS_THRESHOLD: u32 = 40;

    // Detector thresholds.
    pub const FAN_THRESHOLD: usize = 10;
    pub const MAX_CYCLE_LEN: usize = 5;
    pub const MIN_CHAIN_LEN: u32 = 3;
    pub const PASSTHROUGH_RATIO: f64 = 0.98;
    pub const MERCHANT_PT_CAP: f64 = 0.5;
    pub const TEMPORAL_WINDOW_H: i64 = 72;
    pub const TEMPORAL_TX_MIN: usize = 10;
    pub const ROUND_RATIO_THRESHOLD: f64 = 0.5;
    pub const ANOMALY_SIGMA: f64 = 3.0;
    pub const DORMANCY_ACTIVE_H: i64 = 48;
    pub const DORMANCY_SILENT_H: i64 = 168;
    pub const DORMANCY_MIN_TXN: usize = 5;
    pub const SMURF_MIN_SOURCES: usize = 5;
    pub const SMURF_WINDOW_H: i64 = 24;

    // Resource budgets.
    pub const MAX_CYCLES: usize = 500;
    pub const MAX_VIZ_NODES: usize = 2000;
    pub const CYCLE_TIME_LIMIT_SECS: f64 = 5.0;

    pub fn new() -> Self {
        Self
    }

    /// Run the full pipeline over a CSV export: normalize, build the
    /// aggregated graph, precompute aggregates, run every detector, exclude
    /// merchants, score, and assemble the result contract.
    pub fn analyze(&self, csv_content: &str) -> Result<AnalysisResult, EngineError> {
        let start = Instant::now();

        let batch = csv_normalizer::parse_csv(csv_content)?;
        let graph = TransactionGraph::build(&batch.rows);
        let aggregates = Aggregates::compute(&batch.rows);
        let global_max_ts = batch
            .rows
            .iter()
            .map(|r| r.timestamp)
            .max()
            .unwrap_or_else(|| Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

        let detector_sets = detectors::run_all(
            &graph,
            &batch.rows,
            &aggregates,
            batch.has_timestamps,
            global_max_ts,
        );
        let merchants = merchants::detect_merchants(
            &graph,
            &aggregates,
            &detector_sets.cycles,
            &detector_sets.smurf_hubs,
        );
        let scoreboard = scoring::score_accounts(&graph, &detector_sets, &merchants);

        let elapsed = start.elapsed().as_secs_f64();
        log::info!(
            "analyzed {} accounts, {} rows in {:.3}s",
            graph.node_count(),
            batch.rows.len(),
            elapsed
        );

        Ok(result::build_result(&graph, &detector_sets, &scoreboard, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_csv_after_self_loops_removed_is_not_an_error() {
        let csv = "sender_id,receiver_id,amount\nA,A,10\n";
        let engine = MuleDetectionEngine::new();
        let result = engine.analyze(csv).unwrap();
        assert_eq!(result.summary.total_accounts_analyzed, 0);
        assert!(result.suspicious_accounts.is_empty());
    }

    #[test]
    fn missing_schema_columns_is_an_error() {
        let csv = "foo,bar\n1,2\n";
        let engine = MuleDetectionEngine::new();
        assert!(matches!(
            engine.analyze(csv),
            Err(EngineError::SchemaError { .. })
        ));
    }

    #[test]
    fn triangle_cycle_end_to_end() {
        let csv = "sender_id,receiver_id,amount,timestamp\n\
                   A,B,10000,2026-01-01T00:00:00Z\n\
                   B,C,10000,2026-01-01T01:00:00Z\n\
                   C,A,10000,2026-01-01T02:00:00Z\n";
        let engine = MuleDetectionEngine::new();
        let result = engine.analyze(csv).unwrap();
        assert_eq!(result.fraud_rings.len(), 1);
        assert_eq!(result.fraud_rings[0].member_accounts.len(), 3);
        assert_eq!(result.suspicious_accounts.len(), 3);
    }

    #[test]
    fn analyze_is_idempotent() {
        let csv = "sender_id,receiver_id,amount\nA,B,100\nB,C,200\n";
        let engine = MuleDetectionEngine::new();
        let first = engine.analyze(csv).unwrap();
        let second = engine.analyze(csv).unwrap();
        assert_eq!(first.summary.total_accounts_analyzed, second.summary.total_accounts_analyzed);
        assert_eq!(first.suspicious_accounts.len(), second.suspicious_accounts.len());
    }
}
