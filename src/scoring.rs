//! Additive suspicion scoring, pattern labels, and ring assignment
//! (SPEC_FULL.md §4.5). The additive-clamp shape follows the teacher's
//! `RiskBreakdown`/`calculate_total` in `src/lib.rs`; the score-to-label
//! accumulation follows `fraud_patterns.rs`'s `FraudScore`/`RiskLevel`.

use std::collections::{HashMap, HashSet};

use crate::detectors::DetectorSets;
use crate::graph::TransactionGraph;
use crate::MuleDetectionEngine as E;

/// Per-account score, labels, and ring memberships produced by fusing every
/// detector's output.
pub struct ScoreBoard {
    pub scores: HashMap<String, u32>,
    pub patterns: HashMap<String, Vec<String>>,
    pub rings: HashMap<String, Vec<String>>,
}

pub fn score_accounts(
    graph: &TransactionGraph,
    detectors: &DetectorSets,
    merchants: &HashSet<String>,
) -> ScoreBoard {
    let mut scores = HashMap::new();
    let mut patterns = HashMap::new();
    let mut rings: HashMap<String, Vec<String>> = HashMap::new();

    for (i, cycle) in detectors.cycles.iter().enumerate() {
        let ring_id = format!("RING_{:03}", i + 1);
        for acc in cycle {
            rings.entry(acc.clone()).or_default().push(ring_id.clone());
        }
    }

    let mut cycle_lengths: HashMap<&str, HashSet<usize>> = HashMap::new();
    for cycle in &detectors.cycles {
        for acc in cycle {
            cycle_lengths.entry(acc.as_str()).or_default().insert(cycle.len());
        }
    }

    for node in graph.nodes() {
        if merchants.contains(node) {
            scores.insert(node.clone(), 0);
            patterns.insert(node.clone(), vec!["legitimate_merchant".to_string()]);
            continue;
        }

        let mut score: u32 = 0;
        let mut pats = Vec::new();

        if let Some(lengths) = cycle_lengths.get(node.as_str()) {
            score += E::CYCLE_SCORE;
            let mut lens: Vec<usize> = lengths.iter().copied().collect();
            lens.sort_unstable();
            for len in lens {
                pats.push(format!("cycle_length_{len}"));
            }
        }
        if detectors.passthrough.contains(node) {
            score += E::PASSTHROUGH_SCORE;
            pats.push("passthrough_shell".to_string());
        }
        if detectors.anomaly.contains(node) {
            score += E::AMOUNT_ANOMALY_SCORE;
            pats.push("amount_anomaly".to_string());
        }
        if detectors.temporal.contains(node) {
            score += E::TEMPORAL_SCORE;
            pats.push("temporal_clustering".to_string());
        }
        if detectors.round_amount.contains(node) {
            score += E::ROUND_AMOUNT_SCORE;
            pats.push("round_amount_structuring".to_string());
        }
        if detectors.dormancy.contains(node) {
            score += E::DORMANCY_SCORE;
            pats.push("rapid_dormancy".to_string());
        }
        if detectors.fan_in.contains(node) {
            score += E::FAN_IO_SCORE;
            pats.push("fan_in".to_string());
        }
        if detectors.fan_out.contains(node) {
            score += E::FAN_IO_SCORE;
            pats.push("fan_out".to_string());
        }
        if detectors.chains.contains(node) {
            score += E::CHAIN_SCORE;
            pats.push("layered_chain".to_string());
        }
        if detectors.smurf_hubs.contains(node) {
            score += E::SMURF_SCORE;
            pats.push("smurfing_hub".to_string());
        }
        if detectors.smurf_sources.contains(node) {
            score += E::SMURF_SCORE;
            pats.push("smurfing_source".to_string());
        }

        scores.insert(node.clone(), score.min(E::MAX_SCORE));
        patterns.insert(node.clone(), pats);
    }

    ScoreBoard { scores, patterns, rings }
}
