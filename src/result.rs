//! The JSON result contract (SPEC_FULL.md §6), assembled from the
//! scoreboard and graph. Field names follow
//! `original_source/backend/models.py` exactly; the serde derive
//! conventions and `to_json` helper follow the teacher's `ValidationResult`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::detectors::DetectorSets;
use crate::graph::TransactionGraph;
use crate::scoring::ScoreBoard;
use crate::MuleDetectionEngine as E;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousAccount {
    pub account_id: String,
    pub suspicion_score: u32,
    pub detected_patterns: Vec<String>,
    pub ring_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudRing {
    pub ring_id: String,
    pub member_accounts: Vec<String>,
    pub pattern_type: String,
    pub risk_score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total_accounts_analyzed: usize,
    pub suspicious_accounts_flagged: usize,
    pub fraud_rings_detected: usize,
    pub processing_time_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub is_suspicious: bool,
    pub suspicion_score: u32,
    pub is_fraud_ring_member: bool,
    pub ring_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub amount: f64,
    pub transaction_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    pub fraud_rings: Vec<FraudRing>,
    pub summary: Summary,
    pub graph_data: GraphData,
}

impl AnalysisResult {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

pub fn build_result(
    graph: &TransactionGraph,
    detectors: &DetectorSets,
    scoreboard: &ScoreBoard,
    elapsed_secs: f64,
) -> AnalysisResult {
    let mut suspicious: Vec<SuspiciousAccount> = scoreboard
        .scores
        .iter()
        .filter(|(_, &score)| score >= E::SUSPICIOUS_THRESHOLD)
        .map(|(node, &score)| SuspiciousAccount {
            account_id: node.clone(),
            suspicion_score: score,
            detected_patterns: scoreboard.patterns.get(node).cloned().unwrap_or_default(),
            ring_id: scoreboard.rings.get(node).and_then(|r| r.first().cloned()),
        })
        .collect();
    suspicious.sort_by(|a, b| b.suspicion_score.cmp(&a.suspicion_score));

    let fraud_rings: Vec<FraudRing> = detectors
        .cycles
        .iter()
        .enumerate()
        .map(|(i, cycle)| {
            let sum: u32 = cycle
                .iter()
                .map(|a| *scoreboard.scores.get(a).unwrap_or(&0))
                .sum();
            let avg = sum as f64 / cycle.len() as f64;
            let risk = ((avg.round() as i64) + 10).clamp(0, 100) as u32;
            FraudRing {
                ring_id: format!("RING_{:03}", i + 1),
                member_accounts: cycle.clone(),
                pattern_type: "cycle".to_string(),
                risk_score: risk,
            }
        })
        .collect();

    let summary = Summary {
        total_accounts_analyzed: graph.node_count(),
        suspicious_accounts_flagged: suspicious.len(),
        fraud_rings_detected: fraud_rings.len(),
        processing_time_seconds: (elapsed_secs * 1000.0).round() / 1000.0,
    };

    let mut ring_members: HashSet<String> = HashSet::new();
    for ring in &fraud_rings {
        ring_members.extend(ring.member_accounts.iter().cloned());
    }

    let mut priority: HashSet<String> = scoreboard
        .scores
        .iter()
        .filter(|(_, &s)| s >= E::SUSPICIOUS_THRESHOLD)
        .map(|(k, _)| k.clone())
        .collect();
    priority.extend(ring_members.iter().cloned());

    let all_nodes: HashSet<String> = graph.nodes().cloned().collect();
    let display: HashSet<String> = if all_nodes.len() > E::MAX_VIZ_NODES {
        let mut set = priority.clone();
        let slots = E::MAX_VIZ_NODES.saturating_sub(priority.len());
        for node in all_nodes.difference(&priority).take(slots) {
            set.insert(node.clone());
        }
        set
    } else {
        all_nodes
    };

    let nodes: Vec<GraphNode> = display
        .iter()
        .map(|node| {
            let score = *scoreboard.scores.get(node).unwrap_or(&0);
            GraphNode {
                id: node.clone(),
                is_suspicious: score >= E::SUSPICIOUS_THRESHOLD,
                suspicion_score: score,
                is_fraud_ring_member: ring_members.contains(node),
                ring_ids: scoreboard.rings.get(node).cloned().unwrap_or_default(),
            }
        })
        .collect();

    let edges: Vec<GraphEdge> = graph
        .edges()
        .filter(|edge| display.contains(&edge.sender) && display.contains(&edge.receiver))
        .map(|edge| GraphEdge {
            source: edge.sender.clone(),
            target: edge.receiver.clone(),
            amount: edge.amount,
            transaction_id: edge.transaction_id.clone(),
            timestamp: edge.timestamp.to_rfc3339(),
        })
        .collect();

    AnalysisResult {
        suspicious_accounts: suspicious,
        fraud_rings,
        summary,
        graph_data: GraphData { nodes, edges },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_normalizer::RawTransaction;
    use std::collections::HashMap;
    use chrono::{TimeZone, Utc};

    fn row(sender: &str, receiver: &str, amount: f64) -> RawTransaction {
        RawTransaction {
            transaction_id: format!("{sender}-{receiver}"),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn suspicious_accounts_sorted_descending() {
        let rows = vec![row("A", "B", 10.0), row("B", "C", 20.0)];
        let graph = TransactionGraph::build(&rows);
        let detectors = DetectorSets {
            cycles: vec![],
            fan_in: HashSet::new(),
            fan_out: HashSet::new(),
            chains: HashSet::new(),
            passthrough: HashSet::new(),
            temporal: HashSet::new(),
            round_amount: HashSet::new(),
            anomaly: HashSet::new(),
            dormancy: HashSet::new(),
            smurf_hubs: HashSet::new(),
            smurf_sources: HashSet::new(),
        };
        let mut scores = HashMap::new();
        scores.insert("A".to_string(), 40);
        scores.insert("B".to_string(), 80);
        scores.insert("C".to_string(), 10);
        let scoreboard = ScoreBoard {
            scores,
            patterns: HashMap::new(),
            rings: HashMap::new(),
        };
        let result = build_result(&graph, &detectors, &scoreboard, 0.01);
        assert_eq!(result.suspicious_accounts.len(), 2);
        assert_eq!(result.suspicious_accounts[0].account_id, "B");
        assert_eq!(result.suspicious_accounts[1].account_id, "A");
    }

    #[test]
    fn fraud_ring_risk_score_is_mean_plus_ten_clamped() {
        let rows = vec![row("A", "B", 10.0), row("B", "A", 10.0)];
        let graph = TransactionGraph::build(&rows);
        let detectors = DetectorSets {
            cycles: vec![vec!["A".to_string(), "B".to_string()]],
            fan_in: HashSet::new(),
            fan_out: HashSet::new(),
            chains: HashSet::new(),
            passthrough: HashSet::new(),
            temporal: HashSet::new(),
            round_amount: HashSet::new(),
            anomaly: HashSet::new(),
            dormancy: HashSet::new(),
            smurf_hubs: HashSet::new(),
            smurf_sources: HashSet::new(),
        };
        let mut scores = HashMap::new();
        scores.insert("A".to_string(), 90);
        scores.insert("B".to_string(), 90);
        let scoreboard = ScoreBoard {
            scores,
            patterns: HashMap::new(),
            rings: HashMap::new(),
        };
        let result = build_result(&graph, &detectors, &scoreboard, 0.01);
        assert_eq!(result.fraud_rings[0].risk_score, 100);
    }

    #[test]
    fn round_trips_through_json() {
        let rows = vec![row("A", "B", 10.0)];
        let graph = TransactionGraph::build(&rows);
        let detectors = DetectorSets {
            cycles: vec![],
            fan_in: HashSet::new(),
            fan_out: HashSet::new(),
            chains: HashSet::new(),
            passthrough: HashSet::new(),
            temporal: HashSet::new(),
            round_amount: HashSet::new(),
            anomaly: HashSet::new(),
            dormancy: HashSet::new(),
            smurf_hubs: HashSet::new(),
            smurf_sources: HashSet::new(),
        };
        let scoreboard = ScoreBoard {
            scores: HashMap::new(),
            patterns: HashMap::new(),
            rings: HashMap::new(),
        };
        let result = build_result(&graph, &detectors, &scoreboard, 0.0);
        let json = result.to_json().unwrap();
        let back = AnalysisResult::from_json(&json).unwrap();
        assert_eq!(back.summary.total_accounts_analyzed, result.summary.total_accounts_analyzed);
    }
}
