//! Merchant exclusion filter (SPEC_FULL.md §4.4 "Merchant filter"). High
//! in-degree, low pass-through, high in/out ratio accounts that are not
//! smurfing hubs and never appear in a detected cycle are treated as
//! legitimate merchants rather than fraud indicators. No teacher analogue;
//! grounded directly on `original_source/backend/detector.py::_detect_merchants`.

use std::collections::HashSet;

use crate::graph::{Aggregates, TransactionGraph};
use crate::MuleDetectionEngine as E;

pub fn detect_merchants(
    graph: &TransactionGraph,
    aggregates: &Aggregates,
    cycles: &[Vec<String>],
    smurf_hubs: &HashSet<String>,
) -> HashSet<String> {
    let cycle_members: HashSet<&str> = cycles.iter().flatten().map(|s| s.as_str()).collect();

    graph
        .nodes()
        .filter(|node| {
            let in_degree = graph.in_degree(node);
            if in_degree < 5 {
                return false;
            }
            if smurf_hubs.contains(node.as_str()) {
                return false;
            }

            let out_degree = graph.out_degree(node);
            let ratio = if out_degree == 0 {
                f64::INFINITY
            } else {
                in_degree as f64 / out_degree as f64
            };
            if ratio < 3.0 {
                return false;
            }

            let total_in = aggregates.inbound(node);
            let total_out = aggregates.outbound(node);
            let pass_through = if total_in > 0.0 { total_out / total_in } else { 0.0 };
            if pass_through >= E::MERCHANT_PT_CAP {
                return false;
            }

            !cycle_members.contains(node.as_str())
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_normalizer::RawTransaction;
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
    fn flags_high_fan_in_low_passthrough_account_as_merchant() {
        let rows: Vec<RawTransaction> = (0..6)
            .map(|i| row(&format!("C{i}"), "STORE", 100.0))
            .collect();
        let graph = TransactionGraph::build(&rows);
        let agg = Aggregates::compute(&rows);
        let merchants = detect_merchants(&graph, &agg, &[], &HashSet::new());
        assert!(merchants.contains("STORE"));
    }

    #[test]
    fn excludes_accounts_that_are_cycle_members() {
        let rows: Vec<RawTransaction> = (0..6)
            .map(|i| row(&format!("C{i}"), "STORE", 100.0))
            .collect();
        let graph = TransactionGraph::build(&rows);
        let agg = Aggregates::compute(&rows);
        let cycles = vec![vec!["STORE".to_string(), "C0".to_string()]];
        let merchants = detect_merchants(&graph, &agg, &cycles, &HashSet::new());
        assert!(!merchants.contains("STORE"));
    }

    #[test]
    fn excludes_smurf_hubs() {
        let rows: Vec<RawTransaction> = (0..6)
            .map(|i| row(&format!("C{i}"), "STORE", 100.0))
            .collect();
        let graph = TransactionGraph::build(&rows);
        let agg = Aggregates::compute(&rows);
        let mut hubs = HashSet::new();
        hubs.insert("STORE".to_string());
        assert!(detect_merchants(&graph, &agg, &[], &hubs).is_empty());
    }
}
