//! The nine independent pattern detectors (SPEC_FULL.md §4.4). Cycle,
//! pass-through, and fan-in/out shapes are generalized from the teacher's
//! `network_analysis.rs` (`detect_circular_flows`, `detect_pass_through`,
//! `is_funnel`); round-amount scanning follows `fraud_patterns.rs`'s
//! `check_round_amount`/`check_velocity` scan-and-count shape.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};

use crate::csv_normalizer::RawTransaction;
use crate::graph::{Aggregates, TransactionGraph};
use crate::MuleDetectionEngine as E;

const ROUND_AMOUNTS: &[f64] = &[
    1000.0, 2000.0, 5000.0, 10000.0, 20000.0, 25000.0, 50000.0, 100000.0,
];

/// The raw rows an account appears in, indexed once per `analyze` call and
/// shared across the detectors that need per-transaction (not aggregated)
/// data. Mirrors the by-sender/by-receiver split used for row lookups in
/// `examples/dudukav-eth_analyzer`.
struct AccountRows<'a> {
    by_sender: HashMap<&'a str, Vec<&'a RawTransaction>>,
    by_receiver: HashMap<&'a str, Vec<&'a RawTransaction>>,
}

impl<'a> AccountRows<'a> {
    fn build(rows: &'a [RawTransaction]) -> Self {
        let mut by_sender: HashMap<&str, Vec<&RawTransaction>> = HashMap::new();
        let mut by_receiver: HashMap<&str, Vec<&RawTransaction>> = HashMap::new();
        for row in rows {
            by_sender.entry(row.sender_id.as_str()).or_default().push(row);
            by_receiver
                .entry(row.receiver_id.as_str())
                .or_default()
                .push(row);
        }
        Self { by_sender, by_receiver }
    }
}

/// Output of every detector, keyed by account id (or, for cycles, the
/// ordered member list of each ring).
pub struct DetectorSets {
    pub cycles: Vec<Vec<String>>,
    pub fan_in: HashSet<String>,
    pub fan_out: HashSet<String>,
    pub chains: HashSet<String>,
    pub passthrough: HashSet<String>,
    pub temporal: HashSet<String>,
    pub round_amount: HashSet<String>,
    pub anomaly: HashSet<String>,
    pub dormancy: HashSet<String>,
    pub smurf_hubs: HashSet<String>,
    pub smurf_sources: HashSet<String>,
}

/// Run every detector over the graph/rows and return the combined sets.
pub fn run_all(
    graph: &TransactionGraph,
    rows: &[RawTransaction],
    aggregates: &Aggregates,
    has_timestamps: bool,
    global_max_ts: DateTime<Utc>,
) -> DetectorSets {
    let idx = AccountRows::build(rows);

    let cycles = detect_cycles(graph);
    let fan_in = detect_fan_in(graph);
    let fan_out = detect_fan_out(graph);
    let chains = detect_chains(graph);
    let passthrough = detect_passthrough(graph, aggregates);
    let round_amount = detect_round_amount(graph, &idx);
    let anomaly = detect_amount_anomaly(rows);

    let (temporal, dormancy) = if has_timestamps {
        (
            detect_temporal(graph, &idx),
            detect_rapid_dormancy(graph, &idx, global_max_ts),
        )
    } else {
        (HashSet::new(), HashSet::new())
    };

    let (smurf_hubs, smurf_sources) = detect_smurfing(graph, &idx, has_timestamps);

    DetectorSets {
        cycles,
        fan_in,
        fan_out,
        chains,
        passthrough,
        temporal,
        round_amount,
        anomaly,
        dormancy,
        smurf_hubs,
        smurf_sources,
    }
}

/// Length-bounded (3..=MAX_CYCLE_LEN) simple cycle enumeration, budgeted by
/// wall-clock time and total cycle count. Each start node only continues
/// through neighbors that compare >= itself, so a given *directed* simple
/// cycle is only ever walked from its lexicographically-smallest member.
/// That alone does not collapse two distinct directed cycles over the same
/// node set (e.g. A->B->C->A and A->C->B->A when both edge directions
/// exist), so `seen_sets` additionally dedups by sorted node set, matching
/// `detector.py`'s `frozenset(cycle)` dedup.
fn detect_cycles(graph: &TransactionGraph) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    let mut seen_sets: HashSet<Vec<String>> = HashSet::new();
    let deadline = Instant::now() + StdDuration::from_secs_f64(E::CYCLE_TIME_LIMIT_SECS);

    let mut nodes: Vec<String> = graph.nodes().cloned().collect();
    nodes.sort();

    for start in &nodes {
        if Instant::now() >= deadline || cycles.len() >= E::MAX_CYCLES {
            log::debug!("cycle detection stopped early: time or count budget exhausted");
            break;
        }
        let mut path = vec![start.clone()];
        let mut on_path: HashSet<String> = HashSet::new();
        on_path.insert(start.clone());
        if !dfs_cycles(
            graph,
            start,
            start,
            &mut path,
            &mut on_path,
            &mut cycles,
            &mut seen_sets,
            deadline,
        ) {
            break;
        }
    }

    cycles
}

fn dfs_cycles(
    graph: &TransactionGraph,
    start: &str,
    current: &str,
    path: &mut Vec<String>,
    on_path: &mut HashSet<String>,
    cycles: &mut Vec<Vec<String>>,
    seen_sets: &mut HashSet<Vec<String>>,
    deadline: Instant,
) -> bool {
    for next in graph.successors(current) {
        if next.as_str() < start {
            continue;
        }
        if next.as_str() == start {
            if path.len() >= 3 {
                let mut key = path.clone();
                key.sort();
                if seen_sets.insert(key) {
                    cycles.push(path.clone());
                    if Instant::now() >= deadline || cycles.len() >= E::MAX_CYCLES {
                        return false;
                    }
                }
            }
            continue;
        }
        if on_path.contains(next) {
            continue;
        }
        if path.len() >= E::MAX_CYCLE_LEN {
            // Already at the bound: this node can still close a cycle back
            // to `start` (handled above), it just can't extend further.
            continue;
        }

        path.push(next.clone());
        on_path.insert(next.clone());
        let keep_going = dfs_cycles(graph, start, next, path, on_path, cycles, seen_sets, deadline);
        on_path.remove(next);
        path.pop();
        if !keep_going {
            return false;
        }
    }
    true
}

fn detect_fan_in(graph: &TransactionGraph) -> HashSet<String> {
    graph
        .nodes()
        .filter(|n| graph.in_degree(n) >= E::FAN_THRESHOLD)
        .cloned()
        .collect()
}

fn detect_fan_out(graph: &TransactionGraph) -> HashSet<String> {
    graph
        .nodes()
        .filter(|n| graph.out_degree(n) >= E::FAN_THRESHOLD)
        .cloned()
        .collect()
}

/// BFS from every node up to depth 6; flags the start and the first
/// descendant reached at depth >= MIN_CHAIN_LEN.
fn detect_chains(graph: &TransactionGraph) -> HashSet<String> {
    let mut chains = HashSet::new();

    for start in graph.nodes() {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.clone());
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((start.clone(), 1));

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= E::MIN_CHAIN_LEN {
                chains.insert(start.clone());
                chains.insert(node);
                break;
            }
            if depth >= 6 {
                continue;
            }
            for succ in graph.successors(&node) {
                if visited.insert(succ.clone()) {
                    queue.push_back((succ.clone(), depth + 1));
                }
            }
        }
    }

    chains
}

fn detect_passthrough(graph: &TransactionGraph, aggregates: &Aggregates) -> HashSet<String> {
    graph
        .nodes()
        .filter_map(|n| {
            let inbound = aggregates.inbound(n);
            if inbound <= 0.0 {
                return None;
            }
            let outbound = aggregates.outbound(n);
            if outbound / inbound > E::PASSTHROUGH_RATIO {
                Some(n.clone())
            } else {
                None
            }
        })
        .collect()
}

fn is_round_amount(amount: f64) -> bool {
    amount > 0.0 && (ROUND_AMOUNTS.contains(&amount) || amount % 1000.0 == 0.0)
}

fn detect_round_amount(graph: &TransactionGraph, idx: &AccountRows) -> HashSet<String> {
    let mut result = HashSet::new();
    for node in graph.nodes() {
        let mut count = 0usize;
        let mut round = 0usize;
        for rows in [idx.by_sender.get(node.as_str()), idx.by_receiver.get(node.as_str())]
            .into_iter()
            .flatten()
        {
            for r in rows {
                count += 1;
                if is_round_amount(r.amount) {
                    round += 1;
                }
            }
        }
        if count == 0 {
            continue;
        }
        if round as f64 / count as f64 >= E::ROUND_RATIO_THRESHOLD {
            result.insert(node.clone());
        }
    }
    result
}

/// Mean + 3*sigma (sample standard deviation) over all transaction amounts;
/// skipped entirely when fewer than 5 rows exist.
fn detect_amount_anomaly(rows: &[RawTransaction]) -> HashSet<String> {
    let mut result = HashSet::new();
    if rows.len() < 5 {
        return result;
    }
    let n = rows.len() as f64;
    let mean = rows.iter().map(|r| r.amount).sum::<f64>() / n;
    let variance = rows.iter().map(|r| (r.amount - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();
    if std == 0.0 {
        return result;
    }
    let threshold = mean + E::ANOMALY_SIGMA * std;
    for r in rows {
        if r.amount > threshold {
            result.insert(r.sender_id.clone());
            result.insert(r.receiver_id.clone());
        }
    }
    result
}

fn account_timestamps(idx: &AccountRows, node: &str) -> Vec<DateTime<Utc>> {
    let mut ts = Vec::new();
    if let Some(rows) = idx.by_sender.get(node) {
        ts.extend(rows.iter().map(|r| r.timestamp));
    }
    if let Some(rows) = idx.by_receiver.get(node) {
        ts.extend(rows.iter().map(|r| r.timestamp));
    }
    ts.sort();
    ts
}

/// Sliding-window clustering: flags an account once any 72h window contains
/// at least TEMPORAL_TX_MIN of its transactions (sent or received).
fn detect_temporal(graph: &TransactionGraph, idx: &AccountRows) -> HashSet<String> {
    let mut result = HashSet::new();
    let window = Duration::hours(E::TEMPORAL_WINDOW_H);

    for acc in graph.nodes() {
        let ts = account_timestamps(idx, acc);
        if ts.len() < E::TEMPORAL_TX_MIN {
            continue;
        }
        let mut left = 0usize;
        for right in 0..ts.len() {
            while ts[right] - ts[left] > window {
                left += 1;
            }
            if right - left + 1 >= E::TEMPORAL_TX_MIN {
                result.insert(acc.clone());
                break;
            }
        }
    }

    result
}

/// Scans each account's sorted activity for the first burst of
/// DORMANCY_MIN_TXN transactions packed within DORMANCY_ACTIVE_H, followed
/// by DORMANCY_SILENT_H or more of silence (measured to the next
/// transaction, or to the dataset's global max timestamp if there is none).
/// Stops at the first qualifying burst rather than searching for the most
/// extreme one.
fn detect_rapid_dormancy(
    graph: &TransactionGraph,
    idx: &AccountRows,
    global_max_ts: DateTime<Utc>,
) -> HashSet<String> {
    let mut result = HashSet::new();
    let active = Duration::hours(E::DORMANCY_ACTIVE_H);
    let silent = Duration::hours(E::DORMANCY_SILENT_H);

    for acc in graph.nodes() {
        let ts = account_timestamps(idx, acc);
        if ts.len() < E::DORMANCY_MIN_TXN {
            continue;
        }
        let n = ts.len();
        for i in 0..=(n - E::DORMANCY_MIN_TXN) {
            let burst_end = i + E::DORMANCY_MIN_TXN - 1;
            if ts[burst_end] - ts[i] > active {
                continue;
            }
            let gap = match ts.get(burst_end + 1) {
                Some(next) => *next - ts[burst_end],
                None => global_max_ts - ts[burst_end],
            };
            if gap >= silent {
                result.insert(acc.clone());
                break;
            }
        }
    }

    result
}

/// Untimestamped branch: a node with in-degree >= SMURF_MIN_SOURCES and
/// out-degree <= 1 whose distinct senders also number >= SMURF_MIN_SOURCES.
/// Timestamped branch additionally requires that many distinct senders land
/// within a single SMURF_WINDOW_H window.
fn detect_smurfing(
    graph: &TransactionGraph,
    idx: &AccountRows,
    has_timestamps: bool,
) -> (HashSet<String>, HashSet<String>) {
    let mut hubs = HashSet::new();
    let mut sources = HashSet::new();

    if !has_timestamps {
        for node in graph.nodes() {
            if graph.in_degree(node) < E::SMURF_MIN_SOURCES || graph.out_degree(node) > 1 {
                continue;
            }
            let Some(rows) = idx.by_receiver.get(node.as_str()) else {
                continue;
            };
            let senders: HashSet<&str> = rows.iter().map(|r| r.sender_id.as_str()).collect();
            if senders.len() >= E::SMURF_MIN_SOURCES {
                hubs.insert(node.clone());
                sources.extend(senders.into_iter().map(|s| s.to_string()));
            }
        }
        return (hubs, sources);
    }

    let window = Duration::hours(E::SMURF_WINDOW_H);
    for node in graph.nodes() {
        if graph.in_degree(node) < E::SMURF_MIN_SOURCES || graph.out_degree(node) > 1 {
            continue;
        }
        let Some(rows) = idx.by_receiver.get(node.as_str()) else {
            continue;
        };
        if rows.len() < E::SMURF_MIN_SOURCES {
            continue;
        }
        let mut inbound: Vec<&RawTransaction> = rows.clone();
        inbound.sort_by_key(|r| r.timestamp);

        let mut left = 0usize;
        for right in 0..inbound.len() {
            while inbound[right].timestamp - inbound[left].timestamp > window {
                left += 1;
            }
            let unique: HashSet<&str> = inbound[left..=right]
                .iter()
                .map(|r| r.sender_id.as_str())
                .collect();
            if unique.len() >= E::SMURF_MIN_SOURCES {
                hubs.insert(node.clone());
                let all_senders: HashSet<&str> =
                    inbound.iter().map(|r| r.sender_id.as_str()).collect();
                sources.extend(all_senders.into_iter().map(|s| s.to_string()));
                break;
            }
        }
    }

    (hubs, sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(sender: &str, receiver: &str, amount: f64, hour: i64) -> RawTransaction {
        RawTransaction {
            transaction_id: format!("{sender}-{receiver}-{hour}"),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
        }
    }

    #[test]
    fn detects_a_triangle_cycle() {
        let rows = vec![
            row("A", "B", 100.0, 0),
            row("B", "C", 100.0, 1),
            row("C", "A", 100.0, 2),
        ];
        let graph = TransactionGraph::build(&rows);
        let cycles = detect_cycles(&graph);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);
    }

    #[test]
    fn no_cycle_in_acyclic_graph() {
        let rows = vec![row("A", "B", 100.0, 0), row("B", "C", 100.0, 1)];
        let graph = TransactionGraph::build(&rows);
        assert!(detect_cycles(&graph).is_empty());
    }

    #[test]
    fn detects_a_five_node_cycle_at_the_length_bound() {
        let rows = vec![
            row("A", "B", 100.0, 0),
            row("B", "C", 100.0, 1),
            row("C", "D", 100.0, 2),
            row("D", "E", 100.0, 3),
            row("E", "A", 100.0, 4),
        ];
        let graph = TransactionGraph::build(&rows);
        let cycles = detect_cycles(&graph);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 5);
    }

    #[test]
    fn reciprocal_direction_cycles_over_same_nodes_count_once() {
        let rows = vec![
            row("A", "B", 100.0, 0),
            row("B", "C", 100.0, 1),
            row("C", "A", 100.0, 2),
            row("A", "C", 100.0, 3),
            row("C", "B", 100.0, 4),
            row("B", "A", 100.0, 5),
        ];
        let graph = TransactionGraph::build(&rows);
        let cycles = detect_cycles(&graph);
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn fan_in_flags_high_in_degree_node() {
        let rows: Vec<RawTransaction> = (0..10)
            .map(|i| row(&format!("S{i}"), "HUB", 10.0, i))
            .collect();
        let graph = TransactionGraph::build(&rows);
        assert!(detect_fan_in(&graph).contains("HUB"));
    }

    #[test]
    fn passthrough_flags_near_full_forwarding() {
        let rows = vec![row("A", "SHELL", 1000.0, 0), row("SHELL", "B", 990.0, 1)];
        let graph = TransactionGraph::build(&rows);
        let agg = Aggregates::compute(&rows);
        assert!(detect_passthrough(&graph, &agg).contains("SHELL"));
    }

    #[test]
    fn round_amount_structuring_detected() {
        let rows = vec![
            row("A", "B", 10000.0, 0),
            row("A", "B", 5000.0, 1),
            row("A", "B", 20000.0, 2),
        ];
        let graph = TransactionGraph::build(&rows);
        let idx = AccountRows::build(&rows);
        assert!(detect_round_amount(&graph, &idx).contains("A"));
    }

    #[test]
    fn amount_anomaly_requires_minimum_rows() {
        let rows = vec![row("A", "B", 10.0, 0), row("A", "B", 20.0, 1)];
        assert!(detect_amount_anomaly(&rows).is_empty());
    }

    #[test]
    fn amount_anomaly_flags_outlier() {
        let mut rows: Vec<RawTransaction> = (0..8).map(|i| row("A", "B", 100.0, i)).collect();
        rows.push(row("A", "B", 100_000.0, 9));
        let flagged = detect_amount_anomaly(&rows);
        assert!(flagged.contains("A"));
        assert!(flagged.contains("B"));
    }

    #[test]
    fn smurfing_untimestamped_branch() {
        let rows: Vec<RawTransaction> = (0..6)
            .map(|i| row(&format!("S{i}"), "HUB", 10.0, i))
            .collect();
        let graph = TransactionGraph::build(&rows);
        let idx = AccountRows::build(&rows);
        let (hubs, sources) = detect_smurfing(&graph, &idx, false);
        assert!(hubs.contains("HUB"));
        assert!(sources.contains("S0"));
    }

    #[test]
    fn dormancy_flags_burst_then_silence() {
        let mut rows: Vec<RawTransaction> = (0..5).map(|i| row("A", "B", 10.0, i)).collect();
        rows.push(row("A", "B", 10.0, 24 * 30)); // ~30 days later
        let graph = TransactionGraph::build(&rows);
        let idx = AccountRows::build(&rows);
        let global_max = rows.iter().map(|r| r.timestamp).max().unwrap();
        let flagged = detect_rapid_dormancy(&graph, &idx, global_max);
        assert!(flagged.contains("A"));
    }
}
