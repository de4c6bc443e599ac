//! Account-relationship graph analysis.
//!
//! Builds a directed adjacency structure over account pairs and detects
//! circular money flows (layering loops). The whole-graph scan runs once
//! per ingested transaction over the full current link set, so cycle
//! detection is iterative rather than recursive to keep the call stack
//! bounded on large graphs.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

pub type Adjacency = HashMap<String, Vec<String>>;

/// Summary of a graph, as exposed to the reporting boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub has_cycle: bool,
}

/// Build a directed adjacency list from account-link pairs. One direction
/// per input pair; callers that need both directions supply both.
pub fn build_graph(edges: &[(String, String)]) -> Adjacency {
    let mut graph: Adjacency = HashMap::new();
    for (a, b) in edges {
        graph.entry(a.clone()).or_default().push(b.clone());
    }
    graph
}

/// Whether the directed graph contains any cycle of any length.
///
/// Iterative DFS: an explicit stack of (node, next-neighbor-index) frames,
/// a globally-visited set, and an on-current-path set. A neighbor found on
/// the current path closes a cycle; a neighbor that is globally visited
/// but off the path was already proven acyclic and is skipped.
pub fn has_cycle(graph: &Adjacency) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_path: HashSet<&str> = HashSet::new();

    for start in graph.keys() {
        if visited.contains(start.as_str()) {
            continue;
        }

        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
        visited.insert(start.as_str());
        on_path.insert(start.as_str());

        while let Some(&(node, next)) = stack.last() {
            let neighbors = graph.get(node).map(Vec::as_slice).unwrap_or(&[]);
            match neighbors.get(next) {
                Some(neighbor) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }
                    if on_path.contains(neighbor.as_str()) {
                        return true;
                    }
                    if !visited.contains(neighbor.as_str()) {
                        visited.insert(neighbor.as_str());
                        on_path.insert(neighbor.as_str());
                        stack.push((neighbor.as_str(), 0));
                    }
                }
                None => {
                    on_path.remove(node);
                    stack.pop();
                }
            }
        }
    }

    false
}

/// Whole-graph money-loop scan over the current link set.
pub fn check_money_loop(edges: &[(String, String)]) -> bool {
    has_cycle(&build_graph(edges))
}

pub fn stats(edges: &[(String, String)]) -> GraphStats {
    let graph = build_graph(edges);
    let mut nodes: HashSet<&str> = HashSet::new();
    for (a, b) in edges {
        nodes.insert(a.as_str());
        nodes.insert(b.as_str());
    }
    GraphStats {
        nodes: nodes.len(),
        edges: edges.len(),
        has_cycle: has_cycle(&graph),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn triangle_is_a_loop() {
        assert!(check_money_loop(&edges(&[("A", "B"), ("B", "C"), ("C", "A")])));
    }

    #[test]
    fn open_chain_is_not() {
        assert!(!check_money_loop(&edges(&[("A", "B"), ("B", "C")])));
    }

    #[test]
    fn self_transfer_is_a_loop() {
        assert!(check_money_loop(&edges(&[("A", "A")])));
    }

    #[test]
    fn two_node_round_trip() {
        assert!(check_money_loop(&edges(&[("A", "B"), ("B", "A")])));
    }

    #[test]
    fn diamond_without_back_edge() {
        // Two routes to D, no way back: a DAG, not a loop
        assert!(!check_money_loop(&edges(&[
            ("A", "B"),
            ("A", "C"),
            ("B", "D"),
            ("C", "D"),
        ])));
    }

    #[test]
    fn cycle_in_disconnected_component() {
        assert!(check_money_loop(&edges(&[
            ("A", "B"),
            ("X", "Y"),
            ("Y", "Z"),
            ("Z", "X"),
        ])));
    }

    #[test]
    fn revisited_acyclic_node_is_skipped() {
        // B is reachable from both A and C; visiting it twice must not
        // be mistaken for a cycle
        assert!(!check_money_loop(&edges(&[("A", "B"), ("C", "B"), ("B", "D")])));
    }

    #[test]
    fn long_chain_does_not_overflow() {
        // Would blow the stack with a recursive DFS
        let mut pairs = Vec::new();
        for i in 0..200_000 {
            pairs.push((format!("n{i}"), format!("n{}", i + 1)));
        }
        assert!(!check_money_loop(&pairs));

        pairs.push(("n200000".to_string(), "n0".to_string()));
        assert!(check_money_loop(&pairs));
    }

    #[test]
    fn stats_summarize_graph() {
        let s = stats(&edges(&[("A", "B"), ("B", "C"), ("C", "A")]));
        assert_eq!(s.nodes, 3);
        assert_eq!(s.edges, 3);
        assert!(s.has_cycle);
    }
}
