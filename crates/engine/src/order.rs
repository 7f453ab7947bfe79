//! Migration order resolution — Kahn's algorithm with a deterministic
//! tie-break.
//!
//! Sheets with in-degree zero (pure providers) are dequeued first; among
//! equally-ready sheets the one seen earliest in the inventory wins, so
//! identical input always yields an identical order. Whatever cannot be
//! ordered is grouped into cyclic clusters and reported, never silently
//! ordered.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use crate::graph::DependencyGraph;
use crate::models::SheetName;

/// Resolver output: the processing sequence plus anything cyclic.
#[derive(Debug, Clone)]
pub struct MigrationOrder {
    /// Acyclic prefix — every provider strictly precedes its dependents.
    pub order: Vec<SheetName>,
    /// One set per cyclic cluster: the cycle's members together with any
    /// sheets stranded behind it. The union of `order` and all cycle
    /// sets covers every node exactly once.
    pub cycles: Vec<BTreeSet<SheetName>>,
}

impl MigrationOrder {
    pub fn is_acyclic(&self) -> bool {
        self.cycles.is_empty()
    }
}

/// Resolve the processing order for the graph.
pub fn resolve(graph: &DependencyGraph) -> MigrationOrder {
    let nodes = graph.nodes();
    let index_of: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; nodes.len()];

    for (provider, dependent) in graph.edges() {
        let p = index_of[provider];
        let d = index_of[dependent];
        adjacency[p].push(d);
        in_degree[d] += 1;
    }

    // Min-heap over inventory position: the tie-break is "first seen
    // wins", which makes the order reproducible for identical input.
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order: Vec<SheetName> = Vec::with_capacity(nodes.len());
    let mut placed = vec![false; nodes.len()];

    while let Some(Reverse(i)) = ready.pop() {
        placed[i] = true;
        order.push(nodes[i].clone());
        for &d in &adjacency[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.push(Reverse(d));
            }
        }
    }

    let cycles = leftover_clusters(nodes, &adjacency, &placed);
    MigrationOrder { order, cycles }
}

/// Group the unplaced nodes into weakly-connected clusters of the
/// leftover subgraph: each cluster is a cyclic core plus the sheets
/// stranded behind it.
fn leftover_clusters(
    nodes: &[SheetName],
    adjacency: &[Vec<usize>],
    placed: &[bool],
) -> Vec<BTreeSet<SheetName>> {
    // Undirected adjacency restricted to leftover nodes.
    let mut undirected: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (from, targets) in adjacency.iter().enumerate() {
        if placed[from] {
            continue;
        }
        for &to in targets {
            if !placed[to] {
                undirected[from].push(to);
                undirected[to].push(from);
            }
        }
    }

    let mut visited = placed.to_vec();
    let mut clusters = Vec::new();

    for start in 0..nodes.len() {
        if visited[start] {
            continue;
        }
        let mut cluster = BTreeSet::new();
        let mut stack = vec![start];
        visited[start] = true;
        while let Some(i) = stack.pop() {
            cluster.insert(nodes[i].clone());
            for &j in &undirected[i] {
                if !visited[j] {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }
        clusters.push(cluster);
    }

    clusters
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReferenceEdge, SheetInventory, SheetMeta};

    fn inventory(sheets: &[&str], deps: &[(&str, &str)]) -> SheetInventory {
        SheetInventory {
            sheets: sheets
                .iter()
                .map(|name| SheetMeta {
                    name: name.to_string(),
                    row_count: 5,
                    col_count: 2,
                })
                .collect(),
            dependencies: deps
                .iter()
                .map(|(from, to)| ReferenceEdge {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
        }
    }

    fn resolve_inventory(sheets: &[&str], deps: &[(&str, &str)]) -> MigrationOrder {
        let graph = DependencyGraph::build(&inventory(sheets, deps)).expect("valid");
        resolve(&graph)
    }

    #[test]
    fn providers_precede_dependents() {
        // c reads b, b reads a.
        let resolved = resolve_inventory(&["c", "b", "a"], &[("c", "b"), ("b", "a")]);
        assert_eq!(resolved.order, vec!["a", "b", "c"]);
        assert!(resolved.is_acyclic());
    }

    #[test]
    fn tie_break_is_first_seen_inventory_order() {
        // No edges at all: order must equal inventory order exactly.
        let resolved = resolve_inventory(&["zulu", "alpha", "mike"], &[]);
        assert_eq!(resolved.order, vec!["zulu", "alpha", "mike"]);

        // Diamond: b and c are ready together after a; b was seen first.
        let resolved = resolve_inventory(
            &["a", "b", "c", "d"],
            &[("b", "a"), ("c", "a"), ("d", "b"), ("d", "c")],
        );
        assert_eq!(resolved.order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn cycle_yields_prefix_plus_cluster() {
        // a stands alone; b and c read each other; d reads c.
        let resolved = resolve_inventory(
            &["a", "b", "c", "d"],
            &[("b", "c"), ("c", "b"), ("d", "c")],
        );
        assert_eq!(resolved.order, vec!["a"]);
        assert_eq!(resolved.cycles.len(), 1);
        let cluster: Vec<&str> = resolved.cycles[0].iter().map(String::as_str).collect();
        assert_eq!(cluster, vec!["b", "c", "d"], "the stranded 'd' joins its cycle");
    }

    #[test]
    fn prefix_and_cycles_cover_all_nodes_exactly_once() {
        let resolved = resolve_inventory(
            &["a", "b", "c", "d", "e"],
            &[("b", "a"), ("c", "d"), ("d", "c"), ("e", "e")],
        );

        let mut seen: Vec<&str> = resolved.order.iter().map(String::as_str).collect();
        for cluster in &resolved.cycles {
            seen.extend(cluster.iter().map(String::as_str));
        }
        seen.sort_unstable();
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn independent_cycles_form_separate_clusters() {
        let resolved = resolve_inventory(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "a"), ("c", "d"), ("d", "c")],
        );
        assert!(resolved.order.is_empty());
        assert_eq!(resolved.cycles.len(), 2);
    }

    #[test]
    fn self_reference_is_a_one_node_cycle() {
        let resolved = resolve_inventory(&["a", "b"], &[("a", "a")]);
        assert_eq!(resolved.order, vec!["b"]);
        assert_eq!(resolved.cycles.len(), 1);
        assert!(resolved.cycles[0].contains("a"));
    }

    #[test]
    fn empty_graph_resolves_to_nothing() {
        let resolved = resolve_inventory(&[], &[]);
        assert!(resolved.order.is_empty());
        assert!(resolved.cycles.is_empty());
    }
}
