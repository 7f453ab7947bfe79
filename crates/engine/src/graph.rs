//! Dependency graph construction — run this before resolving an order.
//!
//! Rules enforced:
//! 1. Sheet names must be unique within the inventory.
//! 2. Every dependency edge must reference sheets that exist.
//! 3. Edge direction is normalized to `(provider, dependent)` and
//!    repeated edges deduplicate.
//!
//! Cycles are *not* rejected here; the order resolver detects and
//! reports them.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{SheetInventory, SheetName};

/// A directed graph over sheet names.
///
/// Nodes keep first-seen inventory order, which the resolver uses as its
/// deterministic tie-break. Edges point from data producer to data
/// consumer — the order the migration must respect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: Vec<SheetName>,
    edges: BTreeSet<(SheetName, SheetName)>,
}

impl DependencyGraph {
    /// Build the graph from the analyzer's inventory.
    ///
    /// # Errors
    /// - [`EngineError::DuplicateSheet`] if two sheets share a name.
    /// - [`EngineError::UnknownSheetReference`] if an edge references a
    ///   sheet missing from the inventory.
    pub fn build(inventory: &SheetInventory) -> Result<Self, EngineError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for sheet in &inventory.sheets {
            if !seen.insert(sheet.name.as_str()) {
                return Err(EngineError::DuplicateSheet(sheet.name.clone()));
            }
        }

        for edge in &inventory.dependencies {
            if !seen.contains(edge.from.as_str()) {
                return Err(EngineError::UnknownSheetReference {
                    sheet: edge.from.clone(),
                    side: "from",
                });
            }
            if !seen.contains(edge.to.as_str()) {
                return Err(EngineError::UnknownSheetReference {
                    sheet: edge.to.clone(),
                    side: "to",
                });
            }
        }

        // `from` reads from `to`, so `to` is the provider.
        let edges: BTreeSet<(SheetName, SheetName)> = inventory
            .dependencies
            .iter()
            .map(|e| (e.to.clone(), e.from.clone()))
            .collect();

        Ok(Self {
            nodes: inventory.sheets.iter().map(|s| s.name.clone()).collect(),
            edges,
        })
    }

    /// Sheet names in first-seen inventory order.
    pub fn nodes(&self) -> &[SheetName] {
        &self.nodes
    }

    /// Deduplicated `(provider, dependent)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }

    /// Direct providers of `dependent` — the sheets it reads from.
    pub fn providers_of<'a>(&'a self, dependent: &str) -> Vec<&'a str> {
        self.edges
            .iter()
            .filter(|(_, d)| d == dependent)
            .map(|(p, _)| p.as_str())
            .collect()
    }

    /// Direct dependents of `provider` — the sheets reading from it.
    pub fn dependents_of<'a>(&'a self, provider: &str) -> Vec<&'a str> {
        self.edges
            .iter()
            .filter(|(p, _)| p == provider)
            .map(|(_, d)| d.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReferenceEdge, SheetMeta};

    fn meta(name: &str) -> SheetMeta {
        SheetMeta {
            name: name.to_string(),
            row_count: 10,
            col_count: 3,
        }
    }

    fn edge(from: &str, to: &str) -> ReferenceEdge {
        ReferenceEdge {
            from: from.into(),
            to: to.into(),
        }
    }

    #[test]
    fn edges_are_normalized_to_provider_dependent() {
        // b reads from a: a provides, b depends.
        let inventory = SheetInventory {
            sheets: vec![meta("a"), meta("b")],
            dependencies: vec![edge("b", "a")],
        };
        let graph = DependencyGraph::build(&inventory).expect("valid");
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![("a", "b")]);
        assert_eq!(graph.providers_of("b"), vec!["a"]);
        assert_eq!(graph.dependents_of("a"), vec!["b"]);
    }

    #[test]
    fn repeated_edges_deduplicate() {
        let inventory = SheetInventory {
            sheets: vec![meta("a"), meta("b")],
            dependencies: vec![edge("b", "a"), edge("b", "a"), edge("b", "a")],
        };
        let graph = DependencyGraph::build(&inventory).expect("valid");
        assert_eq!(graph.edges().count(), 1);
    }

    #[test]
    fn duplicate_sheet_name_is_rejected() {
        let inventory = SheetInventory {
            sheets: vec![meta("a"), meta("a")],
            dependencies: vec![],
        };
        assert!(matches!(
            DependencyGraph::build(&inventory),
            Err(EngineError::DuplicateSheet(name)) if name == "a"
        ));
    }

    #[test]
    fn edge_referencing_missing_sheet_is_rejected() {
        let inventory = SheetInventory {
            sheets: vec![meta("a")],
            dependencies: vec![edge("a", "ghost")],
        };
        assert!(matches!(
            DependencyGraph::build(&inventory),
            Err(EngineError::UnknownSheetReference { sheet, .. }) if sheet == "ghost"
        ));
    }

    #[test]
    fn cycles_are_accepted_at_build_time() {
        let inventory = SheetInventory {
            sheets: vec![meta("a"), meta("b")],
            dependencies: vec![edge("a", "b"), edge("b", "a")],
        };
        let graph = DependencyGraph::build(&inventory).expect("cycles are the resolver's job");
        assert_eq!(graph.edges().count(), 2);
    }

    #[test]
    fn self_reference_is_kept_as_a_one_node_cycle() {
        let inventory = SheetInventory {
            sheets: vec![meta("a")],
            dependencies: vec![edge("a", "a")],
        };
        let graph = DependencyGraph::build(&inventory).expect("valid");
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![("a", "a")]);
    }
}
