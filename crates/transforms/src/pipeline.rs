//! Pipeline assembly — canonical step ordering over a user-selected subset.
//!
//! Users select steps as an unordered set; the pipeline always runs them in
//! one fixed canonical order so that, combined with the per-step idempotence
//! contract, every selection of the same steps behaves identically.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cell::Rows;
use crate::error::TransformError;
use crate::steps;
use crate::traits::{Transform, TransformContext};

/// The built-in preprocessing steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    Validate,
    StandardizeNaming,
    RemoveEmptyRows,
    RemoveEmptyColumns,
    RemoveDuplicates,
    FlattenFormulas,
    RemapReferences,
}

/// Which half of a sheet's lifecycle a step runs in.
///
/// Cleaning steps run on the rows read from the source, before the first
/// write. Formula steps run after the raw copy, once the destination's
/// sheet set exists, and may trigger a rewrite of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Cleaning,
    Formula,
}

impl TransformKind {
    /// Every step, in canonical execution order.
    pub const CANONICAL_ORDER: [TransformKind; 7] = [
        TransformKind::Validate,
        TransformKind::StandardizeNaming,
        TransformKind::RemoveEmptyRows,
        TransformKind::RemoveEmptyColumns,
        TransformKind::RemoveDuplicates,
        TransformKind::FlattenFormulas,
        TransformKind::RemapReferences,
    ];

    /// Position of this step within [`Self::CANONICAL_ORDER`].
    fn canonical_rank(self) -> usize {
        Self::CANONICAL_ORDER
            .iter()
            .position(|k| *k == self)
            .unwrap_or(usize::MAX)
    }

    pub fn phase(self) -> Phase {
        match self {
            Self::FlattenFormulas | Self::RemapReferences => Phase::Formula,
            _ => Phase::Cleaning,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::StandardizeNaming => "standardize-naming",
            Self::RemoveEmptyRows => "remove-empty-rows",
            Self::RemoveEmptyColumns => "remove-empty-columns",
            Self::RemoveDuplicates => "remove-duplicates",
            Self::FlattenFormulas => "flatten-formulas",
            Self::RemapReferences => "remap-references",
        }
    }

    fn instantiate(self) -> Box<dyn Transform> {
        match self {
            Self::Validate => Box::new(steps::validate::Validate),
            Self::StandardizeNaming => Box::new(steps::naming::StandardizeNaming),
            Self::RemoveEmptyRows => Box::new(steps::prune::RemoveEmptyRows),
            Self::RemoveEmptyColumns => Box::new(steps::prune::RemoveEmptyColumns),
            Self::RemoveDuplicates => Box::new(steps::duplicates::RemoveDuplicates),
            Self::FlattenFormulas => Box::new(steps::formulas::FlattenFormulas),
            Self::RemapReferences => Box::new(steps::formulas::RemapReferences),
        }
    }
}

impl std::fmt::Display for TransformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::CANONICAL_ORDER
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown transform: {s}"))
    }
}

/// An ordered list of instantiated steps.
pub struct Pipeline {
    steps: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    /// Build a pipeline from a user-selected subset of steps.
    ///
    /// The selection is deduplicated and re-sorted into canonical order;
    /// the order the caller lists steps in carries no meaning.
    pub fn from_kinds(kinds: &[TransformKind]) -> Self {
        let mut selected: Vec<TransformKind> = Vec::new();
        for kind in kinds {
            if !selected.contains(kind) {
                selected.push(*kind);
            }
        }
        selected.sort_by_key(|k| k.canonical_rank());

        Self {
            steps: selected.into_iter().map(TransformKind::instantiate).collect(),
        }
    }

    /// The selected steps in execution order.
    pub fn kinds(&self) -> Vec<TransformKind> {
        self.steps.iter().map(|s| s.kind()).collect()
    }

    /// Whether any selected step belongs to `phase`.
    pub fn has_phase(&self, phase: Phase) -> bool {
        self.steps.iter().any(|s| s.kind().phase() == phase)
    }

    /// Run every selected step of the given phase, in canonical order.
    pub fn run_phase(
        &self,
        phase: Phase,
        mut rows: Rows,
        ctx: &TransformContext,
    ) -> Result<Rows, TransformError> {
        for step in &self.steps {
            if step.kind().phase() != phase {
                continue;
            }
            let before = rows.len();
            rows = step.apply(rows, ctx)?;
            debug!(
                step = step.kind().as_str(),
                sheet = %ctx.sheet,
                rows_before = before,
                rows_after = rows.len(),
                "transform step applied"
            );
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    fn ctx() -> TransformContext {
        TransformContext {
            sheet: "data".into(),
            sheet_names: vec!["data".into()],
        }
    }

    #[test]
    fn selection_is_deduplicated_and_canonically_ordered() {
        let pipeline = Pipeline::from_kinds(&[
            TransformKind::RemoveDuplicates,
            TransformKind::Validate,
            TransformKind::RemoveDuplicates,
            TransformKind::StandardizeNaming,
        ]);
        assert_eq!(
            pipeline.kinds(),
            vec![
                TransformKind::Validate,
                TransformKind::StandardizeNaming,
                TransformKind::RemoveDuplicates,
            ]
        );
    }

    #[test]
    fn permutations_of_a_selection_produce_identical_output() {
        let rows = vec![
            vec![Cell::text("Col A"), Cell::text("Col B")],
            vec![Cell::text("x"), Cell::text("1")],
            vec![Cell::Empty, Cell::Empty],
            vec![Cell::text("x"), Cell::text("1")],
        ];

        let selection = [
            TransformKind::RemoveDuplicates,
            TransformKind::RemoveEmptyRows,
            TransformKind::StandardizeNaming,
        ];

        let forward = Pipeline::from_kinds(&selection)
            .run_phase(Phase::Cleaning, rows.clone(), &ctx())
            .expect("forward");

        let mut reversed_selection = selection;
        reversed_selection.reverse();
        let reversed = Pipeline::from_kinds(&reversed_selection)
            .run_phase(Phase::Cleaning, rows, &ctx())
            .expect("reversed");

        assert_eq!(forward, reversed);
        // One data row survives: blanks and the duplicate are gone.
        assert_eq!(forward.len(), 2);
        assert_eq!(forward[0], vec![Cell::text("col_a"), Cell::text("col_b")]);
    }

    #[test]
    fn phases_partition_the_canonical_order() {
        let all = Pipeline::from_kinds(&TransformKind::CANONICAL_ORDER);
        assert!(all.has_phase(Phase::Cleaning));
        assert!(all.has_phase(Phase::Formula));

        let cleaning_only = Pipeline::from_kinds(&[TransformKind::RemoveEmptyRows]);
        assert!(!cleaning_only.has_phase(Phase::Formula));
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in TransformKind::CANONICAL_ORDER {
            let parsed: TransformKind = kind.as_str().parse().expect("parse");
            assert_eq!(parsed, kind);
        }
        assert!("shuffle-rows".parse::<TransformKind>().is_err());
    }
}
