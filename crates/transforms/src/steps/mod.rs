//! Built-in transform steps.
//!
//! Every step here is idempotent: applying it twice yields the same rows
//! as applying it once. The per-step tests assert exactly that.

pub mod duplicates;
pub mod formulas;
pub mod naming;
pub mod prune;
pub mod validate;
