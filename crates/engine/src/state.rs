//! Per-sheet lifecycle tracking.
//!
//! The transition table:
//!
//! ```text
//! pending ──► preprocessing ──► copying ──► transforming ──► validating ──► completed
//!    │
//!    ├──► skipped          (cyclic sheet, blocked dependency, aborted run)
//!    └──► failed           (every non-terminal state may fail)
//! ```
//!
//! Terminal states are final for a run; a retry resets the sheet back to
//! `pending` through [`SheetMigrationState::reset_for_retry`] rather than
//! through the transition table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Lifecycle states of a single sheet within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetStatus {
    Pending,
    Preprocessing,
    Copying,
    Transforming,
    Validating,
    Completed,
    Failed,
    Skipped,
}

impl SheetStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Whether the transition `self → to` is allowed.
    pub fn can_transition(self, to: Self) -> bool {
        use SheetStatus::*;
        match (self, to) {
            // The happy path, one hop at a time.
            (Pending, Preprocessing)
            | (Preprocessing, Copying)
            | (Copying, Transforming)
            | (Transforming, Validating)
            | (Validating, Completed) => true,
            // Policy skips happen before any work starts.
            (Pending, Skipped) => true,
            // Any in-flight state may fail.
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Coarse progress figure reported to observers.
    fn progress(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Preprocessing => Some(20),
            Self::Copying => Some(45),
            Self::Transforming => Some(70),
            Self::Validating => Some(85),
            Self::Completed => Some(100),
            // Failed/skipped sheets keep the progress they reached.
            Self::Failed | Self::Skipped => None,
        }
    }
}

impl std::fmt::Display for SheetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Preprocessing => "preprocessing",
            Self::Copying => "copying",
            Self::Transforming => "transforming",
            Self::Validating => "validating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Machine-readable cause of a sheet failure, for targeted retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetErrorCode {
    /// A transform step rejected the data.
    Preprocessing,
    /// A sheet store call failed.
    Write,
    /// Post-write row/column counts disagreed with the pipeline output.
    ValidationMismatch,
}

/// Why a sheet landed in `skipped`. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The sheet sits in (or behind) a reference cycle.
    Cyclic,
    /// A direct provider failed or was skipped.
    BlockedDependency,
    /// The run stopped early (`continue_on_failure = false`).
    RunAborted,
}

/// The recorded failure of one sheet attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetError {
    pub code: SheetErrorCode,
    pub message: String,
}

/// Lifecycle record of one sheet within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetMigrationState {
    pub name: String,
    pub status: SheetStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SheetError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SheetMigrationState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: SheetStatus::Pending,
            progress: 0,
            error: None,
            skip_reason: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Transition-validating setter: rejects anything outside the table.
    pub fn transition(&mut self, to: SheetStatus) -> Result<(), EngineError> {
        if !self.status.can_transition(to) {
            return Err(EngineError::InvalidTransition {
                sheet: self.name.clone(),
                from: self.status,
                to,
            });
        }

        if self.status == SheetStatus::Pending && !to.is_terminal() {
            self.started_at = Some(Utc::now());
        }
        if to.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        if let Some(progress) = to.progress() {
            self.progress = progress;
        }
        self.status = to;
        Ok(())
    }

    /// Record a failure: transition to `failed` and attach the cause.
    pub fn fail(
        &mut self,
        code: SheetErrorCode,
        message: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.transition(SheetStatus::Failed)?;
        self.error = Some(SheetError {
            code,
            message: message.into(),
        });
        Ok(())
    }

    /// Skip the sheet without attempting it.
    pub fn skip(&mut self, reason: SkipReason) -> Result<(), EngineError> {
        self.transition(SheetStatus::Skipped)?;
        self.skip_reason = Some(reason);
        Ok(())
    }

    /// Open a fresh attempt: only `failed` and `skipped` sheets may be
    /// retried; everything the previous attempt recorded is discarded.
    pub fn reset_for_retry(&mut self) -> Result<(), EngineError> {
        if !matches!(self.status, SheetStatus::Failed | SheetStatus::Skipped) {
            return Err(EngineError::RetryNotAllowed {
                sheet: self.name.clone(),
                status: self.status,
            });
        }
        *self = Self::new(std::mem::take(&mut self.name));
        Ok(())
    }
}
