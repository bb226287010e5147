//! Run reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StackyardError;

use super::discovery::{Unit, UnitGroup};
use super::plan::Action;

/// Outcome of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOutcome {
    /// All operations succeeded.
    Succeeded,
    /// An operation failed.
    Failed,
    /// Not attempted because an earlier unit failed.
    Skipped,
}

/// Result of one unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    /// Unit path relative to the project root.
    pub unit: String,
    /// Deployment group.
    pub group: UnitGroup,
    /// Outcome.
    pub outcome: UnitOutcome,
    /// When work on the unit started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Elapsed milliseconds.
    pub duration_ms: u64,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UnitReport {
    pub(crate) fn skipped(unit: &Unit) -> Self {
        Self {
            unit: unit.relative.clone(),
            group: unit.group,
            outcome: UnitOutcome::Skipped,
            started_at: None,
            duration_ms: 0,
            error: None,
        }
    }
}

/// Result of a whole run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Action applied.
    pub action: Action,
    /// Target stack.
    pub stack: String,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: DateTime<Utc>,
    /// Per-unit results in visiting order.
    pub units: Vec<UnitReport>,
    /// The error that stopped the run.
    #[serde(skip)]
    pub failure: Option<StackyardError>,
}

impl RunReport {
    /// Returns true if no unit failed.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// Counts units with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: UnitOutcome) -> usize {
        self.units.iter().filter(|u| u.outcome == outcome).count()
    }

    /// Process exit code; the engine's status when it failed.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.failure.as_ref().map_or(0, StackyardError::exit_code)
    }
}
