//! Run plans: which units are visited, in which order, with which
//! engine operations.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::engine::Operation;

use super::discovery::{Unit, UnitGroup};

/// A user-facing action applied to every unit of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Dry-run diff.
    Preview,
    /// Refresh, then apply.
    Up,
    /// Tear down.
    Destroy,
}

impl Action {
    /// Label used in the per-unit header.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Preview => "PREVIEW",
            Self::Up => "CREATE",
            Self::Destroy => "DESTROY",
        }
    }

    /// Engine operations run for each unit, in order.
    #[must_use]
    pub const fn operations(self) -> &'static [Operation] {
        match self {
            Self::Preview => &[Operation::Preview],
            Self::Up => &[Operation::Refresh, Operation::Up],
            Self::Destroy => &[Operation::Destroy],
        }
    }

    /// Whether unit programs are rendered before the engine runs.
    #[must_use]
    pub const fn renders_program(self) -> bool {
        !matches!(self, Self::Destroy)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preview => f.write_str("preview"),
            Self::Up => f.write_str("up"),
            Self::Destroy => f.write_str("destroy"),
        }
    }
}

/// Ordered units for one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Action applied to every unit.
    pub action: Action,
    /// Target stack.
    pub stack: String,
    /// Units in visiting order.
    pub units: Vec<Unit>,
}

impl RunPlan {
    /// Orders discovered units for an action.
    ///
    /// Infrastructure precedes applications, except on destroy where
    /// applications are torn down first. `infra_only` drops applications
    /// from preview and up and has no effect on destroy.
    #[must_use]
    pub fn new(action: Action, stack: impl Into<String>, units: Vec<Unit>, infra_only: bool) -> Self {
        let (infra, apps): (Vec<Unit>, Vec<Unit>) =
            units.into_iter().partition(|unit| unit.group == UnitGroup::Infra);

        let units = match action {
            Action::Destroy => {
                if infra_only {
                    warn!("--infra-only is ignored on destroy");
                }
                apps.into_iter().chain(infra).collect()
            }
            Action::Preview | Action::Up if infra_only => infra,
            Action::Preview | Action::Up => infra.into_iter().chain(apps).collect(),
        };

        Self {
            action,
            stack: stack.into(),
            units,
        }
    }

    /// Returns true if the plan visits no unit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Builds the header announcing an action on a unit directory.
///
/// The message is framed by dashes of the same length.
#[must_use]
pub fn make_header(label: &str, workspace: &str) -> String {
    let message = format!("{label} on workspace {workspace}");
    let separator = "-".repeat(message.chars().count());
    format!("\n{separator}\n{message}\n{separator}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unit(relative: &str) -> Unit {
        Unit {
            path: PathBuf::from("/srv/iac").join(relative),
            relative: relative.to_string(),
            group: if relative.starts_with("infra/") {
                UnitGroup::Infra
            } else {
                UnitGroup::App
            },
        }
    }

    fn units() -> Vec<Unit> {
        vec![unit("app/c"), unit("infra/a"), unit("infra/b")]
    }

    fn order(plan: &RunPlan) -> Vec<&str> {
        plan.units.iter().map(|u| u.relative.as_str()).collect()
    }

    #[test]
    fn test_up_visits_infra_first() {
        let plan = RunPlan::new(Action::Up, "dev", units(), false);
        assert_eq!(order(&plan), vec!["infra/a", "infra/b", "app/c"]);
    }

    #[test]
    fn test_destroy_visits_apps_first() {
        let plan = RunPlan::new(Action::Destroy, "dev", units(), false);
        assert_eq!(order(&plan), vec!["app/c", "infra/a", "infra/b"]);

        let plan = RunPlan::new(Action::Destroy, "dev", units(), true);
        assert_eq!(order(&plan), vec!["app/c", "infra/a", "infra/b"]);
    }

    #[test]
    fn test_infra_only() {
        let plan = RunPlan::new(Action::Preview, "dev", units(), true);
        assert_eq!(order(&plan), vec!["infra/a", "infra/b"]);
    }

    #[test]
    fn test_action_operations() {
        assert_eq!(Action::Up.operations(), &[Operation::Refresh, Operation::Up]);
        assert_eq!(Action::Preview.operations(), &[Operation::Preview]);
        assert!(!Action::Destroy.renders_program());
        assert_eq!(Action::Up.label(), "CREATE");
    }

    #[test]
    fn test_header() {
        let header = make_header("PREVIEW", "/srv/iac/infra/network");
        let lines: Vec<&str> = header.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[2], "PREVIEW on workspace /srv/iac/infra/network");
        assert_eq!(lines[1], "-".repeat(lines[2].len()));
        assert_eq!(lines[3], lines[1]);
        assert!(header.ends_with('\n'));
    }
}
