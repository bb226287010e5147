//! Deployment sequencer.
//!
//! Visits the units of a [`RunPlan`] one at a time. Each unit's program is
//! rendered (except on destroy), its stack selected and the action's engine
//! operations run. The first failure stops the run; the remaining units are
//! reported as skipped and nothing already applied is rolled back.

mod discovery;
mod plan;
mod report;

pub use discovery::{DEFAULT_EXCLUDES, Unit, UnitGroup, discover_units};
pub use plan::{Action, RunPlan, make_header};
pub use report::{RunReport, UnitOutcome, UnitReport};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use colored::Colorize;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::Result;
use crate::units::UnitRenderer;

/// Runs plans against the engine.
pub struct Sequencer {
    engine: Arc<dyn Engine>,
    renderer: Option<Arc<dyn UnitRenderer>>,
    quiet: bool,
}

impl Sequencer {
    /// Creates a sequencer that runs the engine without rendering.
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            renderer: None,
            quiet: false,
        }
    }

    /// Renders unit programs before preview and up.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn UnitRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Suppresses the per-unit headers.
    #[must_use]
    pub const fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Runs a plan and reports every unit.
    pub async fn run(&self, plan: &RunPlan) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Run {} started: {} {} units on stack {}",
            run_id,
            plan.action,
            plan.units.len(),
            plan.stack
        );

        let mut units = Vec::with_capacity(plan.units.len());
        let mut failure = None;

        for unit in &plan.units {
            if failure.is_some() {
                units.push(UnitReport::skipped(unit));
                continue;
            }

            let unit_started = Utc::now();
            let clock = Instant::now();
            let result = self.run_unit(plan, unit).await;
            let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

            let (outcome, message) = match result {
                Ok(()) => (UnitOutcome::Succeeded, None),
                Err(e) => {
                    error!("{} failed on {}: {}", plan.action, unit.relative, e);
                    let message = e.to_string();
                    failure = Some(e);
                    (UnitOutcome::Failed, Some(message))
                }
            };

            units.push(UnitReport {
                unit: unit.relative.clone(),
                group: unit.group,
                outcome,
                started_at: Some(unit_started),
                duration_ms,
                error: message,
            });
        }

        let report = RunReport {
            run_id,
            action: plan.action,
            stack: plan.stack.clone(),
            started_at,
            finished_at: Utc::now(),
            units,
            failure,
        };
        info!(
            "Run {} finished: {} succeeded, {} failed, {} skipped",
            run_id,
            report.count(UnitOutcome::Succeeded),
            report.count(UnitOutcome::Failed),
            report.count(UnitOutcome::Skipped)
        );
        report
    }

    async fn run_unit(&self, plan: &RunPlan, unit: &Unit) -> Result<()> {
        if !self.quiet {
            let header = make_header(plan.action.label(), &unit.path.display().to_string());
            println!("{}", header.bold());
        }

        if plan.action.renders_program() {
            if let Some(renderer) = &self.renderer {
                renderer.render(&unit.path, &plan.stack).await?;
            }
        }

        self.engine.select_stack(&unit.path, &plan.stack).await?;
        for operation in plan.action.operations() {
            self.engine.run(*operation, &unit.path, &plan.stack).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Operation;
    use crate::error::{EngineError, StackyardError};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    impl Journal {
        fn push(&self, entry: String) {
            self.entries.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.entries.lock().unwrap().clone()
        }
    }

    fn name(path: &Path) -> String {
        path.strip_prefix("/iac").unwrap().display().to_string()
    }

    struct RecordingEngine {
        journal: Arc<Journal>,
        fail_on: Option<(Operation, &'static str)>,
    }

    #[async_trait]
    impl Engine for RecordingEngine {
        async fn select_stack(&self, work_dir: &Path, stack: &str) -> Result<()> {
            self.journal.push(format!("select {} {stack}", name(work_dir)));
            Ok(())
        }

        async fn run(&self, operation: Operation, work_dir: &Path, _stack: &str) -> Result<()> {
            let unit = name(work_dir);
            self.journal.push(format!("{operation} {unit}"));
            if matches!(self.fail_on, Some((op, failing)) if op == operation && failing == unit) {
                return Err(EngineError::CommandFailed {
                    command: format!("pulumi {operation}"),
                    work_dir: work_dir.to_path_buf(),
                    code: Some(2),
                }
                .into());
            }
            Ok(())
        }
    }

    struct RecordingRenderer {
        journal: Arc<Journal>,
    }

    #[async_trait]
    impl UnitRenderer for RecordingRenderer {
        async fn render(&self, work_dir: &Path, stack: &str) -> Result<()> {
            self.journal.push(format!("render {} {stack}", name(work_dir)));
            Ok(())
        }
    }

    fn unit(relative: &str) -> Unit {
        Unit {
            path: PathBuf::from("/iac").join(relative),
            relative: relative.to_string(),
            group: if relative.starts_with("infra/") {
                UnitGroup::Infra
            } else {
                UnitGroup::App
            },
        }
    }

    fn sequencer(fail_on: Option<(Operation, &'static str)>) -> (Sequencer, Arc<Journal>) {
        let journal = Arc::new(Journal::default());
        let engine = RecordingEngine {
            journal: Arc::clone(&journal),
            fail_on,
        };
        let renderer = RecordingRenderer {
            journal: Arc::clone(&journal),
        };
        let sequencer = Sequencer::new(Arc::new(engine))
            .with_renderer(Arc::new(renderer))
            .with_quiet(true);
        (sequencer, journal)
    }

    fn units() -> Vec<Unit> {
        vec![unit("app/c"), unit("infra/a"), unit("infra/b")]
    }

    #[tokio::test]
    async fn test_up_renders_refreshes_and_applies_in_order() {
        let (sequencer, journal) = sequencer(None);
        let plan = RunPlan::new(Action::Up, "dev", units(), false);

        let report = sequencer.run(&plan).await;

        assert!(report.success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            journal.entries(),
            vec![
                "render infra/a dev",
                "select infra/a dev",
                "refresh infra/a",
                "up infra/a",
                "render infra/b dev",
                "select infra/b dev",
                "refresh infra/b",
                "up infra/b",
                "render app/c dev",
                "select app/c dev",
                "refresh app/c",
                "up app/c",
            ]
        );
    }

    #[tokio::test]
    async fn test_destroy_does_not_render() {
        let (sequencer, journal) = sequencer(None);
        let plan = RunPlan::new(Action::Destroy, "prod", units(), false);

        let report = sequencer.run(&plan).await;

        assert_eq!(report.count(UnitOutcome::Succeeded), 3);
        assert_eq!(
            journal.entries(),
            vec![
                "select app/c prod",
                "destroy app/c",
                "select infra/a prod",
                "destroy infra/a",
                "select infra/b prod",
                "destroy infra/b",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_stops_run() {
        let (sequencer, journal) = sequencer(Some((Operation::Up, "infra/a")));
        let plan = RunPlan::new(Action::Up, "dev", units(), false);

        let report = sequencer.run(&plan).await;

        assert!(!report.success());
        assert_eq!(report.exit_code(), 2);
        assert!(matches!(report.failure, Some(StackyardError::Engine(_))));

        let outcomes: Vec<UnitOutcome> = report.units.iter().map(|u| u.outcome).collect();
        assert_eq!(
            outcomes,
            vec![UnitOutcome::Failed, UnitOutcome::Skipped, UnitOutcome::Skipped]
        );
        assert!(report.units[0].error.is_some());
        assert!(!journal.entries().iter().any(|e| e.contains("infra/b")));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["action"], "up");
        assert_eq!(json["units"][1]["outcome"], "skipped");
        assert!(json.get("failure").is_none());
    }
}
