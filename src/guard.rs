//! Reconciliation between the local run and polled route state.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::info;

use crate::model::{RouteId, RouteSnapshot, RouteStatus};
use crate::planner::MovementPlan;

/// Why a run was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// A poll showed no in-progress route on the run's date.
    NothingInProgress,
    /// The operator asked for a new plan.
    Regenerated,
    /// The operator stopped the run, or a new run replaced it.
    Deactivated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Halt(HaltReason),
}

/// Decides, from polled routes, whether an active run must stop.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationGuard {
    date: Option<NaiveDate>,
    planned: HashSet<RouteId>,
}

impl ReconciliationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the guard for a run over `plan` on `date`.
    pub fn arm(&mut self, date: Option<NaiveDate>, plan: &MovementPlan) {
        self.date = date;
        self.planned = plan.route_ids().collect();
    }

    pub fn disarm(&mut self) {
        self.planned.clear();
    }

    /// Halts whenever no polled route for the run's date is in progress,
    /// whatever the cause.
    pub fn review(&self, run_active: bool, routes: &[RouteSnapshot]) -> Verdict {
        if !run_active {
            return Verdict::Continue;
        }

        let mut any_in_progress = false;
        for route in routes.iter().filter(|route| route.on_date(self.date)) {
            match route.status {
                RouteStatus::InProgress => any_in_progress = true,
                RouteStatus::Completed if self.planned.contains(&route.id) => {
                    info!(route_id = route.id, "backend reports planned route completed");
                }
                _ => {}
            }
        }

        if any_in_progress {
            Verdict::Continue
        } else {
            Verdict::Halt(HaltReason::NothingInProgress)
        }
    }
}
