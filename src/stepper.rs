//! Fixed-interval stepper that owns all driver progress.
//!
//! The stepper is the only writer of [`ProgressState`]. After every tick it
//! publishes a complete [`FleetSnapshot`] through a watch channel, so readers
//! only ever observe whole ticks.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::model::{DriverId, LatLng, RouteId};
use crate::planner::MovementPlan;
use crate::progress::{self, Command, Phase, ProgressMap, ProgressState};
use crate::segment::DEFAULT_STEPS;

/// What a renderer needs to draw one simulated driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverView {
    pub route_id: RouteId,
    pub position: LatLng,
    pub phase: Phase,
    pub waypoint_index: usize,
    pub waypoints: usize,
    pub collected: usize,
}

/// Immutable view of one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSnapshot {
    pub run_id: u64,
    pub tick: u64,
    pub drivers: BTreeMap<DriverId, DriverView>,
}

impl FleetSnapshot {
    pub fn position(&self, driver_id: DriverId) -> Option<LatLng> {
        self.drivers.get(&driver_id).map(|view| view.position)
    }
}

#[derive(Debug)]
pub struct Stepper {
    steps: usize,
    run_id: u64,
    tick: u64,
    plan: MovementPlan,
    progress: ProgressMap,
    publisher: watch::Sender<FleetSnapshot>,
}

impl Default for Stepper {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS)
    }
}

impl Stepper {
    pub fn new(steps: usize) -> Self {
        let (publisher, _) = watch::channel(FleetSnapshot::default());
        Self {
            steps,
            run_id: 0,
            tick: 0,
            plan: MovementPlan::default(),
            progress: ProgressMap::new(),
            publisher,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FleetSnapshot> {
        self.publisher.subscribe()
    }

    /// Installs a frozen plan for a new run, discarding any previous progress.
    pub fn start(&mut self, run_id: u64, plan: MovementPlan) {
        info!(run_id, drivers = plan.len(), "simulation run started");
        self.run_id = run_id;
        self.tick = 0;
        self.plan = plan;
        self.progress.clear();
        self.publish(BTreeMap::new());
    }

    /// Drops the plan and every progress state.
    pub fn reset(&mut self) {
        if !self.plan.is_empty() || !self.progress.is_empty() {
            debug!(run_id = self.run_id, tick = self.tick, "stepper reset");
        }
        self.tick = 0;
        self.plan = MovementPlan::default();
        self.progress.clear();
        self.publish(BTreeMap::new());
    }

    /// Advances every planned driver one step and publishes the result.
    pub fn tick(&mut self, origins: &HashMap<DriverId, LatLng>) -> Vec<Command> {
        if self.plan.is_empty() {
            return Vec::new();
        }

        let previous = std::mem::take(&mut self.progress);
        let output = progress::advance(previous, &self.plan, origins, self.steps);
        self.progress = output.progress;
        self.tick += 1;
        self.publish(output.positions);

        if !output.commands.is_empty() {
            debug!(
                run_id = self.run_id,
                tick = self.tick,
                commands = output.commands.len(),
                "tick produced commands"
            );
        }
        output.commands
    }

    fn publish(&self, positions: BTreeMap<DriverId, LatLng>) {
        let drivers = positions
            .into_iter()
            .filter_map(|(driver_id, position)| {
                let state = self.progress.get(&driver_id)?;
                let waypoints = self.plan.get(driver_id).map_or(0, |entry| entry.len());
                Some((
                    driver_id,
                    DriverView {
                        route_id: state.route_id(),
                        position,
                        phase: state.phase(),
                        waypoint_index: state.waypoint_index(),
                        waypoints,
                        collected: state.collected().len(),
                    },
                ))
            })
            .collect();

        self.publisher.send_replace(FleetSnapshot {
            run_id: self.run_id,
            tick: self.tick,
            drivers,
        });
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        self.publisher.borrow().clone()
    }

    pub fn plan(&self) -> &MovementPlan {
        &self.plan
    }

    pub fn progress(&self, driver_id: DriverId) -> Option<&ProgressState> {
        self.progress.get(&driver_id)
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn is_active(&self) -> bool {
        !self.plan.is_empty()
    }

    /// True once every planned driver has reached `Completed`.
    pub fn all_completed(&self) -> bool {
        self.plan
            .driver_ids()
            .all(|id| self.progress.get(&id).is_some_and(ProgressState::is_completed))
    }
}
