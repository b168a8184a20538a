//! Per-driver progress state machine.
//!
//! Each driver moves `Idle -> Travelling -> Arrived -> ... -> Completed`.
//! [`advance`] is a pure reducer: it takes the previous progress map and
//! returns the next one together with the positions to publish and the
//! backend commands the transitions produced. Nothing in here touches the
//! network.
//!
//! Departure registers the first waypoint immediately and the first segment
//! runs from the driver's origin to the second waypoint. A plan with `n`
//! waypoints therefore finishes after `(n - 1) * (steps + 1)` ticks, or after
//! one tick when `n == 1`.
//!
//! When the origin is not the first waypoint, that waypoint is collected in
//! place and never drawn as visited: the published path goes straight from
//! the origin to the second waypoint.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{BinId, DriverId, LatLng, RouteId};
use crate::planner::{MovementPlan, PlanEntry};
use crate::segment::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Travelling,
    Arrived,
    Completed,
}

/// Outbound side effect produced by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    CollectBin {
        driver_id: DriverId,
        route_id: RouteId,
        bin_id: BinId,
    },
    CompleteRoute {
        driver_id: DriverId,
        route_id: RouteId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    route_id: RouteId,
    phase: Phase,
    /// Index of the next waypoint to reach. Never decreases.
    waypoint_index: usize,
    position: LatLng,
    segment: Option<Segment>,
    notified: BTreeSet<BinId>,
}

impl ProgressState {
    fn new(route_id: RouteId, origin: LatLng) -> Self {
        Self {
            route_id,
            phase: Phase::Idle,
            waypoint_index: 0,
            position: origin,
            segment: None,
            notified: BTreeSet::new(),
        }
    }

    pub fn route_id(&self) -> RouteId {
        self.route_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn waypoint_index(&self) -> usize {
        self.waypoint_index
    }

    pub fn position(&self) -> LatLng {
        self.position
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn collected(&self) -> &BTreeSet<BinId> {
        &self.notified
    }

    /// Interpolation points left in the current segment.
    pub fn remaining_steps(&self) -> usize {
        self.segment.as_ref().map_or(0, Segment::remaining)
    }

    fn register_bin(&mut self, driver_id: DriverId, entry: &PlanEntry, commands: &mut Vec<Command>) {
        let Some(&bin_id) = entry.bin_ids.get(self.waypoint_index) else {
            return;
        };
        if self.notified.insert(bin_id) {
            commands.push(Command::CollectBin {
                driver_id,
                route_id: self.route_id,
                bin_id,
            });
        }
    }

    fn complete(&mut self, driver_id: DriverId, commands: &mut Vec<Command>) {
        self.phase = Phase::Completed;
        self.segment = None;
        commands.push(Command::CompleteRoute {
            driver_id,
            route_id: self.route_id,
        });
        debug!(driver_id, route_id = self.route_id, "route completed");
    }

    /// Pins the driver onto the current target waypoint and moves on.
    fn arrive(&mut self, driver_id: DriverId, entry: &PlanEntry, commands: &mut Vec<Command>) {
        if let Some(&point) = entry.points.get(self.waypoint_index) {
            self.position = point;
        }
        self.register_bin(driver_id, entry, commands);
        self.waypoint_index += 1;
        self.segment = None;
        self.phase = Phase::Arrived;

        if self.waypoint_index >= entry.len() {
            self.complete(driver_id, commands);
        }
    }

    fn step(&mut self, driver_id: DriverId, entry: &PlanEntry, steps: usize, commands: &mut Vec<Command>) {
        match self.phase {
            Phase::Completed => return,
            Phase::Idle => {
                if entry.len() == 1 {
                    self.arrive(driver_id, entry, commands);
                    return;
                }
                // departure collects the first stop; travel starts from the origin
                self.register_bin(driver_id, entry, commands);
                self.waypoint_index = 1;
            }
            Phase::Travelling | Phase::Arrived => {}
        }

        if self.segment.is_none() {
            let Some(&target) = entry.points.get(self.waypoint_index) else {
                warn!(
                    driver_id,
                    route_id = self.route_id,
                    waypoint_index = self.waypoint_index,
                    "no waypoint to travel to, freezing driver"
                );
                self.phase = Phase::Completed;
                return;
            };
            self.segment = Some(Segment::between(self.position, target, steps));
        }

        self.phase = Phase::Travelling;
        let exhausted = match self.segment.as_mut() {
            Some(segment) => {
                if let Some(point) = segment.advance() {
                    self.position = point;
                }
                segment.is_exhausted()
            }
            None => false,
        };
        if exhausted {
            self.arrive(driver_id, entry, commands);
        }
    }
}

pub type ProgressMap = BTreeMap<DriverId, ProgressState>;

/// Result of one reducer step.
#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    pub progress: ProgressMap,
    pub positions: BTreeMap<DriverId, LatLng>,
    pub commands: Vec<Command>,
}

/// Advances every planned driver by one tick.
///
/// Drivers without progress are started from `origins`, falling back to their
/// first waypoint when no origin is known. Empty plan entries never get a
/// progress state.
pub fn advance(
    mut previous: ProgressMap,
    plan: &MovementPlan,
    origins: &HashMap<DriverId, LatLng>,
    steps: usize,
) -> TickOutput {
    let mut output = TickOutput::default();

    for (driver_id, entry) in plan.iter() {
        if entry.is_empty() {
            continue;
        }

        let mut state = match previous.remove(&driver_id) {
            Some(state) => state,
            None => {
                let origin = origins
                    .get(&driver_id)
                    .copied()
                    .unwrap_or(entry.points[0]);
                ProgressState::new(entry.route_id, origin)
            }
        };

        state.step(driver_id, entry, steps, &mut output.commands);
        output.positions.insert(driver_id, state.position);
        output.progress.insert(driver_id, state);
    }

    output
}
