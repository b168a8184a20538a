//! Movement plan derivation.
//!
//! A plan is computed once when a collection run starts and stays frozen for
//! the rest of the run, so edits to routes made while trucks are moving never
//! change which drivers are simulated or where they go.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::geo::path_length_km;
use crate::model::{BinId, BinSnapshot, DriverId, LatLng, RouteId, RouteSnapshot};

/// Waypoints a single driver follows during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub route_id: RouteId,
    /// Bins in visit order, parallel to `points`.
    pub bin_ids: Vec<BinId>,
    pub points: Vec<LatLng>,
    /// Straight-line length of the waypoint chain.
    pub path_km: f64,
}

impl PlanEntry {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MovementPlan {
    entries: BTreeMap<DriverId, PlanEntry>,
}

impl MovementPlan {
    pub fn new(entries: BTreeMap<DriverId, PlanEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, driver_id: DriverId) -> Option<&PlanEntry> {
        self.entries.get(&driver_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DriverId, &PlanEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    pub fn driver_ids(&self) -> impl Iterator<Item = DriverId> + '_ {
        self.entries.keys().copied()
    }

    pub fn route_ids(&self) -> impl Iterator<Item = RouteId> + '_ {
        self.entries.values().map(|entry| entry.route_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the per-driver plan from in-progress routes on `date`.
///
/// Bin ids without a known coordinate are dropped. A route whose bins all fail
/// to resolve contributes nothing. If one driver has several in-progress
/// routes, the lowest route id wins.
pub fn build_plan(
    routes: &[RouteSnapshot],
    bins: &[BinSnapshot],
    date: Option<NaiveDate>,
) -> MovementPlan {
    let locations: HashMap<BinId, LatLng> =
        bins.iter().map(|bin| (bin.id, bin.location())).collect();

    let mut candidates: Vec<&RouteSnapshot> = routes
        .iter()
        .filter(|route| route.on_date(date) && route.is_in_progress())
        .collect();
    candidates.sort_by_key(|route| route.id);

    let mut entries: BTreeMap<DriverId, PlanEntry> = BTreeMap::new();
    for route in candidates {
        if let Some(existing) = entries.get(&route.driver_id) {
            warn!(
                driver_id = route.driver_id,
                route_id = route.id,
                planned_route_id = existing.route_id,
                "driver already has an in-progress route, skipping"
            );
            continue;
        }

        let Some(entry) = resolve_route(route, &locations) else {
            debug!(route_id = route.id, "no bin coordinates resolved, route not simulated");
            continue;
        };
        entries.insert(route.driver_id, entry);
    }

    MovementPlan::new(entries)
}

fn resolve_route(route: &RouteSnapshot, locations: &HashMap<BinId, LatLng>) -> Option<PlanEntry> {
    let mut seen = HashSet::new();
    let mut bin_ids = Vec::with_capacity(route.bin_ids.len());
    let mut points = Vec::with_capacity(route.bin_ids.len());

    for &bin_id in &route.bin_ids {
        if !seen.insert(bin_id) {
            debug!(route_id = route.id, bin_id, "duplicate bin in route");
            continue;
        }
        if let Some(&point) = locations.get(&bin_id) {
            bin_ids.push(bin_id);
            points.push(point);
        }
    }

    if points.is_empty() {
        return None;
    }

    Some(PlanEntry {
        route_id: route.id,
        path_km: path_length_km(&points),
        bin_ids,
        points,
    })
}
