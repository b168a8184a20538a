//! In-memory fleet backend.
//!
//! Mirrors the server rules the simulator relies on: start-collecting moves
//! assigned routes on the date into progress, status updates only move
//! forward, and collect-bin is idempotent.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::NaiveDate;

use fleet_sim::error::{FleetError, Result};
use fleet_sim::model::{
    BinId, BinSnapshot, DriverId, DriverRecord, GenerateRequest, GenerateSummary, RouteId,
    RouteSnapshot, RouteStatus,
};
use fleet_sim::traits::FleetBackend;

/// A write the simulator made, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    AutoGenerate(GenerateRequest),
    StartCollecting(Option<NaiveDate>),
    CollectBin(RouteId, BinId),
    UpdateStatus(RouteId, RouteStatus),
}

#[derive(Debug, Default)]
struct State {
    bins: Vec<BinSnapshot>,
    drivers: Vec<DriverRecord>,
    routes: Vec<RouteSnapshot>,
    collected: HashSet<(RouteId, BinId)>,
    calls: Vec<Call>,
    fail_reads: bool,
    fail_notifications: bool,
    fail_start: bool,
    generated: Vec<RouteSnapshot>,
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new(bins: Vec<BinSnapshot>, drivers: Vec<DriverRecord>, routes: Vec<RouteSnapshot>) -> Self {
        Self {
            state: Mutex::new(State {
                bins,
                drivers,
                routes,
                ..State::default()
            }),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Writes that are notifications (collect-bin and status updates).
    pub fn notifications(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::CollectBin(..) | Call::UpdateStatus(..)))
            .collect()
    }

    pub fn route_status(&self, route_id: RouteId) -> Option<RouteStatus> {
        let state = self.state.lock().unwrap();
        state.routes.iter().find(|route| route.id == route_id).map(|route| route.status)
    }

    pub fn set_route_status(&self, route_id: RouteId, status: RouteStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(route) = state.routes.iter_mut().find(|route| route.id == route_id) {
            route.status = status;
        }
    }

    pub fn push_route(&self, route: RouteSnapshot) {
        self.state.lock().unwrap().routes.push(route);
    }

    /// Routes returned (and stored) by the next auto-generate call.
    pub fn set_generated(&self, routes: Vec<RouteSnapshot>) {
        self.state.lock().unwrap().generated = routes;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_notifications(&self, fail: bool) {
        self.state.lock().unwrap().fail_notifications = fail;
    }

    pub fn fail_start(&self, fail: bool) {
        self.state.lock().unwrap().fail_start = fail;
    }
}

fn unavailable(what: &str) -> FleetError {
    FleetError::Unavailable(format!("{} rejected by test backend", what))
}

impl FleetBackend for InMemoryBackend {
    async fn bins(&self) -> Result<Vec<BinSnapshot>> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(unavailable("GET /api/bins"));
        }
        Ok(state.bins.clone())
    }

    async fn drivers(&self) -> Result<Vec<DriverRecord>> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(unavailable("GET /api/drivers"));
        }
        Ok(state.drivers.clone())
    }

    async fn routes(&self, date: Option<NaiveDate>) -> Result<Vec<RouteSnapshot>> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(unavailable("GET /api/routes"));
        }
        Ok(state
            .routes
            .iter()
            .filter(|route| route.on_date(date))
            .cloned()
            .collect())
    }

    async fn auto_generate(&self, request: GenerateRequest) -> Result<GenerateSummary> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::AutoGenerate(request));
        let generated = std::mem::take(&mut state.generated);
        let route_date = generated.first().and_then(|route| route.route_date).or(request.date);
        let bins_used = generated.iter().map(|route| route.bin_ids.len() as u32).sum();
        let routes_created = generated.len() as u32;
        state.routes.extend(generated);
        Ok(GenerateSummary {
            message: "Routes generated".to_string(),
            routes_created,
            bins_used,
            route_date,
        })
    }

    async fn start_collecting(&self, date: Option<NaiveDate>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::StartCollecting(date));
        if state.fail_start {
            return Err(unavailable("POST /api/routes/start-collecting"));
        }
        for route in state.routes.iter_mut() {
            if route.on_date(date) && route.status == RouteStatus::Assigned {
                route.status = RouteStatus::InProgress;
            }
        }
        Ok(())
    }

    async fn collect_bin(&self, route_id: RouteId, bin_id: BinId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CollectBin(route_id, bin_id));
        if state.fail_notifications {
            return Err(unavailable("POST collect-bin"));
        }
        state.collected.insert((route_id, bin_id));
        Ok(())
    }

    async fn update_route_status(&self, route_id: RouteId, status: RouteStatus) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::UpdateStatus(route_id, status));
        if state.fail_notifications {
            return Err(unavailable("PATCH route status"));
        }
        if let Some(route) = state.routes.iter_mut().find(|route| route.id == route_id) {
            let allowed = matches!(
                (route.status, status),
                (RouteStatus::Assigned, RouteStatus::InProgress)
                    | (RouteStatus::InProgress, RouteStatus::Completed)
            );
            if allowed {
                route.status = status;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn bin(id: BinId, lat: f64, lng: f64) -> BinSnapshot {
    BinSnapshot {
        id,
        latitude: lat,
        longitude: lng,
        fill_level: 90,
        overflow: false,
    }
}

pub fn driver(id: DriverId, position: Option<(f64, f64)>) -> DriverRecord {
    DriverRecord {
        id,
        name: Some(format!("Driver {}", id)),
        available: true,
        latitude: position.map(|(lat, _)| lat),
        longitude: position.map(|(_, lng)| lng),
    }
}

pub fn route_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 12).unwrap()
}

pub fn route(id: RouteId, driver_id: DriverId, bin_ids: Vec<BinId>, status: RouteStatus) -> RouteSnapshot {
    RouteSnapshot {
        id,
        driver_id,
        bin_ids,
        status,
        route_date: Some(route_date()),
        distance_km: 1.5,
    }
}

/// The two-bin scenario: driver 5 on route 10 over bins 1 and 2.
pub fn two_bin_backend(status: RouteStatus) -> InMemoryBackend {
    InMemoryBackend::new(
        vec![bin(1, 6.90, 79.80), bin(2, 6.91, 79.81)],
        vec![driver(5, Some((6.92, 79.86)))],
        vec![route(10, 5, vec![1, 2], status)],
    )
}
