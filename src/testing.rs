//! Scripted backend for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{FleetError, Result};
use crate::model::{
    BinId, BinSnapshot, DriverId, DriverRecord, GenerateRequest, GenerateSummary, RouteId,
    RouteSnapshot, RouteStatus,
};
use crate::traits::FleetBackend;

/// One scripted answer to `GET /api/routes`.
pub enum RouteAnswer {
    After(Duration, Vec<RouteSnapshot>),
    Panic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Write {
    CollectBin(RouteId, BinId),
    Status(RouteId, RouteStatus),
}

#[derive(Default)]
struct Script {
    routes: VecDeque<RouteAnswer>,
    writes: Vec<Write>,
    fail_writes: bool,
}

#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn with_routes(answers: Vec<RouteAnswer>) -> Self {
        Self {
            script: Mutex::new(Script {
                routes: answers.into(),
                ..Script::default()
            }),
        }
    }

    pub fn failing_writes() -> Self {
        let backend = Self::default();
        backend.script.lock().unwrap().fail_writes = true;
        backend
    }

    pub fn writes(&self) -> Vec<Write> {
        self.script.lock().unwrap().writes.clone()
    }

    fn record(&self, write: Write) -> Result<()> {
        let mut script = self.script.lock().unwrap();
        script.writes.push(write);
        if script.fail_writes {
            return Err(FleetError::Unavailable(format!("{:?} rejected", write)));
        }
        Ok(())
    }
}

pub fn route(id: RouteId, driver_id: DriverId, status: RouteStatus) -> RouteSnapshot {
    RouteSnapshot {
        id,
        driver_id,
        bin_ids: vec![1, 2],
        status,
        route_date: NaiveDate::from_ymd_opt(2026, 1, 12),
        distance_km: 0.0,
    }
}

impl FleetBackend for ScriptedBackend {
    async fn bins(&self) -> Result<Vec<BinSnapshot>> {
        Ok(Vec::new())
    }

    async fn drivers(&self) -> Result<Vec<DriverRecord>> {
        Ok(Vec::new())
    }

    async fn routes(&self, _date: Option<NaiveDate>) -> Result<Vec<RouteSnapshot>> {
        let answer = self.script.lock().unwrap().routes.pop_front();
        match answer {
            Some(RouteAnswer::After(delay, routes)) => {
                tokio::time::sleep(delay).await;
                Ok(routes)
            }
            Some(RouteAnswer::Panic) => panic!("scripted route poll panic"),
            None => Ok(Vec::new()),
        }
    }

    async fn auto_generate(&self, _request: GenerateRequest) -> Result<GenerateSummary> {
        Err(FleetError::Unavailable("auto-generate not scripted".to_string()))
    }

    async fn start_collecting(&self, _date: Option<NaiveDate>) -> Result<()> {
        Ok(())
    }

    async fn collect_bin(&self, route_id: RouteId, bin_id: BinId) -> Result<()> {
        self.record(Write::CollectBin(route_id, bin_id))
    }

    async fn update_route_status(&self, route_id: RouteId, status: RouteStatus) -> Result<()> {
        self.record(Write::Status(route_id, status))
    }
}
