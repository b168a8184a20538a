//! Backend seam for the simulator.
//!
//! The engine only ever talks to the fleet backend through this trait. The
//! HTTP adapter in [`crate::api`] implements it for production; tests plug in
//! an in-memory backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{
    BinId, BinSnapshot, DriverRecord, GenerateRequest, GenerateSummary, RouteId, RouteSnapshot,
    RouteStatus,
};

/// Reads and writes against the authoritative fleet state.
///
/// Futures must be `Send` so calls can be spawned onto the runtime and joined
/// back without blocking the tick loop.
pub trait FleetBackend: Send + Sync + 'static {
    /// `GET /api/bins`
    fn bins(&self) -> impl Future<Output = Result<Vec<BinSnapshot>>> + Send;

    /// `GET /api/drivers`
    fn drivers(&self) -> impl Future<Output = Result<Vec<DriverRecord>>> + Send;

    /// `GET /api/routes?date=YYYY-MM-DD`, or every route when `date` is `None`.
    fn routes(&self, date: Option<NaiveDate>)
    -> impl Future<Output = Result<Vec<RouteSnapshot>>> + Send;

    /// `POST /api/routes/auto-generate`
    fn auto_generate(
        &self,
        request: GenerateRequest,
    ) -> impl Future<Output = Result<GenerateSummary>> + Send;

    /// `POST /api/routes/start-collecting?date=`
    fn start_collecting(&self, date: Option<NaiveDate>) -> impl Future<Output = Result<()>> + Send;

    /// `POST /api/routes/{route_id}/collect-bin/{bin_id}`. Idempotent server-side.
    fn collect_bin(&self, route_id: RouteId, bin_id: BinId)
    -> impl Future<Output = Result<()>> + Send;

    /// `PATCH /api/routes/{route_id}/status`
    fn update_route_status(
        &self,
        route_id: RouteId,
        status: RouteStatus,
    ) -> impl Future<Output = Result<()>> + Send;
}
