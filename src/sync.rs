//! Polling mirror of backend state.
//!
//! Holds the latest bins, drivers, and routes the backend reported. A failed
//! poll is logged and leaves the previous snapshot in place; nothing here ever
//! hands an error to the simulation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{FleetError, Result};
use crate::model::{
    BinSnapshot, DriverFallback, DriverId, DriverRecord, DriverSnapshot, LatLng, RouteSnapshot,
};
use crate::traits::FleetBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollKind {
    Bins,
    Drivers,
    Routes,
}

#[derive(Debug)]
pub enum PollResult {
    Bins(Result<Vec<BinSnapshot>>),
    Drivers(Result<Vec<DriverRecord>>),
    Routes {
        date: Option<NaiveDate>,
        result: Result<Vec<RouteSnapshot>>,
    },
}

/// Snapshot change reported after a background poll lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollUpdate {
    pub kind: PollKind,
    pub applied: bool,
}

#[derive(Debug)]
struct Polled {
    kind: PollKind,
    ticket: u64,
    result: Result<PollResult>,
}

pub struct PollingSync<B> {
    backend: Arc<B>,
    fallback: DriverFallback,
    next_ticket: u64,
    bins: Vec<BinSnapshot>,
    drivers: Vec<DriverSnapshot>,
    routes: Vec<RouteSnapshot>,
    /// Ticket of the one poll per kind whose answer will be applied.
    pending: HashMap<PollKind, u64>,
    in_flight: JoinSet<Polled>,
}

impl<B: FleetBackend> PollingSync<B> {
    pub fn new(backend: Arc<B>, fallback: DriverFallback) -> Self {
        Self {
            backend,
            fallback,
            next_ticket: 0,
            bins: Vec::new(),
            drivers: Vec::new(),
            routes: Vec::new(),
            pending: HashMap::new(),
            in_flight: JoinSet::new(),
        }
    }

    // Inline fetches supersede any background poll of the same kind, so an
    // older answer landing later cannot overwrite them.

    pub async fn fetch_bins(&mut self) -> &[BinSnapshot] {
        let result = self.backend.bins().await;
        self.pending.remove(&PollKind::Bins);
        self.apply(PollResult::Bins(result));
        &self.bins
    }

    pub async fn fetch_drivers(&mut self) -> &[DriverSnapshot] {
        let result = self.backend.drivers().await;
        self.pending.remove(&PollKind::Drivers);
        self.apply(PollResult::Drivers(result));
        &self.drivers
    }

    pub async fn fetch_routes(&mut self, date: Option<NaiveDate>) -> &[RouteSnapshot] {
        let result = self.backend.routes(date).await;
        self.pending.remove(&PollKind::Routes);
        self.apply(PollResult::Routes { date, result });
        &self.routes
    }

    pub fn request_bins(&mut self) {
        if self.is_pending(PollKind::Bins) {
            return;
        }
        let backend = Arc::clone(&self.backend);
        self.spawn(PollKind::Bins, async move { PollResult::Bins(backend.bins().await) });
    }

    pub fn request_drivers(&mut self) {
        if self.is_pending(PollKind::Drivers) {
            return;
        }
        let backend = Arc::clone(&self.backend);
        self.spawn(PollKind::Drivers, async move {
            PollResult::Drivers(backend.drivers().await)
        });
    }

    /// Interval route poll. Skipped while another route poll is outstanding.
    pub fn request_routes(&mut self, date: Option<NaiveDate>) {
        if self.is_pending(PollKind::Routes) {
            return;
        }
        self.supersede_routes(date);
    }

    /// Route poll that replaces any outstanding one. The older answer may
    /// predate a write the caller needs to observe, so it is discarded.
    pub fn supersede_routes(&mut self, date: Option<NaiveDate>) {
        let backend = Arc::clone(&self.backend);
        self.spawn(PollKind::Routes, async move {
            PollResult::Routes {
                date,
                result: backend.routes(date).await,
            }
        });
    }

    fn is_pending(&self, kind: PollKind) -> bool {
        let pending = self.pending.contains_key(&kind);
        if pending {
            debug!(?kind, "poll already in flight");
        }
        pending
    }

    fn spawn<F>(&mut self, kind: PollKind, poll: F)
    where
        F: std::future::Future<Output = PollResult> + Send + 'static,
    {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.pending.insert(kind, ticket);

        // The poll runs in its own task so a panic still reports its kind.
        self.in_flight.spawn(async move {
            let result = tokio::spawn(poll).await.map_err(|err| {
                FleetError::Unavailable(format!("{:?} poll task failed: {}", kind, err))
            });
            Polled {
                kind,
                ticket,
                result,
            }
        });
    }

    /// Waits for the next background poll and folds it into the snapshots.
    ///
    /// Answers to superseded or invalidated polls come back with
    /// `applied: false`.
    pub async fn next_update(&mut self) -> Option<PollUpdate> {
        let polled = match self.in_flight.join_next().await? {
            Ok(polled) => polled,
            Err(err) => {
                warn!(error = %err, "poll task did not finish");
                return None;
            }
        };

        let kind = polled.kind;
        if self.pending.get(&kind) != Some(&polled.ticket) {
            debug!(?kind, ticket = polled.ticket, "discarding superseded poll");
            return Some(PollUpdate {
                kind,
                applied: false,
            });
        }
        self.pending.remove(&kind);

        let applied = match polled.result {
            Ok(result) => self.apply(result),
            Err(err) => {
                warn!(?kind, error = %err, "poll failed, keeping previous snapshot");
                false
            }
        };
        Some(PollUpdate { kind, applied })
    }

    /// Marks the outstanding route poll as stale and frees the slot for a
    /// fresh one.
    pub fn invalidate(&mut self) {
        self.pending.remove(&PollKind::Routes);
    }

    /// Replaces the matching snapshot on success. Returns whether it changed.
    pub fn apply(&mut self, result: PollResult) -> bool {
        match result {
            PollResult::Bins(Ok(bins)) => {
                self.bins = bins;
                true
            }
            PollResult::Drivers(Ok(records)) => {
                self.drivers = records
                    .into_iter()
                    .enumerate()
                    .map(|(index, record)| DriverSnapshot::from_record(record, index, &self.fallback))
                    .collect();
                true
            }
            PollResult::Routes {
                result: Ok(routes), ..
            } => {
                self.routes = routes;
                true
            }
            PollResult::Bins(Err(err)) => {
                warn!(error = %err, "bin poll failed, keeping previous snapshot");
                false
            }
            PollResult::Drivers(Err(err)) => {
                warn!(error = %err, "driver poll failed, keeping previous snapshot");
                false
            }
            PollResult::Routes {
                date,
                result: Err(err),
            } => {
                warn!(?date, error = %err, "route poll failed, keeping previous snapshot");
                false
            }
        }
    }

    pub fn bins(&self) -> &[BinSnapshot] {
        &self.bins
    }

    pub fn drivers(&self) -> &[DriverSnapshot] {
        &self.drivers
    }

    pub fn routes(&self) -> &[RouteSnapshot] {
        &self.routes
    }

    /// Last polled position of every driver.
    pub fn driver_positions(&self) -> HashMap<DriverId, LatLng> {
        self.drivers
            .iter()
            .map(|driver| (driver.id, driver.location()))
            .collect()
    }

    /// Counts of critical and warning bins.
    pub fn bin_alerts(&self) -> (usize, usize) {
        let critical = self.bins.iter().filter(|bin| bin.is_critical()).count();
        let warning = self.bins.iter().filter(|bin| bin.is_warning()).count();
        (critical, warning)
    }

    pub fn polls_in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
