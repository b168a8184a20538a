//! Operator session: owns the polling mirror, the stepper, the notifier and
//! the guard, and multiplexes them on one task.
//!
//! Network calls made by the loop are spawned and joined back, so the ticker
//! keeps its cadence no matter how slow the backend is. Operator actions
//! (start collecting, regenerate) await the backend directly; they always tear
//! the current run down first, so no ticks are owed while they wait.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::config::FleetConfig;
use crate::error::Result;
use crate::guard::{HaltReason, ReconciliationGuard, Verdict};
use crate::model::{DriverId, GenerateRequest, GenerateSummary, LatLng, RouteStatus};
use crate::notifier::{CollectionNotifier, Delivery, NotificationFailure};
use crate::planner::{MovementPlan, build_plan};
use crate::progress::Command;
use crate::stepper::{FleetSnapshot, Stepper};
use crate::sync::{PollKind, PollUpdate, PollingSync};
use crate::traits::FleetBackend;

/// The active simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub run_id: u64,
    pub date: Option<NaiveDate>,
    pub drivers: usize,
}

/// Operator requests delivered to [`FleetSession::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    StartCollecting,
    Regenerate,
    Stop,
    SelectDate(Option<NaiveDate>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Start collecting as soon as the loop begins.
    pub start_immediately: bool,
    /// Leave the loop once no run is active.
    pub exit_when_idle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub date: Option<NaiveDate>,
    pub run: Option<RunInfo>,
    pub tick: u64,
    pub bins: usize,
    pub critical_bins: usize,
    pub warning_bins: usize,
    pub drivers: usize,
    pub routes: usize,
    pub routes_in_progress: usize,
    pub routes_completed: usize,
    pub total_distance_km: f64,
    pub notification_failures: usize,
}

pub struct FleetSession<B> {
    config: FleetConfig,
    backend: Arc<B>,
    sync: PollingSync<B>,
    stepper: Stepper,
    notifier: CollectionNotifier<B>,
    guard: ReconciliationGuard,
    date: Option<NaiveDate>,
    run: Option<RunInfo>,
    next_run_id: u64,
    last_halt: Option<HaltReason>,
}

impl<B: FleetBackend> FleetSession<B> {
    pub fn new(backend: Arc<B>, config: FleetConfig) -> Self {
        Self {
            sync: PollingSync::new(Arc::clone(&backend), config.driver_fallback),
            stepper: Stepper::new(config.interpolation_steps),
            notifier: CollectionNotifier::new(Arc::clone(&backend)),
            guard: ReconciliationGuard::new(),
            date: None,
            run: None,
            next_run_id: 1,
            last_halt: None,
            backend,
            config,
        }
    }

    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = date;
        self
    }

    /// Fetches drivers, bins and routes once, waiting for each.
    pub async fn refresh(&mut self) {
        self.sync.fetch_drivers().await;
        self.sync.fetch_bins().await;
        self.sync.fetch_routes(self.date).await;
        if self.date.is_none() {
            self.date = self.latest_route_date();
        }
    }

    fn latest_route_date(&self) -> Option<NaiveDate> {
        self.sync.routes().iter().filter_map(|route| route.route_date).max()
    }

    /// Asks the backend for fresh routes and drops any current run.
    pub async fn regenerate(&mut self) -> Result<GenerateSummary> {
        self.teardown(HaltReason::Regenerated);

        let request = GenerateRequest {
            threshold: self.config.threshold,
            max_stops: self.config.max_stops,
            date: self.date,
        };
        let summary = self.backend.auto_generate(request).await?;
        info!(
            routes_created = summary.routes_created,
            bins_used = summary.bins_used,
            route_date = ?summary.route_date,
            message = %summary.message,
            "routes generated"
        );

        if summary.route_date.is_some() {
            self.date = summary.route_date;
        }
        self.sync.fetch_routes(self.date).await;
        Ok(summary)
    }

    /// Moves eligible routes into progress and freezes a plan for them.
    ///
    /// Returns `None` when nothing resolves to a simulated driver.
    pub async fn start_collecting(&mut self) -> Result<Option<RunInfo>> {
        self.teardown(HaltReason::Deactivated);

        if self.date.is_none() {
            self.sync.fetch_routes(None).await;
            self.date = self.latest_route_date();
        }

        self.backend.start_collecting(self.date).await?;

        if self.sync.drivers().is_empty() {
            self.sync.fetch_drivers().await;
        }
        self.sync.fetch_bins().await;
        self.sync.fetch_routes(self.date).await;

        let plan = build_plan(self.sync.routes(), self.sync.bins(), self.date);
        if plan.is_empty() {
            info!(date = ?self.date, "no in-progress route resolved to a plan, nothing to simulate");
            return Ok(None);
        }

        Ok(Some(self.activate(plan)))
    }

    fn activate(&mut self, plan: MovementPlan) -> RunInfo {
        let run = RunInfo {
            run_id: self.next_run_id,
            date: self.date,
            drivers: plan.len(),
        };
        self.next_run_id += 1;

        for (driver_id, entry) in plan.iter() {
            info!(
                run_id = run.run_id,
                driver_id,
                route_id = entry.route_id,
                stops = entry.len(),
                path_km = entry.path_km,
                "driver planned"
            );
        }

        self.guard.arm(run.date, &plan);
        self.notifier.begin_run(run.run_id);
        self.stepper.start(run.run_id, plan);
        self.run = Some(run);
        self.last_halt = None;
        run
    }

    /// Stops the run and returns drivers to their polled positions.
    pub fn deactivate(&mut self) {
        self.teardown(HaltReason::Deactivated);
        self.sync.request_drivers();
    }

    fn teardown(&mut self, reason: HaltReason) {
        if let Some(run) = self.run.take() {
            info!(run_id = run.run_id, ?reason, ticks = self.stepper.ticks(), "simulation run stopped");
            self.last_halt = Some(reason);
        }
        self.stepper.reset();
        self.notifier.cancel();
        self.guard.disarm();
        self.sync.invalidate();
    }

    /// Advances the simulation one tick and dispatches whatever it produced.
    pub fn tick(&mut self) -> Vec<Command> {
        if self.run.is_none() {
            return Vec::new();
        }
        let origins = self.sync.driver_positions();
        let commands = self.stepper.tick(&origins);
        self.notifier.enqueue(commands.iter().copied());
        self.notifier.dispatch();
        commands
    }

    /// Checks the latest polled routes against the active run.
    pub fn reconcile(&mut self) -> Verdict {
        let verdict = self.guard.review(self.run.is_some(), self.sync.routes());
        if let Verdict::Halt(reason) = verdict {
            self.teardown(reason);
        }
        verdict
    }

    /// Polls routes for the run's date, waiting for the answer, then reconciles.
    pub async fn poll_routes(&mut self) -> Verdict {
        let date = self.run.map_or(self.date, |run| run.date);
        self.sync.fetch_routes(date).await;
        self.reconcile()
    }

    pub fn on_poll(&mut self, update: PollUpdate) {
        if update.kind == PollKind::Routes && update.applied {
            self.reconcile();
        }
    }

    pub fn on_delivery(&mut self, delivery: Delivery) {
        if delivery.delivered && matches!(delivery.command, Command::CompleteRoute { .. }) {
            let date = self.run.map_or(self.date, |run| run.date);
            self.sync.supersede_routes(date);
        }
    }

    /// Waits for every outstanding notification of the current run.
    pub async fn flush_notifications(&mut self) -> Vec<Delivery> {
        let deliveries = self.notifier.flush().await;
        for delivery in &deliveries {
            self.on_delivery(*delivery);
        }
        deliveries
    }

    async fn handle(&mut self, control: Control) {
        match control {
            Control::StartCollecting => match self.start_collecting().await {
                Ok(Some(run)) => info!(run_id = run.run_id, drivers = run.drivers, "collecting started"),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "start collecting failed"),
            },
            Control::Regenerate => {
                if let Err(err) = self.regenerate().await {
                    warn!(error = %err, "auto-generate failed");
                }
            }
            Control::Stop => self.deactivate(),
            Control::SelectDate(date) => self.date = date,
            Control::Shutdown => {}
        }
    }

    /// Runs the cooperative loop until shutdown, a closed control channel, or
    /// (with `exit_when_idle`) the end of the run.
    pub async fn run(&mut self, mut control: mpsc::Receiver<Control>, options: RunOptions) {
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut bin_poll = interval(self.config.bin_poll_interval());
        bin_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut route_poll = interval(self.config.route_poll_interval());
        route_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.sync.request_drivers();
        if options.start_immediately {
            self.handle(Control::StartCollecting).await;
        }

        loop {
            if options.exit_when_idle && self.run.is_none() {
                info!(reason = ?self.last_halt, "no active run, leaving loop");
                break;
            }

            tokio::select! {
                message = control.recv() => match message {
                    Some(Control::Shutdown) | None => break,
                    Some(message) => self.handle(message).await,
                },
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = bin_poll.tick() => self.sync.request_bins(),
                _ = route_poll.tick(), if self.run.is_some() => {
                    let date = self.run.map_or(self.date, |run| run.date);
                    self.sync.request_routes(date);
                }
                Some(update) = self.sync.next_update() => self.on_poll(update),
                Some(delivery) = self.notifier.next_delivery() => self.on_delivery(delivery),
            }
        }

        self.flush_notifications().await;
    }

    /// Driver positions for rendering: simulated where a run moves them,
    /// polled otherwise.
    pub fn display_positions(&self) -> BTreeMap<DriverId, LatLng> {
        let snapshot = self.stepper.snapshot();
        self.sync
            .drivers()
            .iter()
            .map(|driver| {
                let position = snapshot.position(driver.id).unwrap_or(driver.location());
                (driver.id, position)
            })
            .collect()
    }

    pub fn status(&self) -> SessionStatus {
        let routes: Vec<_> = self
            .sync
            .routes()
            .iter()
            .filter(|route| route.on_date(self.date))
            .collect();
        let (critical_bins, warning_bins) = self.sync.bin_alerts();

        SessionStatus {
            date: self.date,
            run: self.run,
            tick: self.stepper.ticks(),
            bins: self.sync.bins().len(),
            critical_bins,
            warning_bins,
            drivers: self.sync.drivers().len(),
            routes: routes.len(),
            routes_in_progress: routes
                .iter()
                .filter(|route| route.status == RouteStatus::InProgress)
                .count(),
            routes_completed: routes
                .iter()
                .filter(|route| route.status == RouteStatus::Completed)
                .count(),
            total_distance_km: routes.iter().map(|route| route.distance_km).sum(),
            notification_failures: self.notifier.failures().len(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FleetSnapshot> {
        self.stepper.subscribe()
    }

    pub fn run_info(&self) -> Option<RunInfo> {
        self.run
    }

    pub fn last_halt(&self) -> Option<HaltReason> {
        self.last_halt
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        self.date = date;
    }

    pub fn sync(&self) -> &PollingSync<B> {
        &self.sync
    }

    pub fn stepper(&self) -> &Stepper {
        &self.stepper
    }

    pub fn notification_failures(&self) -> &[NotificationFailure] {
        self.notifier.failures()
    }

    pub fn take_notification_failures(&mut self) -> Vec<NotificationFailure> {
        self.notifier.take_failures()
    }
}
