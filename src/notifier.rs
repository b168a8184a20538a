//! Outbound collection notifications.
//!
//! Commands produced by the stepper land in a queue and are dispatched as
//! spawned tasks, so a slow or failing backend never holds up a tick. Each
//! command is sent at most once per run. Failures are logged and kept in a
//! failure list for the operator; they are not retried and local progress is
//! not rolled back. The next route poll is the authority.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::RouteStatus;
use crate::progress::Command;
use crate::traits::FleetBackend;

/// A notification the backend did not accept.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFailure {
    pub run_id: u64,
    pub command: Command,
    pub error: String,
}

/// Result of one dispatched command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delivery {
    pub run_id: u64,
    pub command: Command,
    pub delivered: bool,
}

#[derive(Debug)]
struct Outcome {
    run_id: u64,
    command: Command,
    result: Result<()>,
}

pub struct CollectionNotifier<B> {
    backend: Arc<B>,
    run_id: u64,
    queue: VecDeque<Command>,
    sent: HashSet<Command>,
    in_flight: JoinSet<Outcome>,
    failures: Vec<NotificationFailure>,
}

impl<B: FleetBackend> CollectionNotifier<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            run_id: 0,
            queue: VecDeque::new(),
            sent: HashSet::new(),
            in_flight: JoinSet::new(),
            failures: Vec::new(),
        }
    }

    /// Starts accepting commands for `run_id`, abandoning the previous run.
    pub fn begin_run(&mut self, run_id: u64) {
        self.cancel();
        self.run_id = run_id;
    }

    /// Drops queued commands and detaches in-flight calls.
    ///
    /// Detached calls still reach the backend but their outcomes are never
    /// observed.
    pub fn cancel(&mut self) {
        if !self.queue.is_empty() || !self.in_flight.is_empty() {
            debug!(
                run_id = self.run_id,
                queued = self.queue.len(),
                in_flight = self.in_flight.len(),
                "notifications cancelled"
            );
        }
        self.queue.clear();
        self.sent.clear();
        self.in_flight.detach_all();
    }

    /// Queues commands, skipping any already sent this run.
    pub fn enqueue(&mut self, commands: impl IntoIterator<Item = Command>) {
        for command in commands {
            if self.sent.insert(command) {
                self.queue.push_back(command);
            } else {
                debug!(?command, "duplicate notification suppressed");
            }
        }
    }

    /// Spawns every queued command. Never waits on the network.
    pub fn dispatch(&mut self) {
        while let Some(command) = self.queue.pop_front() {
            let backend = Arc::clone(&self.backend);
            let run_id = self.run_id;
            self.in_flight.spawn(async move {
                let result = match command {
                    Command::CollectBin { route_id, bin_id, .. } => {
                        backend.collect_bin(route_id, bin_id).await
                    }
                    Command::CompleteRoute { route_id, .. } => {
                        backend
                            .update_route_status(route_id, RouteStatus::Completed)
                            .await
                    }
                };
                Outcome {
                    run_id,
                    command,
                    result,
                }
            });
        }
    }

    /// Waits for the next in-flight call to finish.
    ///
    /// Returns `None` when nothing is in flight or the finished call belongs
    /// to an abandoned run.
    pub async fn next_delivery(&mut self) -> Option<Delivery> {
        let joined = self.in_flight.join_next().await?;
        self.settle(joined)
    }

    /// Waits for every in-flight call of the current run.
    pub async fn flush(&mut self) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        while let Some(joined) = self.in_flight.join_next().await {
            if let Some(delivery) = self.settle(joined) {
                deliveries.push(delivery);
            }
        }
        deliveries
    }

    fn settle(
        &mut self,
        joined: std::result::Result<Outcome, tokio::task::JoinError>,
    ) -> Option<Delivery> {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "notification task did not finish");
                return None;
            }
        };

        if outcome.run_id != self.run_id {
            debug!(run_id = outcome.run_id, "ignoring notification outcome from a stopped run");
            return None;
        }

        let delivered = match outcome.result {
            Ok(()) => {
                debug!(run_id = outcome.run_id, command = ?outcome.command, "notification delivered");
                true
            }
            Err(err) => {
                warn!(
                    run_id = outcome.run_id,
                    command = ?outcome.command,
                    error = %err,
                    "notification failed, local progress kept"
                );
                self.failures.push(NotificationFailure {
                    run_id: outcome.run_id,
                    command: outcome.command,
                    error: err.to_string(),
                });
                false
            }
        };

        Some(Delivery {
            run_id: outcome.run_id,
            command: outcome.command,
            delivered,
        })
    }

    pub fn failures(&self) -> &[NotificationFailure] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<NotificationFailure> {
        std::mem::take(&mut self.failures)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
