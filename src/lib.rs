//! fleet-sim core
//!
//! Animates waste-collection drivers along their in-progress routes and keeps
//! the local animation reconciled with the backend's polled state.

pub mod traits;
pub mod error;
pub mod model;
pub mod config;
pub mod api;
pub mod geo;
pub mod segment;
pub mod planner;
pub mod progress;
pub mod stepper;
pub mod notifier;
pub mod sync;
pub mod guard;
pub mod session;

#[cfg(test)]
mod testing;
