//! Test fixtures for fleet-sim.
//!
//! Provides:
//! - Real Colombo collection points (from OpenStreetMap)
//! - An in-memory backend that records every call
//! - Builders for bins, drivers and routes

#![allow(dead_code)]

pub mod backend;
pub mod colombo_locations;

pub use backend::*;
pub use colombo_locations::*;
