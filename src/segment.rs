//! Interpolated travel between two coordinates.
//!
//! A segment is the sub-step cache a driver consumes while travelling: a
//! fixed number of evenly spaced points from the current position to the
//! next waypoint, one point per tick.

use serde::Serialize;

use crate::geo::lerp;
use crate::model::LatLng;

/// Interpolation steps per segment. A segment holds `steps + 1` points.
pub const DEFAULT_STEPS: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    points: Vec<LatLng>,
    cursor: usize,
}

impl Segment {
    /// Builds `steps + 1` points. The first equals `from`, the last equals `to`.
    pub fn between(from: LatLng, to: LatLng, steps: usize) -> Self {
        let steps = steps.max(1);
        let mut points: Vec<LatLng> = (0..steps)
            .map(|i| lerp(from, to, i as f64 / steps as f64))
            .collect();
        // pin the final point so arrival is exact despite float drift
        points.push(to);
        Self { points, cursor: 0 }
    }

    pub fn points(&self) -> &[LatLng] {
        &self.points
    }

    /// Takes the next point, or `None` once exhausted.
    pub fn advance(&mut self) -> Option<LatLng> {
        let point = self.points.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(point)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.points.len()
    }

    pub fn remaining(&self) -> usize {
        self.points.len().saturating_sub(self.cursor)
    }
}
