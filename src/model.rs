//! Snapshot records mirrored from the backend.
//!
//! Everything here is a read-only copy of server state. Field names follow the
//! backend's camelCase JSON so the records deserialize directly.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{FleetError, Result};

pub type BinId = u64;
pub type DriverId = u64;
pub type RouteId = u64;

/// Latitude/longitude pair.
pub type LatLng = (f64, f64);

/// Fill level at or above which a bin is critical.
pub const CRITICAL_FILL_LEVEL: u8 = 95;

/// Fill level at or above which a bin needs attention.
pub const WARNING_FILL_LEVEL: u8 = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinSnapshot {
    pub id: BinId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub fill_level: u8,
    #[serde(default)]
    pub overflow: bool,
}

impl BinSnapshot {
    pub fn location(&self) -> LatLng {
        (self.latitude, self.longitude)
    }

    pub fn is_critical(&self) -> bool {
        self.overflow || self.fill_level >= CRITICAL_FILL_LEVEL
    }

    pub fn is_warning(&self) -> bool {
        !self.overflow && (WARNING_FILL_LEVEL..CRITICAL_FILL_LEVEL).contains(&self.fill_level)
    }
}

/// Driver record as served by `GET /api/drivers`. Coordinates are optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRecord {
    pub id: DriverId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Synthetic placement for drivers the backend does not locate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverFallback {
    pub origin: LatLng,
    pub step: f64,
}

impl Default for DriverFallback {
    fn default() -> Self {
        Self {
            origin: (6.92, 79.86),
            step: 0.01,
        }
    }
}

impl DriverFallback {
    pub fn position_for(&self, index: usize) -> LatLng {
        let offset = index as f64 * self.step;
        (self.origin.0 + offset, self.origin.1 + offset)
    }
}

/// A driver with a guaranteed, renderable position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverSnapshot {
    pub id: DriverId,
    pub name: Option<String>,
    pub available: bool,
    pub latitude: f64,
    pub longitude: f64,
}

impl DriverSnapshot {
    /// Resolves the record's coordinates, filling each missing axis from the
    /// per-index fallback.
    pub fn from_record(record: DriverRecord, index: usize, fallback: &DriverFallback) -> Self {
        let (fallback_lat, fallback_lng) = fallback.position_for(index);
        Self {
            id: record.id,
            name: record.name,
            available: record.available,
            latitude: record.latitude.unwrap_or(fallback_lat),
            longitude: record.longitude.unwrap_or(fallback_lng),
        }
    }

    pub fn location(&self) -> LatLng {
        (self.latitude, self.longitude)
    }
}

/// Lifecycle status of a collection route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    #[default]
    Assigned,
    InProgress,
    Completed,
}

impl RouteStatus {
    /// Case-insensitive parse. `pending` and unknown values read as assigned.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "in_progress" | "in progress" | "in-progress" => RouteStatus::InProgress,
            "completed" => RouteStatus::Completed,
            _ => RouteStatus::Assigned,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Assigned => "assigned",
            RouteStatus::InProgress => "in_progress",
            RouteStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RouteStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(RouteStatus::parse).unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSnapshot {
    pub id: RouteId,
    pub driver_id: DriverId,
    #[serde(default)]
    pub bin_ids: Vec<BinId>,
    #[serde(default)]
    pub status: RouteStatus,
    #[serde(default)]
    pub route_date: Option<NaiveDate>,
    #[serde(default)]
    pub distance_km: f64,
}

impl RouteSnapshot {
    pub fn is_in_progress(&self) -> bool {
        self.status == RouteStatus::InProgress
    }

    /// True when the route belongs to `date`, or when no date is selected.
    pub fn on_date(&self, date: Option<NaiveDate>) -> bool {
        match date {
            Some(date) => self.route_date == Some(date),
            None => true,
        }
    }
}

/// Parameters for `POST /api/routes/auto-generate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub threshold: u8,
    pub max_stops: u32,
    pub date: Option<NaiveDate>,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            threshold: 80,
            max_stops: 6,
            date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSummary {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub routes_created: u32,
    #[serde(default)]
    pub bins_used: u32,
    #[serde(default)]
    pub route_date: Option<NaiveDate>,
}

/// Parses a `YYYY-MM-DD` route date.
pub fn parse_route_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| FleetError::InvalidDate(format!("{}: {}", value, err)))
}
