//! Real Colombo locations used as bin sites.
//!
//! Coordinates sourced from OpenStreetMap. They sit inside the default
//! synthetic driver area so plans look like the real deployment.

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

pub const COLLECTION_POINTS: &[Location] = &[
    Location::new("Pettah Floating Market", 6.9344, 79.8540),
    Location::new("Galle Face Green", 6.9271, 79.8450),
    Location::new("Viharamahadevi Park", 6.9122, 79.8612),
    Location::new("Bambalapitiya Junction", 6.8897, 79.8560),
    Location::new("Borella Junction", 6.9145, 79.8778),
    Location::new("Maradana Station", 6.9290, 79.8650),
];

/// Looks up a collection point by name.
pub fn point(name: &str) -> Option<&'static Location> {
    COLLECTION_POINTS.iter().find(|location| location.name == name)
}
