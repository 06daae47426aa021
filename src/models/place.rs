//! Place model for a geocoded city

use serde::{Deserialize, Serialize};

/// A resolved city: identity, name, country and coordinates
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Place {
    /// Provider identifier of the match
    pub id: u64,
    /// Canonical city name
    pub name: String,
    /// Country name
    pub country: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Place {
    /// Format place as "Name, Country"
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.name, self.country)
    }

    /// Format place as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}
