// ── Location reporting types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Smallest radius a named location may have, in metres.
pub const MIN_NAMED_RADIUS_M: f64 = 5.0;
/// Radius used when the fix carries no accuracy estimate.
pub const DEFAULT_NAMED_RADIUS_M: f64 = 10.0;

/// Coarse motion classification from the step detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Motion {
    Walking,
    Stationary,
    #[default]
    Unknown,
}

/// One visible Wi-Fi access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiAccessPoint {
    pub bssid: String,
    /// Signal strength in dBm.
    pub rssi: i32,
}

/// A location fix produced by the platform and reported to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub lat: f64,
    pub lng: f64,
    /// Horizontal accuracy in metres.
    pub accuracy: Option<f32>,
    pub altitude: Option<f64>,
    pub wifi: Vec<WifiAccessPoint>,
    pub motion: Motion,
    pub timestamp: DateTime<Utc>,
}

impl LocationReport {
    /// Radius to register for a named place built from this fix.
    pub fn named_radius_m(&self) -> f64 {
        self.accuracy
            .map_or(DEFAULT_NAMED_RADIUS_M, f64::from)
            .max(MIN_NAMED_RADIUS_M)
    }
}
