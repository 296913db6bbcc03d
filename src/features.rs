//! Request → feature vector transformation.
//!
//! The layout below is what the regressors were trained against. Changing the
//! order or the encoding requires bumping [`FEATURE_VERSION`] and shipping
//! new artifacts; the loader refuses a manifest built for another version.

use serde::Deserialize;

use crate::error::ValidationError;
use crate::types::{CarType, Coord, TripRequest, Weather};

pub const FEATURE_VERSION: u32 = 1;

/// Authoritative input order for every regressor.
pub const FEATURE_NAMES: [&str; 11] = [
    "trip_distance_mi",
    "hour",
    "day_of_week",
    "traffic_level_norm",
    "weather_sunny",
    "weather_cloudy",
    "weather_rainy",
    "car_economy",
    "car_comfort",
    "car_premium",
    "car_suv",
];

pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// Leading continuous features; the rest are one-hot and never scaled.
pub const N_NUMERIC: usize = 4;

const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_TO_MILES: f64 = 0.621371;

/// Great-circle distance in km. Same formulation the web client uses.
pub fn haversine_km(a: Coord, b: Coord) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lng - a.lng).to_radians();

    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Standardization fitted offline for the numeric features.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Scaler {
    pub fn check(&self) -> Result<(), String> {
        if self.mean.len() != N_NUMERIC || self.scale.len() != N_NUMERIC {
            return Err(format!(
                "scaler must have {} means and scales, got {} and {}",
                N_NUMERIC,
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err("scaler contains non-finite values".to_string());
        }
        Ok(())
    }

    fn apply(&self, x: &mut [f64]) {
        for i in 0..N_NUMERIC {
            let centered = x[i] - self.mean[i];
            // zero variance column: leave it centered
            x[i] = if self.scale[i] != 0.0 { centered / self.scale[i] } else { centered };
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f64; N_FEATURES],
    distance_km: f64,
}

impl FeatureVector {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Resolved trip distance the vector was built from, before unit
    /// conversion and scaling.
    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn version(&self) -> u32 {
        FEATURE_VERSION
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer {
    scaler: Option<Scaler>,
}

impl FeatureEngineer {
    pub fn new(scaler: Option<Scaler>) -> Self {
        Self { scaler }
    }

    pub fn build(&self, trip: &TripRequest) -> Result<FeatureVector, ValidationError> {
        trip.validate()?;

        let distance_km = trip.effective_distance_km();
        let mut values = [0.0; N_FEATURES];
        values[0] = distance_km * KM_TO_MILES;
        values[1] = trip.hour as f64;
        values[2] = trip.day_of_week as f64;
        values[3] = trip.traffic_level as f64 / 100.0;

        let weather_slot = match trip.weather {
            Weather::Sunny => 4,
            Weather::Cloudy => 5,
            Weather::Rainy => 6,
        };
        values[weather_slot] = 1.0;

        let car_slot = match trip.car_type {
            CarType::Economy => 7,
            CarType::Comfort => 8,
            CarType::Premium => 9,
            CarType::Suv => 10,
        };
        values[car_slot] = 1.0;

        if let Some(scaler) = &self.scaler {
            scaler.apply(&mut values);
        }

        Ok(FeatureVector { values, distance_km })
    }
}
