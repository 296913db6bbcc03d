//! Rule-based ride-share price simulator and pluggable surge policies.
//!
//! This is the single authoritative copy of the baseline formula; the web
//! client's offline estimate is a degraded fallback and must not be treated
//! as a second source of truth.

use serde::{Deserialize, Serialize};

use crate::types::{CarType, TripRequest, Weather};

const BASE_FARE: f64 = 3.0;
const PER_KM: f64 = 1.8;
const CONGESTION_DIVISOR: f64 = 150.0;
const RAIN_MULTIPLIER: f64 = 1.1;

pub fn car_multiplier(car: CarType) -> f64 {
    match car {
        CarType::Economy => 1.0,
        CarType::Comfort => 1.2,
        CarType::Premium => 1.6,
        CarType::Suv => 1.4,
    }
}

pub fn weather_multiplier(weather: Weather) -> f64 {
    match weather {
        Weather::Rainy => RAIN_MULTIPLIER,
        Weather::Sunny | Weather::Cloudy => 1.0,
    }
}

/// Deterministic stand-in for the ride-share app's sticker price.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselinePricingModel;

impl BaselinePricingModel {
    pub fn estimate(&self, trip: &TripRequest) -> f64 {
        let congestion = 1.0 + trip.traffic_level as f64 / CONGESTION_DIVISOR;
        let effective_distance = trip.effective_distance_km() * congestion;
        BASE_FARE
            + effective_distance
                * PER_KM
                * car_multiplier(trip.car_type)
                * weather_multiplier(trip.weather)
    }
}

/// Scales the baseline price into the fare the app would finally charge.
pub trait SurgePolicy: Send + Sync {
    fn final_fare(&self, model_price: f64, trip: &TripRequest) -> f64;
}

/// Step surge on congestion and rain.
#[derive(Debug, Clone, Copy, Default)]
pub struct TieredSurge;

impl TieredSurge {
    pub fn multiplier(trip: &TripRequest) -> f64 {
        if trip.traffic_level > 60 || trip.weather == Weather::Rainy {
            1.30
        } else if trip.traffic_level > 35 {
            1.15
        } else {
            1.0
        }
    }
}

impl SurgePolicy for TieredSurge {
    fn final_fare(&self, model_price: f64, trip: &TripRequest) -> f64 {
        model_price * Self::multiplier(trip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurgeMode {
    #[default]
    None,
    Tiered,
}

impl SurgeMode {
    pub fn policy(&self) -> Option<Box<dyn SurgePolicy>> {
        match self {
            SurgeMode::None => None,
            SurgeMode::Tiered => Some(Box::new(TieredSurge)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coord;

    fn trip(traffic: u8, weather: Weather, car: CarType) -> TripRequest {
        TripRequest {
            pickup: Coord { lat: 40.75, lng: -73.99 },
            dropoff: Coord { lat: 40.71, lng: -74.00 },
            distance_km: Some(4.5),
            traffic_level: traffic,
            weather,
            car_type: car,
            hour: 12,
            day_of_week: 3,
        }
    }

    #[test]
    fn economy_sunny_light_traffic() {
        // congestion 1.1333, effective 5.10 km
        let p = BaselinePricingModel.estimate(&trip(20, Weather::Sunny, CarType::Economy));
        assert!((p - 12.18).abs() < 1e-9, "got {}", p);
    }

    #[test]
    fn rain_scales_the_distance_component() {
        let p = BaselinePricingModel.estimate(&trip(20, Weather::Rainy, CarType::Economy));
        assert!((p - (3.0 + 5.1 * 1.8 * 1.1)).abs() < 1e-9, "got {}", p);
        assert!((p - 13.098).abs() < 1e-9);
    }

    #[test]
    fn cloudy_is_priced_like_sunny() {
        let sunny = BaselinePricingModel.estimate(&trip(20, Weather::Sunny, CarType::Comfort));
        let cloudy = BaselinePricingModel.estimate(&trip(20, Weather::Cloudy, CarType::Comfort));
        assert_eq!(sunny, cloudy);
    }

    #[test]
    fn suv_heavy_traffic() {
        let economy = BaselinePricingModel.estimate(&trip(20, Weather::Sunny, CarType::Economy));
        let suv = BaselinePricingModel.estimate(&trip(80, Weather::Sunny, CarType::Suv));
        let expected = 3.0 + 4.5 * (1.0 + 80.0 / 150.0) * 1.8 * 1.4;
        assert!((suv - expected).abs() < 1e-9);
        assert!(suv > economy * 1.5);
    }

    #[test]
    fn car_types_are_strictly_ordered() {
        let price = |car| BaselinePricingModel.estimate(&trip(50, Weather::Cloudy, car));
        let economy = price(CarType::Economy);
        let comfort = price(CarType::Comfort);
        let suv = price(CarType::Suv);
        let premium = price(CarType::Premium);
        assert!(economy < comfort && comfort < suv && suv < premium);
    }

    #[test]
    fn estimate_is_deterministic() {
        let t = trip(73, Weather::Rainy, CarType::Premium);
        let first = BaselinePricingModel.estimate(&t);
        for _ in 0..100 {
            assert_eq!(BaselinePricingModel.estimate(&t).to_bits(), first.to_bits());
        }
    }

    #[test]
    fn zero_distance_costs_the_flag_fall() {
        let mut t = trip(90, Weather::Rainy, CarType::Premium);
        t.distance_km = None;
        t.dropoff = t.pickup;
        assert_eq!(BaselinePricingModel.estimate(&t), 3.0);
    }

    #[test]
    fn tiered_surge_steps() {
        assert_eq!(TieredSurge::multiplier(&trip(20, Weather::Sunny, CarType::Economy)), 1.0);
        assert_eq!(TieredSurge::multiplier(&trip(35, Weather::Cloudy, CarType::Economy)), 1.0);
        assert_eq!(TieredSurge::multiplier(&trip(36, Weather::Cloudy, CarType::Economy)), 1.15);
        assert_eq!(TieredSurge::multiplier(&trip(61, Weather::Sunny, CarType::Economy)), 1.30);
        assert_eq!(TieredSurge::multiplier(&trip(0, Weather::Rainy, CarType::Economy)), 1.30);
        let t = trip(40, Weather::Sunny, CarType::Economy);
        assert!((TieredSurge.final_fare(20.0, &t) - 23.0).abs() < 1e-9);
    }

    #[test]
    fn surge_mode_builds_policy() {
        assert!(SurgeMode::None.policy().is_none());
        assert!(SurgeMode::Tiered.policy().is_some());
    }
}
