use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{ValidationCode, ValidationError};

/// Half of Earth's circumference: no trip between two points is longer.
pub const MAX_DISTANCE_KM: f64 = 20_016.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    Sunny,
    Cloudy,
    Rainy,
}

impl Weather {
    pub const ALL: [Weather; 3] = [Weather::Sunny, Weather::Cloudy, Weather::Rainy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Weather::Sunny => "Sunny",
            Weather::Cloudy => "Cloudy",
            Weather::Rainy => "Rainy",
        }
    }
}

impl FromStr for Weather {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Weather::ALL
            .into_iter()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| {
                ValidationError::new(
                    ValidationCode::UnknownWeather,
                    "weather",
                    format!("unknown weather {:?}; expected one of Sunny, Cloudy, Rainy", s),
                )
            })
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarType {
    Economy,
    Comfort,
    Premium,
    #[serde(rename = "SUV")]
    Suv,
}

impl CarType {
    pub const ALL: [CarType; 4] = [
        CarType::Economy,
        CarType::Comfort,
        CarType::Premium,
        CarType::Suv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CarType::Economy => "Economy",
            CarType::Comfort => "Comfort",
            CarType::Premium => "Premium",
            CarType::Suv => "SUV",
        }
    }
}

impl FromStr for CarType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CarType::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                ValidationError::new(
                    ValidationCode::UnknownCarType,
                    "car_type",
                    format!(
                        "unknown car type {:?}; expected one of Economy, Comfort, Premium, SUV",
                        s
                    ),
                )
            })
    }
}

impl fmt::Display for CarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Body of POST /predict exactly as the client sends it. Enum-like fields stay
// strings here so unknown values become a 400 with a field-level code.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictRequest {
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub drop_lat: f64,
    pub drop_lng: f64,
    #[serde(default)]
    pub distance_km: Option<f64>, // absent or 0 => haversine server-side
    pub traffic_level: f64,       // 0–100 slider from the UI
    pub weather: String,
    pub car_type: String,
    pub hour: i64,        // 0–23
    pub day_of_week: i64, // 0=Sunday .. 6=Saturday
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coord {
    pub lat: f64,
    pub lng: f64,
}

/// A validated trip. Built per request and dropped with the response.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRequest {
    pub pickup: Coord,
    pub dropoff: Coord,
    pub distance_km: Option<f64>,
    pub traffic_level: u8,
    pub weather: Weather,
    pub car_type: CarType,
    pub hour: u8,
    pub day_of_week: u8,
}

impl TripRequest {
    /// Distance used by both the regressors and the baseline: the supplied
    /// figure when positive, otherwise the great-circle distance.
    pub fn effective_distance_km(&self) -> f64 {
        match self.distance_km {
            Some(d) if d > 0.0 => d,
            _ => crate::features::haversine_km(self.pickup, self.dropoff),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_coord(self.pickup, "pickup_lat", "pickup_lng")?;
        check_coord(self.dropoff, "drop_lat", "drop_lng")?;

        if let Some(d) = self.distance_km {
            if !d.is_finite() {
                return Err(ValidationError::new(
                    ValidationCode::NonFinite,
                    "distance_km",
                    "distance_km must be a finite number",
                ));
            }
            if d < 0.0 {
                return Err(ValidationError::new(
                    ValidationCode::NegativeDistance,
                    "distance_km",
                    format!("distance_km must not be negative, got {}", d),
                ));
            }
            if d > MAX_DISTANCE_KM {
                return Err(ValidationError::new(
                    ValidationCode::OutOfRange,
                    "distance_km",
                    format!("distance_km must not exceed {} km, got {}", MAX_DISTANCE_KM, d),
                ));
            }
        }
        if self.traffic_level > 100 {
            return Err(out_of_range("traffic_level", self.traffic_level as i64, 0, 100));
        }
        if self.hour > 23 {
            return Err(out_of_range("hour", self.hour as i64, 0, 23));
        }
        if self.day_of_week > 6 {
            return Err(out_of_range("day_of_week", self.day_of_week as i64, 0, 6));
        }
        Ok(())
    }
}

impl TryFrom<PredictRequest> for TripRequest {
    type Error = ValidationError;

    fn try_from(req: PredictRequest) -> Result<Self, Self::Error> {
        if !req.traffic_level.is_finite() {
            return Err(ValidationError::new(
                ValidationCode::NonFinite,
                "traffic_level",
                "traffic_level must be a finite number",
            ));
        }
        let hour = u8::try_from(req.hour)
            .ok()
            .filter(|h| *h <= 23)
            .ok_or_else(|| out_of_range("hour", req.hour, 0, 23))?;
        let day_of_week = u8::try_from(req.day_of_week)
            .ok()
            .filter(|d| *d <= 6)
            .ok_or_else(|| out_of_range("day_of_week", req.day_of_week, 0, 6))?;

        let trip = TripRequest {
            pickup: Coord { lat: req.pickup_lat, lng: req.pickup_lng },
            dropoff: Coord { lat: req.drop_lat, lng: req.drop_lng },
            distance_km: req.distance_km,
            traffic_level: req.traffic_level.round().clamp(0.0, 100.0) as u8,
            weather: req.weather.parse()?,
            car_type: req.car_type.parse()?,
            hour,
            day_of_week,
        };
        trip.validate()?;
        Ok(trip)
    }
}

fn check_coord(
    c: Coord,
    lat_field: &'static str,
    lng_field: &'static str,
) -> Result<(), ValidationError> {
    if !c.lat.is_finite() {
        return Err(ValidationError::new(
            ValidationCode::NonFinite,
            lat_field,
            "latitude must be finite",
        ));
    }
    if !c.lng.is_finite() {
        return Err(ValidationError::new(
            ValidationCode::NonFinite,
            lng_field,
            "longitude must be finite",
        ));
    }
    if !(-90.0..=90.0).contains(&c.lat) {
        return Err(ValidationError::new(
            ValidationCode::OutOfRange,
            lat_field,
            format!("latitude {} outside [-90, 90]", c.lat),
        ));
    }
    if !(-180.0..=180.0).contains(&c.lng) {
        return Err(ValidationError::new(
            ValidationCode::OutOfRange,
            lng_field,
            format!("longitude {} outside [-180, 180]", c.lng),
        ));
    }
    Ok(())
}

fn out_of_range(field: &'static str, got: i64, lo: i64, hi: i64) -> ValidationError {
    ValidationError::new(
        ValidationCode::OutOfRange,
        field,
        format!("{} must be within [{}, {}], got {}", field, lo, hi, got),
    )
}
