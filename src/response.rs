//! JSON shape of a successful `/predict` call.
//!
//! Older clients read the price fields under different names. Each schema
//! version is one fixed key set, chosen once per process, so a response never
//! mixes names. All monetary values are rounded to cents here and nowhere
//! else.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::ensemble::{InvalidReason, ModelPrediction, Outcome};
use crate::fees::FarePricingResult;
use crate::model::ModelKind;
use crate::types::{CarType, TripRequest, Weather};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSchema {
    #[default]
    Current,
    Legacy,
}

struct PriceKeys {
    fair: &'static str,
    model: &'static str,
    hidden_fee: &'static str,
    final_fare: &'static str,
}

impl ResponseSchema {
    pub fn version(&self) -> u32 {
        match self {
            ResponseSchema::Legacy => 1,
            ResponseSchema::Current => 2,
        }
    }

    fn keys(&self) -> PriceKeys {
        match self {
            ResponseSchema::Current => PriceKeys {
                fair: "fair_taxi_price",
                model: "model_base_price",
                hidden_fee: "hidden_fee_vs_fair",
                final_fare: "final_ai_fare",
            },
            ResponseSchema::Legacy => PriceKeys {
                fair: "fair_price",
                model: "model_price",
                hidden_fee: "hidden_fee",
                final_fare: "final_fare",
            },
        }
    }
}

pub fn round_to(v: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = v * factor;
    if !scaled.is_finite() {
        // too large to carry fractional digits anyway
        return v;
    }
    let r = scaled.round() / factor;
    // no "-0.0" on the wire
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

fn cents(v: f64) -> f64 {
    round_to(v, 2)
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelWarning {
    pub model: ModelKind,
    pub reason: InvalidReason,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EchoInputs {
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub drop_lat: f64,
    pub drop_lng: f64,
    pub distance_km: f64,
    pub traffic_level: u8,
    pub weather: Weather,
    pub car_type: CarType,
    pub hour: u8,
    pub day_of_week: u8,
}

impl EchoInputs {
    pub fn new(trip: &TripRequest, distance_km: f64) -> Self {
        Self {
            pickup_lat: trip.pickup.lat,
            pickup_lng: trip.pickup.lng,
            drop_lat: trip.dropoff.lat,
            drop_lng: trip.dropoff.lng,
            distance_km: round_to(distance_km, 3),
            traffic_level: trip.traffic_level,
            weather: trip.weather,
            car_type: trip.car_type,
            hour: trip.hour,
            day_of_week: trip.day_of_week,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PredictResponse {
    pub schema: ResponseSchema,
    pub pricing: FarePricingResult,
    pub per_model: Vec<ModelPrediction>,
    pub inputs: EchoInputs,
}

impl PredictResponse {
    pub fn degraded(&self) -> bool {
        self.per_model.iter().any(|p| !p.is_valid())
    }

    pub fn warnings(&self) -> Vec<ModelWarning> {
        self.per_model
            .iter()
            .filter_map(|p| match p.outcome {
                Outcome::Invalid(reason) => Some(ModelWarning { model: p.model, reason }),
                Outcome::Valid(_) => None,
            })
            .collect()
    }
}

impl Serialize for PredictResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let keys = self.schema.keys();
        let p = &self.pricing;
        let components: BTreeMap<&str, Option<f64>> = self
            .per_model
            .iter()
            .map(|m| (m.model.key(), m.value().map(cents)))
            .collect();

        let mut map = serializer.serialize_map(Some(12))?;
        map.serialize_entry("schema_version", &self.schema.version())?;
        map.serialize_entry(keys.fair, &cents(p.fair_taxi_price))?;
        map.serialize_entry(keys.model, &cents(p.model_base_price))?;
        map.serialize_entry(keys.hidden_fee, &cents(p.hidden_fee_vs_fair))?;
        map.serialize_entry(keys.final_fare, &cents(p.final_ai_fare))?;
        map.serialize_entry("surge_multiplier", &cents(p.surge_multiplier))?;
        map.serialize_entry("surge_fee", &cents(p.surge_fee))?;
        map.serialize_entry("model_used", "ensemble")?;
        map.serialize_entry("degraded", &self.degraded())?;
        map.serialize_entry("warnings", &self.warnings())?;
        map.serialize_entry("model_component_prices", &components)?;
        map.serialize_entry("inputs", &self.inputs)?;
        map.end()
    }
}
