use crate::config::ServiceConfig;
use crate::ensemble::{EnsemblePredictor, ModelPrediction};
use crate::error::{PredictError, ValidationCode, ValidationError};
use crate::features::{FeatureEngineer, FeatureVector, FEATURE_NAMES};
use crate::fees::{FarePricingResult, HiddenFeeCalculator};
use crate::model::ModelArtifacts;
use crate::pricing::{BaselinePricingModel, SurgePolicy};
use crate::response::{EchoInputs, PredictResponse, ResponseSchema};
use crate::types::{PredictRequest, TripRequest};

/// Unrounded outcome of one trip.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub pricing: FarePricingResult,
    pub per_model: Vec<ModelPrediction>,
    pub distance_km: f64,
}

/// Read-only after construction; share it behind an `Arc` across workers.
pub struct PredictionService {
    engineer: FeatureEngineer,
    ensemble: EnsemblePredictor,
    baseline: BaselinePricingModel,
    surge: Option<Box<dyn SurgePolicy>>,
    schema: ResponseSchema,
    log_predictions: bool,
}

impl PredictionService {
    pub fn new(engineer: FeatureEngineer, ensemble: EnsemblePredictor) -> Self {
        Self {
            engineer,
            ensemble,
            baseline: BaselinePricingModel,
            surge: None,
            schema: ResponseSchema::default(),
            log_predictions: false,
        }
    }

    pub fn from_artifacts(artifacts: ModelArtifacts, cfg: &ServiceConfig) -> Self {
        let mut svc = Self::new(
            FeatureEngineer::new(artifacts.scaler),
            EnsemblePredictor::new(artifacts.slots),
        );
        svc.surge = cfg.surge_policy.policy();
        svc.schema = cfg.response_schema;
        svc.log_predictions = cfg.log_predictions;
        svc
    }

    pub fn with_surge(mut self, policy: Box<dyn SurgePolicy>) -> Self {
        self.surge = Some(policy);
        self
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn available_models(&self) -> usize {
        self.ensemble.available()
    }

    pub fn predict(&self, trip: &TripRequest) -> Result<Prediction, PredictError> {
        // validation happens here, before any regressor runs
        let features = self.engineer.build(trip)?;
        if self.log_predictions {
            log_features(&features);
        }

        let model_price = self.baseline.estimate(trip);
        let estimate = self.ensemble.predict(&features)?;

        let pricing = HiddenFeeCalculator::reconcile(
            estimate.fair_price,
            model_price,
            self.surge.as_deref(),
            trip,
        );
        if !pricing.is_finite() {
            tracing::error!("non-finite pricing {:?}", pricing);
            return Err(ValidationError {
                code: ValidationCode::OutOfRange,
                field: None,
                message: "trip produces prices outside the representable range".to_string(),
            }
            .into());
        }

        if self.log_predictions {
            let parts: Vec<String> = estimate
                .per_model
                .iter()
                .map(|p| match p.value() {
                    Some(v) => format!("{}={:.2}", p.model.key(), v),
                    None => format!("{}=invalid", p.model.key()),
                })
                .collect();
            tracing::info!(
                "fair={:.2} model={:.2} final={:.2} components=[{}]",
                pricing.fair_taxi_price,
                pricing.model_base_price,
                pricing.final_ai_fare,
                parts.join(", ")
            );
        }
        if estimate.degraded() {
            tracing::warn!(
                "degraded prediction: {} of {} regressors usable",
                estimate.per_model.iter().filter(|p| p.is_valid()).count(),
                estimate.per_model.len()
            );
        }

        Ok(Prediction {
            pricing,
            per_model: estimate.per_model,
            distance_km: features.distance_km(),
        })
    }

    pub fn respond(&self, trip: &TripRequest) -> Result<PredictResponse, PredictError> {
        let prediction = self.predict(trip)?;
        Ok(PredictResponse {
            schema: self.schema,
            pricing: prediction.pricing,
            per_model: prediction.per_model,
            inputs: EchoInputs::new(trip, prediction.distance_km),
        })
    }

    /// Full path from the wire body to the serializable response.
    pub fn handle(&self, req: PredictRequest) -> Result<PredictResponse, PredictError> {
        let trip = TripRequest::try_from(req)?;
        self.respond(&trip)
    }
}

fn log_features(features: &FeatureVector) {
    let x = features.values();
    let nz = x.iter().filter(|v| **v != 0.0).count();
    let sample: Vec<String> = FEATURE_NAMES
        .iter()
        .zip(x)
        .take(6)
        .map(|(name, v)| format!("{}={:.3}", name, v))
        .collect();
    tracing::info!(
        "features v{} in_dim={} nonzero={} distance_km={:.3} sample=[{}]",
        features.version(),
        x.len(),
        nz,
        features.distance_km(),
        sample.join(", ")
    );
}
