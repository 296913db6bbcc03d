//! Averaging ensemble over the three trained regressors.
//!
//! Each regressor is run independently. A model that was not loaded, errored,
//! or produced a non-finite or negative fare is excluded from the mean and
//! reported with a reason; the ensemble only fails when nothing is left.

use rayon::prelude::*;
use serde::Serialize;

use crate::error::PredictError;
use crate::features::FeatureVector;
use crate::model::{ModelKind, ModelSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    Unavailable,
    Failed,
    NonFinite,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Valid(f64),
    Invalid(InvalidReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrediction {
    pub model: ModelKind,
    pub outcome: Outcome,
}

impl ModelPrediction {
    pub fn value(&self) -> Option<f64> {
        match self.outcome {
            Outcome::Valid(v) => Some(v),
            Outcome::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.value().is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleEstimate {
    pub fair_price: f64,
    pub per_model: Vec<ModelPrediction>,
}

impl EnsembleEstimate {
    /// True when fewer than all regressors contributed.
    pub fn degraded(&self) -> bool {
        self.per_model.iter().any(|p| !p.is_valid())
    }
}

pub struct EnsemblePredictor {
    slots: Vec<ModelSlot>,
}

impl EnsemblePredictor {
    pub fn new(slots: Vec<ModelSlot>) -> Self {
        Self { slots }
    }

    pub fn available(&self) -> usize {
        self.slots.iter().filter(|s| s.model.is_some()).count()
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<EnsembleEstimate, PredictError> {
        let x = features.values();

        // indexed collect keeps slot order; this is the join point
        let per_model: Vec<ModelPrediction> = self
            .slots
            .par_iter()
            .map(|slot| ModelPrediction {
                model: slot.kind,
                outcome: run_slot(slot, x),
            })
            .collect();

        let valid: Vec<f64> = per_model.iter().filter_map(ModelPrediction::value).collect();
        if valid.is_empty() {
            return Err(PredictError::ModelUnavailable);
        }
        let n = valid.len() as f64;
        let mut fair_price = valid.iter().sum::<f64>() / n;
        if !fair_price.is_finite() {
            // the sum overflowed even though each member is finite
            fair_price = valid.iter().map(|v| v / n).sum();
        }

        Ok(EnsembleEstimate { fair_price, per_model })
    }
}

fn run_slot(slot: &ModelSlot, x: &[f64]) -> Outcome {
    let Some(model) = &slot.model else {
        return Outcome::Invalid(InvalidReason::Unavailable);
    };
    match model.predict(x) {
        Ok(p) if !p.is_finite() => {
            tracing::warn!("{} produced non-finite fare {}", slot.kind.key(), p);
            Outcome::Invalid(InvalidReason::NonFinite)
        }
        Ok(p) if p < 0.0 => {
            tracing::warn!("{} produced negative fare {:.4}", slot.kind.key(), p);
            Outcome::Invalid(InvalidReason::Negative)
        }
        Ok(p) => Outcome::Valid(p),
        Err(e) => {
            tracing::warn!("{} failed: {}", slot.kind.key(), e);
            Outcome::Invalid(InvalidReason::Failed)
        }
    }
}
