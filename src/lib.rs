//! Fair-fare inference service.
//!
//! A trip request is turned into a fixed feature vector, priced by an
//! averaging ensemble of three trained regressors (the "fair" price) and by
//! a rule-based ride-share simulator (the "model" price), and the two are
//! reconciled into hidden-fee and surge figures.

pub mod api;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod fees;
pub mod model;
pub mod pricing;
pub mod response;
pub mod service;
pub mod types;

pub use config::ServiceConfig;
pub use ensemble::{EnsemblePredictor, ModelPrediction, Outcome};
pub use error::{ModelError, PredictError, ValidationError};
pub use features::{haversine_km, FeatureEngineer, FeatureVector};
pub use fees::{FarePricingResult, HiddenFeeCalculator};
pub use model::{ModelArtifacts, ModelKind, ModelSlot, Regressor};
pub use pricing::{BaselinePricingModel, SurgePolicy, TieredSurge};
pub use response::{PredictResponse, ResponseSchema};
pub use service::PredictionService;
pub use types::{CarType, PredictRequest, TripRequest, Weather};
