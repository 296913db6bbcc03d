use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::{PredictError, ValidationError};
use crate::response::PredictResponse;
use crate::service::PredictionService;
use crate::types::{PredictRequest, TripRequest};

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    field: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn internal<S: Into<String>>(message: S) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody { code: "internal", message: message.into(), field: None },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody { code: e.code.as_str(), message: e.message, field: e.field },
        }
    }
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        match e {
            PredictError::Validation(v) => v.into(),
            PredictError::ModelUnavailable => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: ErrorBody {
                    code: "model_unavailable",
                    message: PredictError::ModelUnavailable.to_string(),
                    field: None,
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.body })).into_response()
    }
}

async fn predict(
    State(svc): State<Arc<PredictionService>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ValidationError::body(e.body_text()))?;

    // reject bad input on the async side; only valid trips reach the pool
    let trip = TripRequest::try_from(req)?;
    tracing::debug!(
        "predict car={} weather={} traffic={} hour={} dow={}",
        trip.car_type, trip.weather, trip.traffic_level, trip.hour, trip.day_of_week
    );

    let resp = tokio::task::spawn_blocking(move || svc.respond(&trip))
        .await
        .map_err(|e| ApiError::internal(format!("inference task failed: {}", e)))??;
    Ok(Json(resp))
}

pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {:?}", o)))
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

pub fn router(svc: Arc<PredictionService>, allowed_origins: &[String]) -> Result<Router> {
    Ok(Router::new()
        .route("/predict", post(predict))
        .layer(cors_layer(allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(svc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationCode;

    #[test]
    fn validation_maps_to_400_with_code() {
        let err: ApiError = PredictError::from(ValidationError::new(
            ValidationCode::UnknownWeather,
            "weather",
            "unknown weather",
        ))
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body.code, "unknown_weather");
        assert_eq!(err.body.field, Some("weather"));
    }

    #[test]
    fn unavailable_maps_to_503() {
        let err: ApiError = PredictError::ModelUnavailable.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.body.code, "model_unavailable");
    }

    #[test]
    fn bad_origin_is_rejected() {
        assert!(cors_layer(&["http://ok.example".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
