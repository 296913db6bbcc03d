use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use fair_fare::{
    api, CarType, ModelArtifacts, PredictError, PredictionService, ServiceConfig, TripRequest,
    Weather,
};
use fair_fare::types::Coord;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ServiceConfig::from_env()?;
    let artifacts = ModelArtifacts::load(&cfg.models_dir)?;
    let service = PredictionService::from_artifacts(artifacts, &cfg);

    // Warmup so a broken artifact shows up in the start-up log, not on the first request
    let warmup_trip = TripRequest {
        pickup: Coord { lat: 40.7580, lng: -73.9855 },
        dropoff: Coord { lat: 40.7128, lng: -74.0060 },
        distance_km: None,
        traffic_level: 30,
        weather: Weather::Sunny,
        car_type: CarType::Economy,
        hour: 12,
        day_of_week: 3,
    };
    match service.predict(&warmup_trip) {
        Ok(p) => tracing::info!(
            "warmup ok: {}/3 regressors loaded, fair={:.2} model={:.2}",
            service.available_models(),
            p.pricing.fair_taxi_price,
            p.pricing.model_base_price
        ),
        Err(PredictError::ModelUnavailable) => {
            tracing::warn!(
                "no usable regressors; /predict will answer 503 until artifacts are fixed"
            )
        }
        Err(e) => anyhow::bail!("warmup request rejected: {}", e),
    }

    tracing::info!(
        "surge={:?} schema={:?} origins={:?}",
        cfg.surge_policy,
        cfg.response_schema,
        cfg.allowed_origins
    );

    let app = api::router(Arc::new(service), &cfg.allowed_origins)?;

    tracing::info!("listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
