use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize};
use std::{fs, net::SocketAddr, path::PathBuf};

use crate::pricing::SurgeMode;
use crate::response::ResponseSchema;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub models_dir: PathBuf,
    pub allowed_origins: Vec<String>,
    pub surge_policy: SurgeMode,
    pub response_schema: ResponseSchema,
    pub log_predictions: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8500)),
            models_dir: PathBuf::from("models"),
            allowed_origins: vec![
                "http://localhost:5173".to_string(), // Vite dev server
                "http://127.0.0.1:5174".to_string(),
            ],
            surge_policy: SurgeMode::None,
            response_schema: ResponseSchema::Current,
            log_predictions: false,
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &str) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("config file not found: {}", path))?;
        serde_json::from_str(&data).with_context(|| format!("invalid config JSON in {}", path))
    }

    /// `FARE_CONFIG` file (or defaults) with individual env overrides on top.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = match get("FARE_CONFIG") {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };

        if let Some(v) = get("BIND_ADDR") {
            cfg.bind_addr = v
                .parse()
                .with_context(|| format!("BIND_ADDR={:?} is not host:port", v))?;
        }
        if let Some(v) = get("PORT") {
            let port: u16 = v.parse().with_context(|| format!("PORT={:?} is not a port", v))?;
            cfg.bind_addr.set_port(port);
        }
        if let Some(v) = get("MODELS_DIR") {
            cfg.models_dir = PathBuf::from(v);
        }
        if let Some(v) = get("ALLOWED_ORIGINS") {
            cfg.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("SURGE_POLICY") {
            cfg.surge_policy = parse_mode("SURGE_POLICY", &v)?;
        }
        if let Some(v) = get("RESPONSE_SCHEMA") {
            cfg.response_schema = parse_mode("RESPONSE_SCHEMA", &v)?;
        }
        if let Some(v) = get("LOG_PRED") {
            cfg.log_predictions = v == "1";
        }
        Ok(cfg)
    }
}

fn parse_mode<T: DeserializeOwned>(var: &str, v: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(v.to_ascii_lowercase()))
        .with_context(|| format!("{}={:?} is not a recognised value", var, v))
}
