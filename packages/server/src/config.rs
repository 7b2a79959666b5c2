use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::domains::pickups::workflow::WeightMode;

/// Default maximum distance for bundling branches of the same company
/// into one pickup route, in kilometers.
pub const DEFAULT_MAX_BUNDLE_DISTANCE_KM: f64 = 50.0;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Push gateway for browser/mobile notifications. Push delivery is
    /// disabled when unset.
    pub push_gateway_url: Option<String>,
    pub max_bundle_distance_km: f64,
    /// How the aggregate completion weight is applied to branch stock.
    pub completion_weight_mode: WeightMode,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            push_gateway_url: env::var("PUSH_GATEWAY_URL").ok(),
            max_bundle_distance_km: env::var("MAX_BUNDLE_DISTANCE_KM")
                .unwrap_or_else(|_| DEFAULT_MAX_BUNDLE_DISTANCE_KM.to_string())
                .parse()
                .context("MAX_BUNDLE_DISTANCE_KM must be a valid number")?,
            completion_weight_mode: env::var("COMPLETION_WEIGHT_MODE")
                .unwrap_or_else(|_| "undivided".to_string())
                .parse()
                .context("COMPLETION_WEIGHT_MODE must be 'undivided' or 'prorated'")?,
        })
    }
}
