use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Prices are stored and summed in this currency; no conversion happens.
pub const CURRENCY: &str = "RUB";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    #[schema(example = "VALIDATION_ERROR")]
    pub error: String,
    #[schema(example = "price must be positive")]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub timestamp: DateTime<Utc>,
    #[schema(example = "subscription-aggregator")]
    pub service: String,
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
