pub mod health;
pub mod subscription;

pub use health::health_config;
pub use subscription::subscription_config;

use crate::error::AppError;
use actix_web::web;

/// Malformed JSON bodies answer with the same error body as validation failures.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid JSON: {err}")).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid query string: {err}")).into()
    })
}
