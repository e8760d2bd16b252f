pub mod admin;
pub mod auth;
pub mod clients;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod swagger;
pub mod uploads;
pub mod users;

use actix_web::{HttpResponse, ResponseError};

use crate::utils::{parse_object_id, AppError};

/// Logs a failed call and renders the error envelope.
pub fn failed(route: &str, e: AppError) -> HttpResponse {
    if !e.status_code().is_server_error() {
        log::warn!("❌ {} - {}", route, e);
    }
    e.error_response()
}

/// Path id as an ObjectId, or the 400 response to send.
pub fn path_id(raw: &str, what: &str) -> Result<mongodb::bson::oid::ObjectId, HttpResponse> {
    parse_object_id(raw, what).map_err(|e| e.error_response())
}

/// JSON body errors in the same envelope as everything else.
pub fn json_config() -> actix_web::web::JsonConfig {
    actix_web::web::JsonConfig::default()
        .limit(8 * 1024 * 1024)
        .error_handler(|err, _req| {
            let message = err.to_string();
            actix_web::error::InternalError::from_response(err, AppError::BadRequest(message).error_response()).into()
        })
}
