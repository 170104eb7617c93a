//! Request extractor configuration shared by all routes.

use actix_web::{error::JsonPayloadError, web, HttpRequest};
use tracing::warn;

use crate::error::ApiError;

/// Largest JSON body accepted by the prediction routes.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// JSON extractor that reports malformed bodies the same way as every other
/// failure: `500 {"error": ...}`.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(json_error_handler)
}

fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    warn!(path = req.path(), error = %err, "rejected request body");
    ApiError::InvalidRequest(err.to_string()).into()
}
