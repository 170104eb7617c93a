//! Error types for the MediLink ML service.

use std::path::PathBuf;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failures raised while loading data, training or predicting.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("'{0}' is not a valid month name")]
    UnknownMonth(String),

    #[error("item '{0}' has not been seen in the dataset")]
    UnknownItem(String),

    #[error("dataset {} has no usable rows", .0.display())]
    EmptyDataset(PathBuf),

    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("expected {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("model has not been trained")]
    NotTrained,

    #[error("cannot fit a model on zero rows")]
    NoTrainingRows,

    #[error("model fit failed: {0}")]
    Fit(String),

    #[error("dataset {} has columns {found:?}, expected {expected:?}", .path.display())]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("invalid model file {}: {reason}", .path.display())]
    ModelFormat { path: PathBuf, reason: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PredictionError> = std::result::Result<T, E>;

/// Error returned by HTTP handlers. Every variant renders as
/// `500 {"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("worker pool unavailable: {0}")]
    Blocking(String),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::InvalidRequest(errors.to_string())
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        ApiError::Blocking(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
