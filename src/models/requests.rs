//! JSON bodies accepted and returned by the HTTP routes.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiError;
use crate::models::records::parse_amount;

pub const RETRAINED_MESSAGE: &str = "Model retrained with new data";
pub const ORIGINAL_DATASET_MESSAGE: &str = "Prediction based on original dataset";

/// A numeric field as clients actually send it: a number, a numeric string,
/// or a boolean flag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn as_f64(&self, field: &str) -> Result<f64, ApiError> {
        match self {
            Numeric::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
            Numeric::Number(value) => Ok(*value),
            Numeric::Text(text) => parse_amount(text)
                .map_err(|_| ApiError::InvalidRequest(format!("{field}: '{text}' is not a number"))),
        }
    }

    /// Whole-number view, truncating toward zero.
    pub fn as_i64(&self, field: &str) -> Result<i64, ApiError> {
        self.as_f64(field).map(|value| value.trunc() as i64)
    }

    /// Zero, `false` and blank strings count as not supplied.
    fn is_unset(&self) -> bool {
        match self {
            Numeric::Bool(flag) => !flag,
            Numeric::Number(value) => *value == 0.0,
            Numeric::Text(text) => text.trim().is_empty(),
        }
    }
}

/// Returns the pair only when both halves were supplied and set.
fn supplied<'a>(
    month: &'a Option<String>,
    value: &'a Option<Numeric>,
) -> Option<(&'a str, &'a Numeric)> {
    match (month.as_deref(), value.as_ref()) {
        (Some(month), Some(value)) if !month.trim().is_empty() && !value.is_unset() => {
            Some((month, value))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PatientPredictionRequest {
    pub current_month: String,
    #[validate(length(min = 1))]
    pub department: String,
    #[serde(default)]
    pub previous_month: Option<String>,
    #[serde(default)]
    pub previous_patients: Option<Numeric>,
}

impl PatientPredictionRequest {
    pub fn previous(&self) -> Option<(&str, &Numeric)> {
        supplied(&self.previous_month, &self.previous_patients)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientPredictionResponse {
    pub predicted_patients: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_month: Option<String>,
    pub current_month: String,
    pub department: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DrugPredictionRequest {
    pub current_month: String,
    #[validate(length(min = 1))]
    pub item: String,
    #[serde(default)]
    pub previous_month: Option<String>,
    #[serde(default)]
    pub previous_amount: Option<Numeric>,
}

impl DrugPredictionRequest {
    pub fn previous(&self) -> Option<(&str, &Numeric)> {
        supplied(&self.previous_month, &self.previous_amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugPredictionResponse {
    pub predicted_amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_month: Option<String>,
    pub current_month: String,
    pub item: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpdPriorityRequest {
    pub illness_severity: Numeric,
    pub age: Numeric,
    pub transmittable: Numeric,
    pub disabled: Numeric,
    pub patient_rating: Numeric,
}

impl OpdPriorityRequest {
    pub const FEATURES: [&'static str; 4] = ["illness_severity", "age", "transmittable", "disabled"];

    pub fn features(&self) -> Result<Vec<f64>, ApiError> {
        [
            &self.illness_severity,
            &self.age,
            &self.transmittable,
            &self.disabled,
        ]
        .into_iter()
        .zip(Self::FEATURES)
        .map(|(value, name)| value.as_f64(name))
        .collect()
    }

    pub fn rating(&self) -> Result<i64, ApiError> {
        self.patient_rating.as_i64("patient_rating")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedPriorityRequest {
    pub illness_severity: Numeric,
    pub doctor_offset: Numeric,
    pub age: Numeric,
    pub waiting_period: Numeric,
    pub transmittable: Numeric,
    pub disabled: Numeric,
    pub patient_rating: Numeric,
}

impl BedPriorityRequest {
    pub const FEATURES: [&'static str; 6] = [
        "illness_severity",
        "doctor_offset",
        "age",
        "waiting_period",
        "transmittable",
        "disabled",
    ];

    pub fn features(&self) -> Result<Vec<f64>, ApiError> {
        [
            &self.illness_severity,
            &self.doctor_offset,
            &self.age,
            &self.waiting_period,
            &self.transmittable,
            &self.disabled,
        ]
        .into_iter()
        .zip(Self::FEATURES)
        .map(|(value, name)| value.as_f64(name))
        .collect()
    }

    pub fn rating(&self) -> Result<i64, ApiError> {
        self.patient_rating.as_i64("patient_rating")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityResponse {
    pub priority: i64,
}
