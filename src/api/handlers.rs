//! HTTP request handlers

use actix_web::{get, post, web, HttpResponse, Responder};
use parking_lot::Mutex;
use tracing::{debug, info};
use validator::Validate;

use crate::error::{ApiError, PredictionError};
use crate::models::requests::{
    BedPriorityRequest, DrugPredictionRequest, DrugPredictionResponse, OpdPriorityRequest,
    PatientPredictionRequest, PatientPredictionResponse, PriorityResponse, ORIGINAL_DATASET_MESSAGE,
    RETRAINED_MESSAGE,
};
use crate::models::Month;
use crate::predictors::{PatientPredictor, RequirementPredictor};
use crate::state::AppState;

#[get("/")]
pub async fn home() -> impl Responder {
    "MediLink ML Backend Hit!"
}

#[post("/patient_prediction")]
pub async fn patient_prediction(
    state: web::Data<AppState>,
    body: web::Json<PatientPredictionRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request.validate()?;

    let predictor = state.patients.clone();
    let response = web::block(move || forecast_patients(&predictor, request)).await??;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/drugs_inventory_pred")]
pub async fn drugs_inventory_prediction(
    state: web::Data<AppState>,
    body: web::Json<DrugPredictionRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request.validate()?;

    let predictor = state.drugs.clone();
    let response = web::block(move || forecast_drugs(&predictor, request)).await??;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/opd_priority")]
pub async fn opd_priority(
    state: web::Data<AppState>,
    body: web::Json<OpdPriorityRequest>,
) -> Result<HttpResponse, ApiError> {
    let priority = state.opd.priority(&body.features()?, body.rating()?)?;
    debug!(priority, "opd priority scored");
    Ok(HttpResponse::Ok().json(PriorityResponse { priority }))
}

#[post("/bed_priority")]
pub async fn bed_priority(
    state: web::Data<AppState>,
    body: web::Json<BedPriorityRequest>,
) -> Result<HttpResponse, ApiError> {
    let priority = state.bed.priority(&body.features()?, body.rating()?)?;
    debug!(priority, "bed priority scored");
    Ok(HttpResponse::Ok().json(PriorityResponse { priority }))
}

/// Records the supplied count under the current month, then predicts the
/// current month from the (possibly retrained) model.
pub fn forecast_patients(
    predictor: &Mutex<PatientPredictor>,
    request: PatientPredictionRequest,
) -> Result<PatientPredictionResponse, ApiError> {
    let current = Month::from_name(&request.current_month)?;
    let previous = match request.previous() {
        Some((month, patients)) => Some((
            Month::from_name(month)?,
            patients.as_i64("previous_patients")?,
        )),
        None => None,
    };

    let mut predictor = predictor.lock();
    let message = match previous {
        Some((_, patients)) => {
            predictor.record(current, &request.department, patients)?;
            RETRAINED_MESSAGE
        }
        None => ORIGINAL_DATASET_MESSAGE,
    };
    let predicted_patients = predictor.predict(current, &request.department)?;
    drop(predictor);

    info!(
        department = %request.department,
        month = %current,
        predicted_patients,
        retrained = previous.is_some(),
        "patient prediction served"
    );

    Ok(PatientPredictionResponse {
        predicted_patients,
        previous_month: previous.map(|(month, _)| month.to_string()),
        current_month: request.current_month,
        department: request.department,
        message: message.to_string(),
    })
}

/// Records the supplied amount under the current month, then predicts the
/// current requirement. Without a previous amount the last dataset row's
/// amount stands in for it and nothing is recorded.
pub fn forecast_drugs(
    predictor: &Mutex<RequirementPredictor>,
    request: DrugPredictionRequest,
) -> Result<DrugPredictionResponse, ApiError> {
    let current = Month::from_name(&request.current_month)?;
    let previous = match request.previous() {
        Some((month, amount)) => {
            let amount = amount.as_f64("previous_amount")?;
            if amount <= 0.0 {
                return Err(PredictionError::InvalidAmount(amount.to_string()).into());
            }
            Some((Month::from_name(month)?, amount))
        }
        None => None,
    };

    let mut predictor = predictor.lock();
    if !predictor.knows_item(&request.item) {
        return Err(PredictionError::UnknownItem(request.item).into());
    }

    let (previous_amount, message) = match previous {
        Some((_, amount)) => {
            predictor.record(current, &request.item, amount)?;
            (amount, RETRAINED_MESSAGE)
        }
        None => (predictor.last_amount()?, ORIGINAL_DATASET_MESSAGE),
    };
    let predicted_amount = predictor.predict(current, &request.item, previous_amount)?;
    drop(predictor);

    info!(
        item = %request.item,
        month = %current,
        predicted_amount,
        retrained = previous.is_some(),
        "drug requirement prediction served"
    );

    Ok(DrugPredictionResponse {
        predicted_amount,
        previous_month: previous.map(|(month, _)| month.to_string()),
        current_month: request.current_month,
        item: request.item,
        message: message.to_string(),
    })
}
