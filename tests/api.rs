use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use actix_web::http::StatusCode;
use actix_web::{test as actix_test, web, App};
use medilink_ml::api::{self, handlers};
use medilink_ml::ml::ForestParams;
use medilink_ml::models::requests::PatientPredictionRequest;
use medilink_ml::predictors::priority::LinearModel;
use medilink_ml::predictors::{PatientPredictor, PriorityModel, RequirementPredictor};
use medilink_ml::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

struct Fixture {
    _dir: TempDir,
    patients: PathBuf,
    drugs: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let patients = dir.path().join("patients.csv");
    let drugs = dir.path().join("drugs.csv");

    let mut csv = String::from("Month,Department,Number\n");
    for (i, month) in MONTHS.iter().enumerate() {
        csv.push_str(&format!("{},Cardiology,{}\n", month, 110 + i * 3));
        csv.push_str(&format!("{},Pediatrics,{}\n", month, 150 - i * 2));
    }
    fs::write(&patients, csv).unwrap();

    let mut csv = String::from("Month_name,Item_name,Amount\n");
    for (i, month) in MONTHS.iter().enumerate() {
        csv.push_str(&format!("{},Paracetamol,\"{},{:03}\"\n", month, 5, i * 40));
        csv.push_str(&format!("{},Insulin,{}\n", month, 380 + i * 5));
    }
    fs::write(&drugs, csv).unwrap();

    Fixture {
        _dir: dir,
        patients,
        drugs,
    }
}

fn small_forest() -> ForestParams {
    ForestParams {
        n_estimators: 15,
        ..ForestParams::default()
    }
}

fn linear(weights: Vec<f64>, bias: f64) -> PriorityModel {
    PriorityModel::Linear(LinearModel { weights, bias })
}

fn state(fixture: &Fixture) -> AppState {
    let mut patients = PatientPredictor::with_params(&fixture.patients, small_forest());
    patients.retrain().unwrap();

    let mut drugs = RequirementPredictor::with_params(
        &fixture.drugs,
        ForestParams {
            n_estimators: 15,
            ..RequirementPredictor::default_params()
        },
    );
    drugs.retrain().unwrap();

    AppState::new(
        patients,
        drugs,
        linear(vec![1.0, 0.0, 0.0, 0.0], 0.0),
        linear(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0], -10.0),
    )
}

fn rows(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().count() - 1
}

macro_rules! app {
    ($state:expr) => {
        actix_test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(api::configure),
        )
        .await
    };
}

macro_rules! post {
    ($app:expr, $uri:expr, $body:expr $(,)?) => {{
        let req = actix_test::TestRequest::post().uri($uri).set_json($body).to_request();
        let resp = actix_test::call_service($app, req).await;
        let status = resp.status();
        let body: Value = actix_test::read_body_json(resp).await;
        (status, body)
    }};
}

#[actix_rt::test]
async fn home_route_answers() {
    let fixture = fixture();
    let app = app!(state(&fixture));

    let req = actix_test::TestRequest::get().uri("/").to_request();
    let body = actix_test::call_and_read_body(&app, req).await;
    assert_eq!(body, "MediLink ML Backend Hit!");
}

#[actix_rt::test]
async fn patient_prediction_without_history_is_stable() {
    let fixture = fixture();
    let app = app!(state(&fixture));
    let request = json!({ "current_month": "July", "department": "Cardiology" });

    let (status, first) = post!(&app, "/patient_prediction", request.clone());
    assert_eq!(status, StatusCode::OK);
    let (_, second) = post!(&app, "/patient_prediction", request);

    assert_eq!(first["predicted_patients"], second["predicted_patients"]);
    assert_eq!(first["message"], "Prediction based on original dataset");
    assert_eq!(first["department"], "Cardiology");
    assert!(first.get("previous_month").is_none());
    assert_eq!(rows(&fixture.patients), 24);
}

#[actix_rt::test]
async fn patient_prediction_with_history_appends_and_retrains() {
    let fixture = fixture();
    let app = app!(state(&fixture));

    let (status, body) = post!(&app,
        "/patient_prediction",
        json!({
            "previous_month": "June",
            "previous_patients": "131",
            "current_month": "July",
            "department": "Cardiology",
        }),
    );

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Model retrained with new data");
    assert_eq!(body["previous_month"], "June");
    assert!(body["predicted_patients"].as_i64().unwrap() > 0);
    assert_eq!(rows(&fixture.patients), 25);
    assert!(fs::read_to_string(&fixture.patients)
        .unwrap()
        .ends_with("July,Cardiology,131\n"));
}

#[actix_rt::test]
async fn zero_previous_patients_is_treated_as_absent() {
    let fixture = fixture();
    let app = app!(state(&fixture));

    let (status, body) = post!(
        &app,
        "/patient_prediction",
        json!({
            "previous_month": "June",
            "previous_patients": 0,
            "current_month": "July",
            "department": "Cardiology",
        }),
    );

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Prediction based on original dataset");
    assert_eq!(rows(&fixture.patients), 24);
}

#[actix_rt::test]
async fn unknown_month_is_rejected_before_writing() {
    let fixture = fixture();
    let app = app!(state(&fixture));

    let (status, body) = post!(&app,
        "/patient_prediction",
        json!({
            "previous_month": "Jun",
            "previous_patients": 10,
            "current_month": "July",
            "department": "Cardiology",
        }),
    );

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "'Jun' is not a valid month name");
    assert_eq!(rows(&fixture.patients), 24);
}

#[actix_rt::test]
async fn malformed_body_returns_json_error() {
    let fixture = fixture();
    let app = app!(state(&fixture));

    let req = actix_test::TestRequest::post()
        .uri("/patient_prediction")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = actix_test::read_body_json(resp).await;
    assert!(body["error"].is_string());

    let (status, body) = post!(&app, "/patient_prediction", json!({ "department": "Cardiology" }));
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("current_month"));
}

#[actix_rt::test]
async fn drug_prediction_with_history_appends_one_row() {
    let fixture = fixture();
    let app = app!(state(&fixture));

    let (status, body) = post!(&app,
        "/drugs_inventory_pred",
        json!({
            "previous_month": "December",
            "previous_amount": "5,600",
            "current_month": "January",
            "item": "Paracetamol",
        }),
    );

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["item"], "Paracetamol");
    assert_eq!(body["message"], "Model retrained with new data");
    assert!(body["predicted_amount"].as_i64().unwrap() >= 0);
    assert_eq!(rows(&fixture.drugs), 25);
    assert!(fs::read_to_string(&fixture.drugs)
        .unwrap()
        .ends_with("January,Paracetamol,5600\n"));
}

#[actix_rt::test]
async fn drug_prediction_without_history_leaves_dataset_alone() {
    let fixture = fixture();
    let app = app!(state(&fixture));
    let request = json!({ "current_month": "March", "item": "Insulin" });

    let (status, first) = post!(&app, "/drugs_inventory_pred", request.clone());
    assert_eq!(status, StatusCode::OK, "{first}");
    let (_, second) = post!(&app, "/drugs_inventory_pred", request);

    assert_eq!(first["predicted_amount"], second["predicted_amount"]);
    assert_eq!(rows(&fixture.drugs), 24);
}

#[actix_rt::test]
async fn unseen_drug_item_fails_without_appending() {
    let fixture = fixture();
    let app = app!(state(&fixture));

    let (status, body) = post!(&app,
        "/drugs_inventory_pred",
        json!({
            "previous_month": "May",
            "previous_amount": 80,
            "current_month": "June",
            "item": "Morphine",
        }),
    );

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "item 'Morphine' has not been seen in the dataset");
    assert_eq!(rows(&fixture.drugs), 24);
}

#[actix_rt::test]
async fn opd_priority_applies_rating_adjustment() {
    let fixture = fixture();
    let app = app!(state(&fixture));

    let request = |rating: i64| {
        json!({
            "illness_severity": 4,
            "age": 52,
            "transmittable": true,
            "disabled": 0,
            "patient_rating": rating,
        })
    };

    let (status, body) = post!(&app, "/opd_priority", request(5));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "priority": 4 }));

    let (_, body) = post!(&app, "/opd_priority", request(1));
    assert_eq!(body, json!({ "priority": 3 }));
}

#[actix_rt::test]
async fn bed_priority_is_clamped_at_zero() {
    let fixture = fixture();
    let app = app!(state(&fixture));

    let (status, body) = post!(&app,
        "/bed_priority",
        json!({
            "illness_severity": 2,
            "doctor_offset": 1,
            "age": 30,
            "waiting_period": 4,
            "transmittable": 0,
            "disabled": 0,
            "patient_rating": 1,
        }),
    );

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "priority": 0 }));
}

#[actix_rt::test]
async fn non_numeric_priority_field_is_an_error() {
    let fixture = fixture();
    let app = app!(state(&fixture));

    let (status, body) = post!(&app,
        "/opd_priority",
        json!({
            "illness_severity": "severe",
            "age": 52,
            "transmittable": 1,
            "disabled": 0,
            "patient_rating": 3,
        }),
    );

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("illness_severity"));
}

#[test]
fn concurrent_writers_each_append_one_row() {
    let fixture = fixture();
    let state = state(&fixture);
    let patients = Arc::clone(&state.patients);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let patients = Arc::clone(&patients);
            thread::spawn(move || {
                let request: PatientPredictionRequest = serde_json::from_value(json!({
                    "previous_month": "August",
                    "previous_patients": 100 + i,
                    "current_month": "September",
                    "department": "Pediatrics",
                }))
                .unwrap();
                handlers::forecast_patients(&patients, request).unwrap()
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(rows(&fixture.patients), 28);
}
