//! Monthly patient-count predictor.
//!
//! Features are `[month_ordinal, Dept_<a>, Dept_<b>, ...]`, one indicator
//! column per department currently present in the dataset (sorted). Adding a
//! department widens the feature space on the next retrain.

use std::path::PathBuf;

use ndarray::{Array1, Array2, Axis};
use tracing::{info, instrument, warn};

use crate::error::{PredictionError, Result};
use crate::ml::{train_test_split, ForestParams, OneHotSchema, RandomForestRegressor, StandardScaler, DEFAULT_SEED};
use crate::models::{Month, PatientRecord};
use crate::predictors::TrainingReport;
use crate::store::CsvStore;

const TEST_SIZE: f64 = 0.2;

#[derive(Debug, Clone)]
struct FittedPatientModel {
    departments: OneHotSchema,
    scaler: StandardScaler,
    forest: RandomForestRegressor,
    report: TrainingReport,
}

#[derive(Debug)]
pub struct PatientPredictor {
    store: CsvStore<PatientRecord>,
    params: ForestParams,
    fitted: Option<FittedPatientModel>,
}

impl PatientPredictor {
    pub fn default_params() -> ForestParams {
        ForestParams {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: DEFAULT_SEED,
        }
    }

    /// Creates an untrained predictor over `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_params(path, Self::default_params())
    }

    pub fn with_params(path: impl Into<PathBuf>, params: ForestParams) -> Self {
        Self {
            store: CsvStore::open(path),
            params,
            fitted: None,
        }
    }

    /// Opens the dataset and trains on it. The dataset must already exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut predictor = Self::new(path);
        predictor.retrain()?;
        Ok(predictor)
    }

    pub fn store(&self) -> &CsvStore<PatientRecord> {
        &self.store
    }

    pub fn report(&self) -> Option<&TrainingReport> {
        self.fitted.as_ref().map(|fitted| &fitted.report)
    }

    /// Departments known to the current model, in feature order.
    pub fn departments(&self) -> &[String] {
        self.fitted
            .as_ref()
            .map(|fitted| fitted.departments.categories())
            .unwrap_or_default()
    }

    /// Rebuilds the whole model from the CSV file.
    #[instrument(skip(self), fields(path = %self.store.path().display()))]
    pub fn retrain(&mut self) -> Result<&TrainingReport> {
        let rows: Vec<(Month, PatientRecord)> = self
            .store
            .load()?
            .into_iter()
            .filter_map(|record| match Month::from_name(&record.month) {
                Ok(month) => Some((month, record)),
                Err(err) => {
                    warn!(error = %err, department = %record.department, "skipping row");
                    None
                }
            })
            .collect();

        if rows.is_empty() {
            return Err(PredictionError::EmptyDataset(self.store.path().to_path_buf()));
        }

        let departments = OneHotSchema::fit(rows.iter().map(|(_, r)| r.department.as_str()));
        let width = 1 + departments.width();

        let mut x = Array2::<f64>::zeros((rows.len(), width));
        let mut y = Array1::<f64>::zeros(rows.len());
        for (i, (month, record)) in rows.iter().enumerate() {
            let features = feature_row(&departments, *month, &record.department);
            x.row_mut(i).assign(&Array1::from(features));
            y[i] = record.number as f64;
        }

        let split = train_test_split(rows.len(), TEST_SIZE, self.params.seed);
        let x_train = x.select(Axis(0), &split.train);
        let y_train = y.select(Axis(0), &split.train);

        let (scaler, x_train_scaled) = StandardScaler::fit_transform(x_train.view());
        let forest = RandomForestRegressor::fit(x_train_scaled.view(), y_train.view(), self.params)?;

        let x_test = scaler.transform(x.select(Axis(0), &split.test).view());
        let y_test = y.select(Axis(0), &split.test);
        let report = TrainingReport::new(&forest, split.train.len(), x_test.view(), y_test.view())?;

        info!(
            rows = report.rows,
            departments = departments.width(),
            test_mse = ?report.test_mse,
            "patient model retrained"
        );

        let fitted = self.fitted.insert(FittedPatientModel {
            departments,
            scaler,
            forest,
            report,
        });
        Ok(&fitted.report)
    }

    /// Appends an observation to the dataset and retrains.
    #[instrument(skip(self))]
    pub fn record(&mut self, month: Month, department: &str, patients: i64) -> Result<()> {
        self.store
            .append(&PatientRecord::new(month.name(), department, patients))?;
        self.retrain()?;
        Ok(())
    }

    /// Predicted patient count, truncated toward zero.
    ///
    /// A department the model has never seen gets an all-zero indicator
    /// vector rather than an error.
    pub fn predict(&self, month: Month, department: &str) -> Result<i64> {
        let fitted = self.fitted.as_ref().ok_or(PredictionError::NotTrained)?;

        if !fitted.departments.contains(department) {
            warn!(department, "department not present in training data");
        }

        let row = Array1::from(feature_row(&fitted.departments, month, department));
        let scaled = fitted.scaler.transform_row(row.view());
        let predicted = fitted.forest.predict_row(scaled.view())?;
        Ok(predicted.trunc() as i64)
    }
}

fn feature_row(departments: &OneHotSchema, month: Month, department: &str) -> Vec<f64> {
    let mut row = Vec::with_capacity(1 + departments.width());
    row.push(f64::from(month.ordinal()));
    row.extend(departments.encode(department));
    row
}
