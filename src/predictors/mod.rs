//! Predictors pair a fitted model with the transforms that map raw request
//! fields into its feature space.
//!
//! [`PatientPredictor`] and [`RequirementPredictor`] are rebuilt from their
//! CSV file on every retrain. [`PriorityModel`]s are loaded once and never
//! retrained in-process.

pub mod drugs;
pub mod patient;
pub mod priority;

use chrono::{DateTime, Utc};
use ndarray::{ArrayView1, ArrayView2};
use serde::Serialize;

use crate::error::Result;
use crate::ml::{mean_squared_error, r2_score, RandomForestRegressor};

pub use drugs::RequirementPredictor;
pub use patient::PatientPredictor;
pub use priority::{adjusted_priority, PriorityModel};

/// Summary of the last retrain, logged and kept alongside the fitted state.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub features: usize,
    pub test_mse: Option<f64>,
    pub test_r2: Option<f64>,
    pub trained_at: DateTime<Utc>,
}

impl TrainingReport {
    fn new(
        forest: &RandomForestRegressor,
        train_rows: usize,
        x_test: ArrayView2<'_, f64>,
        y_test: ArrayView1<'_, f64>,
    ) -> Result<Self> {
        let (test_mse, test_r2) = if y_test.is_empty() {
            (None, None)
        } else {
            let predicted = forest.predict(x_test)?;
            (
                Some(mean_squared_error(predicted.view(), y_test)),
                r2_score(predicted.view(), y_test),
            )
        };

        Ok(Self {
            rows: train_rows + y_test.len(),
            train_rows,
            test_rows: y_test.len(),
            features: forest.n_features(),
            test_mse,
            test_r2,
            trained_at: Utc::now(),
        })
    }
}
