//! Static triage priority models.
//!
//! Priority models are trained offline (see the `fit-priority` command) and
//! stored as JSON. The service loads them once at startup and never retrains
//! them. A raw model score is rounded, lowered by `0.2` per rating point below
//! five, floored at zero and rounded again.

use std::fs;
use std::path::Path;

use linfa::traits::Fit;
use linfa::Dataset;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PredictionError, Result};
use crate::ml::{ForestParams, RandomForestRegressor};
use crate::models::records::parse_amount;

const RATING_CEILING: f64 = 5.0;
const RATING_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LinearModel {
    fn score(&self, features: ArrayView1<'_, f64>) -> f64 {
        features
            .iter()
            .zip(self.weights.iter())
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias
    }

    /// Ordinary least-squares fit with an intercept.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(PredictionError::NoTrainingRows);
        }
        let dataset = Dataset::new(x.clone(), y.clone());
        let fitted = LinearRegression::new()
            .fit(&dataset)
            .map_err(|err| PredictionError::Fit(err.to_string()))?;

        Ok(Self {
            weights: fitted.params().to_vec(),
            bias: fitted.intercept(),
        })
    }
}

/// A static priority model as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PriorityModel {
    Linear(LinearModel),
    Forest(RandomForestRegressor),
}

impl PriorityModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let model: PriorityModel =
            serde_json::from_str(&contents).map_err(|err| PredictionError::ModelFormat {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        if model.n_features() == 0 {
            return Err(PredictionError::ModelFormat {
                path: path.to_path_buf(),
                reason: "model declares no features".into(),
            });
        }
        if let PriorityModel::Forest(forest) = &model {
            forest.check_structure().map_err(|reason| PredictionError::ModelFormat {
                path: path.to_path_buf(),
                reason,
            })?;
        }
        info!(path = %path.display(), features = model.n_features(), "priority model loaded");
        Ok(model)
    }

    /// Loads a model and checks it scores exactly `expected` features.
    pub fn load_expecting(path: impl AsRef<Path>, expected: usize) -> Result<Self> {
        let path = path.as_ref();
        let model = Self::load(path)?;
        if model.n_features() != expected {
            return Err(PredictionError::ModelFormat {
                path: path.to_path_buf(),
                reason: format!("expected {} features, model has {}", expected, model.n_features()),
            });
        }
        Ok(model)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        match self {
            PriorityModel::Linear(model) => model.weights.len(),
            PriorityModel::Forest(forest) => forest.n_features(),
        }
    }

    /// Raw model output for one feature vector.
    pub fn score(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features() {
            return Err(PredictionError::FeatureMismatch {
                expected: self.n_features(),
                actual: features.len(),
            });
        }
        let row = ArrayView1::from(features);
        match self {
            PriorityModel::Linear(model) => Ok(model.score(row)),
            PriorityModel::Forest(forest) => forest.predict_row(row),
        }
    }

    /// Rating-adjusted priority for one request.
    pub fn priority(&self, features: &[f64], patient_rating: i64) -> Result<i64> {
        Ok(adjusted_priority(self.score(features)?, patient_rating))
    }
}

/// Applies the patient-rating adjustment to a raw model score.
///
/// Both roundings are half-to-even. The result is never negative.
pub fn adjusted_priority(score: f64, patient_rating: i64) -> i64 {
    let rounded = score.round_ties_even();
    let adjustment = RATING_WEIGHT * (RATING_CEILING - patient_rating as f64);
    let adjusted = (rounded - adjustment).max(0.0);
    adjusted.round_ties_even() as i64
}

/// Feature matrix and target column read from a headed CSV file.
#[derive(Debug, Clone)]
pub struct TrainingTable {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

impl TrainingTable {
    /// Reads `features` and `target` by column name. Rows with any
    /// non-numeric selected value are skipped.
    pub fn from_csv(path: &Path, features: &[String], target: &str) -> anyhow::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers = reader.headers()?.clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| anyhow::anyhow!("column '{}' not found in {}", name, path.display()))
        };
        let feature_columns = features
            .iter()
            .map(|name| column(name.as_str()))
            .collect::<anyhow::Result<Vec<usize>>>()?;
        let target_column = column(target)?;

        let mut values = Vec::new();
        let mut targets = Vec::new();
        for record in reader.records() {
            let record = record?;
            let parsed: Option<Vec<f64>> = feature_columns
                .iter()
                .map(|&idx| record.get(idx).and_then(|raw| parse_amount(raw).ok()))
                .collect();
            let label = record.get(target_column).and_then(|raw| parse_amount(raw).ok());
            if let (Some(row), Some(label)) = (parsed, label) {
                values.extend(row);
                targets.push(label);
            }
        }

        let x = Array2::from_shape_vec((targets.len(), feature_columns.len()), values)?;
        Ok(Self {
            x,
            y: Array1::from(targets),
        })
    }

    pub fn rows(&self) -> usize {
        self.x.len_of(Axis(0))
    }
}

/// Which model family `fit-priority` should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelKind {
    Linear,
    Forest,
}

/// Fits a static priority model on a training table.
pub fn fit_priority_model(table: &TrainingTable, kind: ModelKind) -> Result<PriorityModel> {
    match kind {
        ModelKind::Linear => LinearModel::fit(&table.x, &table.y).map(PriorityModel::Linear),
        ModelKind::Forest => {
            RandomForestRegressor::fit(table.x.view(), table.y.view(), ForestParams::default())
                .map(PriorityModel::Forest)
        }
    }
}
