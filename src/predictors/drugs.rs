//! Drug inventory requirement predictor.
//!
//! Features are `[month_ordinal, item_code, previous_amount]`:
//! the month ordinal is missing (and imputed) for unrecognised month names,
//! item codes come from a [`LabelEncoder`] fitted on the current file, and the
//! previous amount is the prior row's amount (the mean amount for the first
//! row). Rows with unparseable or non-positive amounts are ignored.

use std::path::PathBuf;

use ndarray::{Array1, Array2, Axis};
use tracing::{info, instrument};

use crate::error::{PredictionError, Result};
use crate::ml::{
    train_test_split, ForestParams, LabelEncoder, MedianImputer, RandomForestRegressor, StandardScaler,
    DEFAULT_SEED,
};
use crate::models::records::initial_drug_records;
use crate::models::{DrugRecord, Month};
use crate::predictors::TrainingReport;
use crate::store::CsvStore;

const TEST_SIZE: f64 = 0.2;

#[derive(Debug, Clone)]
struct FittedRequirementModel {
    items: LabelEncoder,
    imputer: MedianImputer,
    scaler: StandardScaler,
    forest: RandomForestRegressor,
    last_amount: f64,
    report: TrainingReport,
}

#[derive(Debug)]
pub struct RequirementPredictor {
    store: CsvStore<DrugRecord>,
    params: ForestParams,
    fitted: Option<FittedRequirementModel>,
}

impl RequirementPredictor {
    pub fn default_params() -> ForestParams {
        ForestParams {
            n_estimators: 200,
            max_depth: Some(10),
            min_samples_split: 5,
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

    /// Opens the dataset, seeding it with a few starter rows when the file
    /// does not exist, and trains on it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut predictor = Self::new(path);
        predictor.seed_if_missing()?;
        predictor.retrain()?;
        Ok(predictor)
    }

    pub fn seed_if_missing(&self) -> Result<bool> {
        self.store.ensure_seeded(&initial_drug_records())
    }

    pub fn store(&self) -> &CsvStore<DrugRecord> {
        &self.store
    }

    pub fn report(&self) -> Option<&TrainingReport> {
        self.fitted.as_ref().map(|fitted| &fitted.report)
    }

    pub fn knows_item(&self, item: &str) -> bool {
        self.fitted
            .as_ref()
            .map_or(false, |fitted| fitted.items.encode(item).is_some())
    }

    /// Amount of the last usable dataset row.
    pub fn last_amount(&self) -> Result<f64> {
        self.fitted
            .as_ref()
            .map(|fitted| fitted.last_amount)
            .ok_or(PredictionError::NotTrained)
    }

    /// Rebuilds the encoder, imputer, scaler and forest from the CSV file.
    #[instrument(skip(self), fields(path = %self.store.path().display()))]
    pub fn retrain(&mut self) -> Result<&TrainingReport> {
        let rows: Vec<(DrugRecord, f64)> = self
            .store
            .load()?
            .into_iter()
            .filter_map(|record| record.usable_amount().map(|amount| (record, amount)))
            .collect();

        if rows.is_empty() {
            return Err(PredictionError::EmptyDataset(self.store.path().to_path_buf()));
        }

        let items = LabelEncoder::fit(rows.iter().map(|(record, _)| record.item.as_str()));
        let y: Array1<f64> = rows.iter().map(|(_, amount)| *amount).collect();
        let mean_amount = y.sum() / y.len() as f64;

        let mut x = Array2::<f64>::zeros((rows.len(), 3));
        for (i, (record, _)) in rows.iter().enumerate() {
            x[[i, 0]] = Month::from_name(&record.month)
                .map(|month| f64::from(month.ordinal()))
                .unwrap_or(f64::NAN);
            // every item was just fitted, so the encoder always knows it
            x[[i, 1]] = items.encode(&record.item).unwrap_or_default() as f64;
            x[[i, 2]] = if i == 0 { mean_amount } else { y[i - 1] };
        }

        let imputer = MedianImputer::fit(x.view());
        let x = imputer.transform(x.view());
        let (scaler, x) = StandardScaler::fit_transform(x.view());

        let split = train_test_split(rows.len(), TEST_SIZE, self.params.seed);
        let x_train = x.select(Axis(0), &split.train);
        let y_train = y.select(Axis(0), &split.train);
        let forest = RandomForestRegressor::fit(x_train.view(), y_train.view(), self.params)?;

        let x_test = x.select(Axis(0), &split.test);
        let y_test = y.select(Axis(0), &split.test);
        let report = TrainingReport::new(&forest, split.train.len(), x_test.view(), y_test.view())?;

        info!(
            rows = report.rows,
            items = items.classes().len(),
            test_mse = ?report.test_mse,
            "drug requirement model retrained"
        );

        let fitted = self.fitted.insert(FittedRequirementModel {
            items,
            imputer,
            scaler,
            forest,
            last_amount: y[y.len() - 1],
            report,
        });
        Ok(&fitted.report)
    }

    /// Appends an observation to the dataset and retrains.
    #[instrument(skip(self))]
    pub fn record(&mut self, month: Month, item: &str, amount: f64) -> Result<()> {
        self.store.append(&DrugRecord::new(month.name(), item, amount))?;
        self.retrain()?;
        Ok(())
    }

    /// Predicted requirement, truncated toward zero and floored at zero.
    pub fn predict(&self, month: Month, item: &str, previous_amount: f64) -> Result<i64> {
        let fitted = self.fitted.as_ref().ok_or(PredictionError::NotTrained)?;
        let code = fitted
            .items
            .encode(item)
            .ok_or_else(|| PredictionError::UnknownItem(item.to_string()))?;

        let row = Array1::from(vec![f64::from(month.ordinal()), code as f64, previous_amount]);
        let row = fitted.imputer.transform_row(row.view());
        let row = fitted.scaler.transform_row(row.view());
        let predicted = fitted.forest.predict_row(row.view())?;
        Ok((predicted.trunc() as i64).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn fast_params() -> ForestParams {
        ForestParams {
            n_estimators: 20,
            ..RequirementPredictor::default_params()
        }
    }

    fn write_dataset(path: &Path) {
        let mut csv = String::from("Month_name,Item_name,Amount\n");
        for month in Month::ALL {
            csv.push_str(&format!("{},Paracetamol,\"{},000\"\n", month, 4 + month.ordinal() % 3));
            csv.push_str(&format!("{},Insulin,{}\n", month, 300 + month.ordinal() * 10));
        }
        csv.push_str("March,Insulin,0\n");
        csv.push_str("April,Insulin,unknown\n");
        fs::write(path, csv).unwrap();
    }

    fn trained(path: &Path) -> RequirementPredictor {
        let mut predictor = RequirementPredictor::with_params(path, fast_params());
        predictor.retrain().unwrap();
        predictor
    }

    #[test]
    fn creates_initial_dataset_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drugs.csv");

        let predictor = RequirementPredictor::open(&path).unwrap();
        assert_eq!(predictor.store().row_count().unwrap(), 3);
        assert!(predictor.knows_item("Drug B"));
        assert_eq!(predictor.last_amount().unwrap(), 2000.0);
    }

    #[test]
    fn drops_unusable_amounts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drugs.csv");
        write_dataset(&path);

        let predictor = trained(&path);
        assert_eq!(predictor.report().unwrap().rows, 24);
        assert_eq!(predictor.last_amount().unwrap(), 420.0);
    }

    #[test]
    fn predicts_non_negative_amounts_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drugs.csv");
        write_dataset(&path);

        let predictor = trained(&path);
        let insulin = predictor.predict(Month::July, "Insulin", 5_000.0).unwrap();
        assert!((0..=6_000).contains(&insulin), "insulin = {insulin}");

        let again = trained(&path).predict(Month::July, "Insulin", 5_000.0).unwrap();
        assert_eq!(insulin, again);
    }

    #[test]
    fn unknown_item_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drugs.csv");
        write_dataset(&path);

        let predictor = trained(&path);
        assert!(matches!(
            predictor.predict(Month::July, "Morphine", 10.0),
            Err(PredictionError::UnknownItem(item)) if item == "Morphine"
        ));
    }

    #[test]
    fn recording_teaches_new_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drugs.csv");
        write_dataset(&path);

        let mut predictor = trained(&path);
        let before = predictor.store().row_count().unwrap();
        predictor.record(Month::August, "Morphine", 75.0).unwrap();

        assert_eq!(predictor.store().row_count().unwrap(), before + 1);
        assert!(predictor.knows_item("Morphine"));
        assert_eq!(predictor.last_amount().unwrap(), 75.0);
    }
}
