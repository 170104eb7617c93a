//! Shared application state handed to every request.

use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use tracing::info;

use crate::config::Config;
use crate::models::requests::{BedPriorityRequest, OpdPriorityRequest};
use crate::predictors::{PatientPredictor, PriorityModel, RequirementPredictor};

/// Owned predictor handles.
///
/// Each retrainable predictor sits behind its own lock: appending an
/// observation, retraining and predicting for one request happen under a
/// single acquisition, so concurrent writers to the same dataset are
/// serialized. The static priority models are immutable.
#[derive(Clone)]
pub struct AppState {
    pub patients: Arc<Mutex<PatientPredictor>>,
    pub drugs: Arc<Mutex<RequirementPredictor>>,
    pub opd: Arc<PriorityModel>,
    pub bed: Arc<PriorityModel>,
}

impl AppState {
    pub fn new(
        patients: PatientPredictor,
        drugs: RequirementPredictor,
        opd: PriorityModel,
        bed: PriorityModel,
    ) -> Self {
        Self {
            patients: Arc::new(Mutex::new(patients)),
            drugs: Arc::new(Mutex::new(drugs)),
            opd: Arc::new(opd),
            bed: Arc::new(bed),
        }
    }

    /// Trains both retrainable predictors and loads the static models.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let patients = PatientPredictor::open(&config.datasets.patients).with_context(|| {
            format!(
                "training patient model from {}",
                config.datasets.patients.display()
            )
        })?;
        let drugs = RequirementPredictor::open(&config.datasets.drugs).with_context(|| {
            format!(
                "training drug requirement model from {}",
                config.datasets.drugs.display()
            )
        })?;
        let opd = PriorityModel::load_expecting(&config.models.opd, OpdPriorityRequest::FEATURES.len())
            .with_context(|| format!("loading OPD model {}", config.models.opd.display()))?;
        let bed = PriorityModel::load_expecting(&config.models.bed, BedPriorityRequest::FEATURES.len())
            .with_context(|| format!("loading bed model {}", config.models.bed.display()))?;

        info!("predictors ready");
        Ok(Self::new(patients, drugs, opd, bed))
    }
}
