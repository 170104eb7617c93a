//! Small numeric toolkit used by the predictors: preprocessing transforms,
//! a seeded random-forest regressor, and train/test splitting.

pub mod forest;
pub mod preprocessing;
pub mod split;

pub use forest::{ForestParams, RandomForestRegressor};
pub use preprocessing::{LabelEncoder, MedianImputer, OneHotSchema, StandardScaler};
pub use split::{mean_squared_error, r2_score, train_test_split, TrainTestSplit};

/// Seed shared by every split and forest so retrains are reproducible.
pub const DEFAULT_SEED: u64 = 42;
