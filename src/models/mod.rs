//! Domain types shared by the store, predictors and HTTP layer.

pub mod month;
pub mod records;
pub mod requests;

pub use month::Month;
pub use records::{DrugRecord, PatientRecord};
