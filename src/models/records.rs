use serde::{Deserialize, Serialize};

use crate::error::PredictionError;

/// One row of the patient-count dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "Month")]
    pub month: String,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Number")]
    pub number: i64,
}

impl PatientRecord {
    pub fn new(month: impl Into<String>, department: impl Into<String>, number: i64) -> Self {
        Self {
            month: month.into(),
            department: department.into(),
            number,
        }
    }
}

/// One row of the drug-consumption dataset.
///
/// `amount` is kept as written in the file; spreadsheets exported with
/// thousands separators ("1,500") are common in this data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugRecord {
    #[serde(rename = "Month_name")]
    pub month: String,
    #[serde(rename = "Item_name")]
    pub item: String,
    #[serde(rename = "Amount")]
    pub amount: String,
}

impl DrugRecord {
    pub fn new(month: impl Into<String>, item: impl Into<String>, amount: f64) -> Self {
        Self {
            month: month.into(),
            item: item.into(),
            amount: format_amount(amount),
        }
    }

    /// Parsed amount, or `None` when the row should be dropped from training.
    pub fn usable_amount(&self) -> Option<f64> {
        parse_amount(&self.amount)
            .ok()
            .filter(|amount| *amount > 0.0)
    }
}

/// Parses an amount, ignoring thousands separators.
pub fn parse_amount(raw: &str) -> Result<f64, PredictionError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| PredictionError::InvalidAmount(raw.to_string()))
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{}", amount as i64)
    } else {
        amount.to_string()
    }
}

/// Rows written when the drug dataset does not exist yet.
pub fn initial_drug_records() -> Vec<DrugRecord> {
    vec![
        DrugRecord::new("January", "Drug A", 1000.0),
        DrugRecord::new("January", "Drug B", 1500.0),
        DrugRecord::new("January", "Drug C", 2000.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1000", Some(1000.0))]
    #[test_case("1,250", Some(1250.0))]
    #[test_case(" 12.5 ", Some(12.5))]
    #[test_case("0", None; "zero is dropped")]
    #[test_case("-4", None; "negative is dropped")]
    #[test_case("n/a", None; "garbage is dropped")]
    #[test_case("", None; "empty is dropped")]
    fn usable_amounts(raw: &str, expected: Option<f64>) {
        let record = DrugRecord {
            month: "March".into(),
            item: "Paracetamol".into(),
            amount: raw.into(),
        };
        assert_eq!(record.usable_amount(), expected);
    }

    #[test]
    fn whole_amounts_are_written_without_decimals() {
        assert_eq!(DrugRecord::new("May", "Drug A", 1500.0).amount, "1500");
        assert_eq!(DrugRecord::new("May", "Drug A", 12.5).amount, "12.5");
    }
}
