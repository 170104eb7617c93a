//! Feature transforms fitted alongside each model.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Centers each column on its mean and divides by its population standard
/// deviation. Constant columns are only centered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: ArrayView2<'_, f64>) -> Self {
        let n_features = data.ncols();
        let mut mean = Array1::zeros(n_features);
        let mut scale = Array1::ones(n_features);

        if data.nrows() == 0 {
            return Self { mean, scale };
        }

        for (idx, column) in data.axis_iter(Axis(1)).enumerate() {
            let n = column.len() as f64;
            let col_mean = column.sum() / n;
            let variance = column.iter().map(|x| (x - col_mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();

            mean[idx] = col_mean;
            scale[idx] = if std > f64::EPSILON { std } else { 1.0 };
        }

        Self { mean, scale }
    }

    pub fn transform(&self, data: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut scaled = data.to_owned();
        for mut row in scaled.axis_iter_mut(Axis(0)) {
            row -= &self.mean;
            row /= &self.scale;
        }
        scaled
    }

    pub fn transform_row(&self, row: ArrayView1<'_, f64>) -> Array1<f64> {
        (&row - &self.mean) / &self.scale
    }

    pub fn fit_transform(data: ArrayView2<'_, f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(data);
        let scaled = scaler.transform(data);
        (scaler, scaled)
    }
}

/// Replaces NaN entries with the per-column median learned at fit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedianImputer {
    pub statistics: Array1<f64>,
}

impl MedianImputer {
    pub fn fit(data: ArrayView2<'_, f64>) -> Self {
        let statistics = data
            .axis_iter(Axis(1))
            .map(|column| {
                let mut present: Vec<f64> = column.iter().copied().filter(|x| !x.is_nan()).collect();
                median(&mut present).unwrap_or(0.0)
            })
            .collect();
        Self { statistics }
    }

    pub fn transform(&self, data: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut filled = data.to_owned();
        for mut row in filled.axis_iter_mut(Axis(0)) {
            self.fill(row.view_mut());
        }
        filled
    }

    pub fn transform_row(&self, row: ArrayView1<'_, f64>) -> Array1<f64> {
        let mut filled = row.to_owned();
        self.fill(filled.view_mut());
        filled
    }

    fn fill(&self, mut row: ndarray::ArrayViewMut1<'_, f64>) {
        for (value, stat) in row.iter_mut().zip(self.statistics.iter()) {
            if value.is_nan() {
                *value = *stat;
            }
        }
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Maps each distinct label to its index in sorted order.
///
/// The mapping depends on the labels seen at fit time, so codes shift when a
/// new label sorts before existing ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            classes: sorted_distinct(labels),
        }
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(label))
            .ok()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// One-hot layout over the sorted distinct values of a categorical column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotSchema {
    categories: Vec<String>,
}

impl OneHotSchema {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            categories: sorted_distinct(values),
        }
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.position(value).is_some()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Indicator vector for `value`; all zeros when the value is unknown.
    pub fn encode(&self, value: &str) -> Vec<f64> {
        let mut encoded = vec![0.0; self.width()];
        if let Some(idx) = self.position(value) {
            encoded[idx] = 1.0;
        }
        encoded
    }

    fn position(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|category| category.as_str().cmp(value))
            .ok()
    }
}

fn sorted_distinct<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut distinct: Vec<String> = values.into_iter().map(str::to_string).collect();
    distinct.sort();
    distinct.dedup();
    distinct
}
