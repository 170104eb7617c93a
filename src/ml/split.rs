use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices for the training and held-out partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffles `0..n` with a seeded RNG and holds out `ceil(n * test_size)`
/// rows. At least one row always stays in the training partition; with
/// fewer than two rows nothing is held out.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> TrainTestSplit {
    let mut indices: Vec<usize> = (0..n).collect();
    if n < 2 {
        return TrainTestSplit {
            train: indices,
            test: Vec::new(),
        };
    }

    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64) * test_size.clamp(0.0, 1.0)).ceil() as usize;
    let n_test = n_test.min(n - 1);
    let train = indices.split_off(n_test);

    TrainTestSplit {
        train,
        test: indices,
    }
}

pub fn mean_squared_error(predicted: ArrayView1<'_, f64>, actual: ArrayView1<'_, f64>) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let diff = &predicted - &actual;
    diff.mapv(|d| d * d).sum() / actual.len() as f64
}

/// Coefficient of determination. Returns `None` when the targets are
/// constant or empty and the score is undefined.
pub fn r2_score(predicted: ArrayView1<'_, f64>, actual: ArrayView1<'_, f64>) -> Option<f64> {
    if actual.is_empty() {
        return None;
    }
    let mean = actual.sum() / actual.len() as f64;
    let total: f64 = actual.iter().map(|y| (y - mean).powi(2)).sum();
    if total <= f64::EPSILON {
        return None;
    }
    let residual: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, y)| (y - p).powi(2))
        .sum();
    Some(1.0 - residual / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn holds_out_twenty_percent_rounded_up() {
        let split = train_test_split(11, 0.2, 42);
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);

        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_partition() {
        assert_eq!(train_test_split(30, 0.2, 42), train_test_split(30, 0.2, 42));
    }

    #[test]
    fn tiny_datasets_keep_a_training_row() {
        assert!(train_test_split(1, 0.2, 42).test.is_empty());
        let split = train_test_split(2, 0.9, 42);
        assert_eq!(split.train.len(), 1);
        assert_eq!(split.test.len(), 1);
    }

    #[test]
    fn metrics() {
        let actual = array![1.0, 2.0, 3.0];
        let predicted = array![1.0, 2.0, 5.0];
        assert!((mean_squared_error(predicted.view(), actual.view()) - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(r2_score(actual.view(), actual.view()), Some(1.0));
        assert_eq!(r2_score(predicted.view(), array![2.0, 2.0, 2.0].view()), None);
    }
}
