//! Exhaustive neighbour count search via stratified cross-validation.

use aprender::metrics::classification::accuracy;
use aprender::model_selection::{CrossValidationResult, StratifiedKFold};
use aprender::primitives::Vector;

use crate::classifier::Knn;
use crate::dataset::Dataset;
use crate::prelude::*;
use crate::reading::{as_classes, Verdict};

#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub n_neighbors: usize,

    /// Mean validation accuracy across the folds, `NaN` if any fold failed.
    pub mean_score: f64,

    pub std_score: f64,
}

pub struct GridSearch {
    pub candidates: Vec<Candidate>,
    pub best: Candidate,
}

/// Scores every neighbour count from `1` to `max_neighbors` and picks the best one.
/// Ties go to the smaller neighbour count.
#[instrument(skip(train), fields(n_samples = train.len()))]
pub fn run(train: &Dataset, max_neighbors: usize, n_folds: usize) -> Result<GridSearch> {
    if n_folds < 2 || n_folds > train.len() {
        bail!("cannot split {} samples into {} folds", train.len(), n_folds);
    }
    let fold_splits: Vec<(Dataset, Dataset)> = fold_indices(&train.labels, n_folds)
        .into_iter()
        .map(|(train_indices, validation_indices)| {
            (train.subset(&train_indices), train.subset(&validation_indices))
        })
        .collect();

    let mut candidates = Vec::with_capacity(max_neighbors);
    for n_neighbors in 1..=max_neighbors {
        let result = CrossValidationResult {
            scores: fold_splits
                .iter()
                .map(|(train, validation)| score(n_neighbors, train, validation))
                .collect(),
        };
        let candidate = Candidate {
            n_neighbors,
            mean_score: f64::from(result.mean()),
            std_score: f64::from(result.std()),
        };
        debug!(
            candidate.n_neighbors,
            candidate.mean_score,
            candidate.std_score,
            "cross-validated",
        );
        candidates.push(candidate);
    }

    let best = candidates
        .iter()
        .filter(|candidate| !candidate.mean_score.is_nan())
        .fold(None, |best: Option<&Candidate>, candidate| match best {
            Some(best) if best.mean_score >= candidate.mean_score => Some(best),
            _ => Some(candidate),
        })
        .copied()
        .ok_or_else(|| anyhow!("no neighbour count could be cross-validated"))?;
    info!(best.n_neighbors, best.mean_score, "best parameters found");

    Ok(GridSearch { candidates, best })
}

/// Stratified `(train, validation)` index pairs in ascending order, so that the folds
/// do not depend on the splitter's internal class ordering.
fn fold_indices(labels: &[Verdict], n_folds: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    let labels = Vector::from_vec(labels.iter().map(|label| f32::from(label.as_u8())).collect());
    StratifiedKFold::new(n_folds)
        .split(&labels)
        .into_iter()
        .map(|(mut train_indices, mut validation_indices)| {
            train_indices.sort_unstable();
            validation_indices.sort_unstable();
            (train_indices, validation_indices)
        })
        .collect()
}

/// Validation accuracy of a single fold, `NaN` when the candidate cannot be evaluated.
fn score(n_neighbors: usize, train: &Dataset, validation: &Dataset) -> f32 {
    if validation.is_empty() {
        warn!(n_neighbors, "empty validation fold");
        return f32::NAN;
    }
    let result = Knn::fit(n_neighbors, train.features.clone(), train.labels.clone())
        .and_then(|knn| knn.predict_all(&validation.features));
    match result {
        Ok(predicted) => accuracy(&as_classes(&predicted), &as_classes(&validation.labels)),
        Err(error) => {
            warn!(n_neighbors, "fold could not be evaluated: {:#}", error);
            f32::NAN
        }
    }
}
