//! K-nearest neighbours classifier over the scaled feature space.
//!
//! The estimator does not persist itself, so the training set is kept alongside and the
//! estimator is refitted on load.

use aprender::classification::KNearestNeighbors;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::prelude::*;
use crate::reading::{as_classes, to_matrix, Features, Verdict};

/// Persisted part of the classifier: the training set and the neighbour count.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FittedKnn {
    pub n_neighbors: usize,
    pub points: Vec<Features>,
    pub labels: Vec<Verdict>,
}

pub struct Knn {
    fitted: FittedKnn,
    estimator: KNearestNeighbors,
}

impl Knn {
    pub fn fit(n_neighbors: usize, points: Vec<Features>, labels: Vec<Verdict>) -> Result<Self> {
        Self::try_from(FittedKnn {
            n_neighbors,
            points,
            labels,
        })
    }

    pub const fn n_neighbors(&self) -> usize {
        self.fitted.n_neighbors
    }

    pub fn n_samples(&self) -> usize {
        self.fitted.points.len()
    }

    pub fn predict(&self, point: &Features) -> Result<Verdict> {
        self.predict_all(std::slice::from_ref(point))?
            .pop()
            .ok_or_else(|| anyhow!("the estimator returned no predictions"))
    }

    pub fn predict_all(&self, points: &[Features]) -> Result<Vec<Verdict>> {
        if let Some(point) = points.iter().find(|point| !is_finite(point)) {
            bail!("non-finite features: {:?}", point);
        }
        let shares = self
            .estimator
            .predict_proba(&to_matrix(points)?)
            .context("nearest neighbour search has failed")?;

        // A tied vote goes to the smaller label.
        Ok(shares
            .iter()
            .map(|shares| match shares.as_slice() {
                [not_feasible, feasible, ..] if feasible > not_feasible => Verdict::Feasible,
                _ => Verdict::NotFeasible,
            })
            .collect())
    }
}

impl TryFrom<FittedKnn> for Knn {
    type Error = anyhow::Error;

    fn try_from(fitted: FittedKnn) -> Result<Self> {
        if fitted.n_neighbors == 0 {
            bail!("the neighbour count must be positive");
        }
        if fitted.points.len() != fitted.labels.len() {
            bail!(
                "got {} points but {} labels",
                fitted.points.len(),
                fitted.labels.len(),
            );
        }
        if let Some(index) = fitted.points.iter().position(|point| !is_finite(point)) {
            bail!("point #{} has non-finite features: {:?}", index, fitted.points[index]);
        }

        let mut estimator = KNearestNeighbors::new(fitted.n_neighbors);
        estimator
            .fit(&to_matrix(&fitted.points)?, &as_classes(&fitted.labels))
            .with_context(|| format!("failed to fit {} neighbours", fitted.n_neighbors))?;
        Ok(Self { fitted, estimator })
    }
}

/// Checked in the `f32` space the estimator works in.
fn is_finite(point: &Features) -> bool {
    point.iter().all(|x| (*x as f32).is_finite())
}

impl Serialize for Knn {
    fn serialize<S: Serializer>(&self, serializer: S) -> StdResult<S::Ok, S::Error> {
        self.fitted.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Knn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> StdResult<Self, D::Error> {
        Self::try_from(FittedKnn::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}
