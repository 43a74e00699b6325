//! Feature standardisation.

use aprender::preprocessing;
use aprender::traits::Transformer;
use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::reading::{from_matrix, to_matrix, Features, Reading};

/// Zero-mean, unit-variance transform fitted once on the training partition.
///
/// Constant features are only centred.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(try_from = "preprocessing::StandardScaler", into = "preprocessing::StandardScaler")]
pub struct StandardScaler(preprocessing::StandardScaler);

impl StandardScaler {
    #[instrument(level = "debug", skip_all, fields(n_rows = rows.len()))]
    pub fn fit(rows: &[Features]) -> Result<Self> {
        if rows.is_empty() {
            bail!("cannot fit the scaler on an empty set");
        }
        let mut inner = preprocessing::StandardScaler::new();
        inner.fit(&to_matrix(rows)?).context("failed to fit the scaler")?;
        debug!(mean = ?inner.mean(), std = ?inner.std(), "fitted");
        Ok(Self(inner))
    }

    pub fn mean(&self) -> &[f32] {
        self.0.mean()
    }

    /// Population standard deviation.
    pub fn std(&self) -> &[f32] {
        self.0.std()
    }

    pub fn transform(&self, row: &Features) -> Result<Features> {
        self.transform_all(std::slice::from_ref(row))?
            .pop()
            .ok_or_else(|| anyhow!("the scaler returned no rows"))
    }

    pub fn transform_all(&self, rows: &[Features]) -> Result<Vec<Features>> {
        let scaled = self.0.transform(&to_matrix(rows)?).context("failed to scale the features")?;
        Ok(from_matrix(&scaled))
    }
}

impl PartialEq for StandardScaler {
    fn eq(&self, other: &Self) -> bool {
        self.mean() == other.mean() && self.std() == other.std()
    }
}

impl TryFrom<preprocessing::StandardScaler> for StandardScaler {
    type Error = anyhow::Error;

    fn try_from(inner: preprocessing::StandardScaler) -> Result<Self> {
        if !inner.is_fitted() {
            bail!("the scaler is not fitted");
        }
        if inner.mean().len() != Reading::N_FEATURES || inner.std().len() != Reading::N_FEATURES {
            bail!("expected {} features, got {}", Reading::N_FEATURES, inner.mean().len());
        }
        Ok(Self(inner))
    }
}

impl From<StandardScaler> for preprocessing::StandardScaler {
    fn from(scaler: StandardScaler) -> Self {
        scaler.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(left: f64, right: f64) {
        assert!((left - right).abs() < 1e-5, "{} != {}", left, right);
    }

    #[test]
    fn fit_ok() -> Result {
        let scaler = StandardScaler::fit(&[[1.0, 10.0, 7.0], [3.0, 30.0, 7.0]])?;
        assert_eq!(scaler.mean(), [2.0, 20.0, 7.0]);
        assert_eq!(scaler.std(), [1.0, 10.0, 0.0]);
        Ok(())
    }

    #[test]
    fn transform_ok() -> Result {
        let scaler = StandardScaler::fit(&[[1.0, 10.0, 7.0], [3.0, 30.0, 7.0]])?;
        let scaled = scaler.transform(&[3.0, 0.0, 8.0])?;
        assert_close(scaled[0], 1.0);
        assert_close(scaled[1], -2.0);
        assert_close(scaled[2], 1.0);
        Ok(())
    }

    #[test]
    fn transformed_training_set_is_standardised() -> Result {
        let rows = [[45.0, 20.0, 7.1], [60.0, 35.0, 6.0], [38.0, 18.0, 8.9], [52.0, 22.0, 7.5]];
        let scaler = StandardScaler::fit(&rows)?;
        let scaled = scaler.transform_all(&rows)?;
        for feature in 0..Reading::N_FEATURES {
            let mean = scaled.iter().map(|row| row[feature]).sum::<f64>() / 4.0;
            let variance = scaled.iter().map(|row| row[feature] * row[feature]).sum::<f64>() / 4.0;
            assert_close(mean, 0.0);
            assert_close(variance, 1.0);
        }
        Ok(())
    }

    #[test]
    fn fit_empty_fails() {
        assert!(StandardScaler::fit(&[]).is_err());
    }

    #[test]
    fn unfitted_scaler_is_rejected() {
        assert!(StandardScaler::try_from(preprocessing::StandardScaler::new()).is_err());
    }
}
