use std::fmt::{Display, Formatter};

use aprender::primitives::Matrix;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DeserializeAs, DisplayFromStr, PickFirst};

use crate::prelude::*;

/// Feature vector in the fixed `[temperature, humidity, ph]` order.
pub type Features = [f64; Reading::N_FEATURES];

/// Packs the rows into the `f32` matrix the estimators operate on.
pub fn to_matrix(rows: &[Features]) -> Result<Matrix<f32>> {
    let values = rows.iter().flatten().map(|x| *x as f32).collect();
    Matrix::from_vec(rows.len(), Reading::N_FEATURES, values).map_err(|error| anyhow!(error))
}

pub fn from_matrix(matrix: &Matrix<f32>) -> Vec<Features> {
    (0..matrix.n_rows())
        .map(|row| [0, 1, 2].map(|column| f64::from(matrix.get(row, column))))
        .collect()
}

/// Class indices as the estimators and metrics expect them.
pub fn as_classes(labels: &[Verdict]) -> Vec<usize> {
    labels.iter().map(|label| usize::from(label.as_u8())).collect()
}

/// Reads `true` and `false` as `1.0` and `0.0`.
struct BoolAsNumber;

impl<'de> DeserializeAs<'de, f64> for BoolAsNumber {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> StdResult<f64, D::Error> {
        Ok(if bool::deserialize(deserializer)? { 1.0 } else { 0.0 })
    }
}

/// Single sensor reading from the biodrying chamber.
///
/// Missing fields default to zero, numeric strings and booleans are accepted as well.
#[serde_as]
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Default)]
pub struct Reading {
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr, BoolAsNumber)>")]
    pub temperature: f64,

    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr, BoolAsNumber)>")]
    pub humidity: f64,

    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr, BoolAsNumber)>")]
    pub ph: f64,
}

impl Reading {
    pub const N_FEATURES: usize = 3;

    pub const fn new(temperature: f64, humidity: f64, ph: f64) -> Self {
        Self {
            temperature,
            humidity,
            ph,
        }
    }

    /// Parses an inbound JSON body, which must be a JSON object.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<Value>(body).context("malformed JSON")? {
            value @ Value::Object(_) => serde_json::from_value(value).context("invalid reading"),
            _ => Err(anyhow!("expected a JSON object")),
        }
    }

    pub const fn features(&self) -> Features {
        [self.temperature, self.humidity, self.ph]
    }
}

/// Harvest readiness class. Doubles as the training label and the classifier output.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verdict {
    NotFeasible,
    Feasible,
}

impl Verdict {
    pub const ALL: [Self; 2] = [Self::NotFeasible, Self::Feasible];

    /// Parses the label as it appears in the training dataset.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Layak" => Some(Self::Feasible),
            "Tidak Layak" => Some(Self::NotFeasible),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::NotFeasible => 0,
            Self::Feasible => 1,
        }
    }

    pub const fn is_feasible(self) -> bool {
        matches!(self, Self::Feasible)
    }
}

impl Display for Verdict {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Feasible => formatter.write_str("Layak"),
            Self::NotFeasible => formatter.write_str("Belum Layak"),
        }
    }
}
