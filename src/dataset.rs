//! Labelled training dataset and its stratified train/test split.

use std::cmp::Reverse;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use crate::prelude::*;
use crate::reading::{Features, Reading, Verdict};

pub const REQUIRED_COLUMNS: [&str; 4] = ["temperature", "humidity", "ph", "classification"];

#[derive(Deserialize)]
struct Row {
    temperature: f64,
    humidity: f64,
    ph: f64,
    classification: String,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Dataset {
    pub features: Vec<Features>,
    pub labels: Vec<Verdict>,
}

/// Stratified partition along with the original row indices.
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl Dataset {
    #[instrument(skip_all, fields(path = ?path))]
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open the dataset `{}`", path.display()))?;
        let dataset = Self::from_reader(file)?;
        info!(n_samples = dataset.len(), n_feasible = dataset.count(Verdict::Feasible), "loaded");
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

        let headers = reader.headers().context("failed to read the CSV header")?;
        let missing_columns = REQUIRED_COLUMNS
            .iter()
            .filter(|column| !headers.iter().any(|header| header == **column))
            .join(", ");
        if !missing_columns.is_empty() {
            bail!(
                "CSV must contain `{}` columns, missing: {}",
                REQUIRED_COLUMNS.join("`, `"),
                missing_columns,
            );
        }

        let mut dataset = Self::default();
        for (index, row) in reader.deserialize::<Row>().enumerate() {
            // The header takes the first line.
            let line = index + 2;
            let row = row.with_context(|| format!("failed to parse line #{}", line))?;
            let label = Verdict::from_label(&row.classification).ok_or_else(|| {
                anyhow!(
                    "line #{}: unrecognised classification {:?}, expected \"Layak\" or \"Tidak Layak\"",
                    line,
                    row.classification,
                )
            })?;
            dataset
                .features
                .push(Reading::new(row.temperature, row.humidity, row.ph).features());
            dataset.labels.push(label);
        }

        if dataset.is_empty() {
            bail!("the dataset is empty");
        }
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn count(&self, label: Verdict) -> usize {
        self.labels.iter().filter(|other| **other == label).count()
    }

    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|index| self.features[*index]).collect(),
            labels: indices.iter().map(|index| self.labels[*index]).collect(),
        }
    }

    /// Randomly partitions the dataset, preserving the class proportions in both parts.
    ///
    /// The test partition takes `ceil(test_size * n)` samples in total, shared between the classes
    /// in proportion to their sizes. The partition depends only on the labels and the seed.
    #[instrument(level = "debug", skip(self))]
    pub fn split(&self, test_size: f64, seed: u64) -> Result<Split> {
        debug_assert!(test_size > 0.0 && test_size < 1.0);

        let class_indices = Verdict::ALL.map(|label| {
            (0..self.len())
                .filter(|index| self.labels[*index] == label)
                .collect::<Vec<usize>>()
        });
        for (label, indices) in Verdict::ALL.iter().zip(&class_indices) {
            if indices.len() < 2 {
                bail!(
                    "the class `{}` has {} samples, at least 2 are needed to stratify",
                    label,
                    indices.len(),
                );
            }
        }
        let class_sizes = class_indices.each_ref().map(Vec::len);
        let n_test = ((test_size * self.len() as f64).ceil() as usize)
            .clamp(Verdict::ALL.len(), self.len() - Verdict::ALL.len());
        let allocation = allocate(n_test, &class_sizes);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_indices = Vec::new();
        let mut test_indices = Vec::new();
        for (mut indices, n_class_test) in class_indices.into_iter().zip(allocation) {
            indices.shuffle(&mut rng);
            test_indices.extend_from_slice(&indices[..n_class_test]);
            train_indices.extend_from_slice(&indices[n_class_test..]);
        }

        train_indices.shuffle(&mut rng);
        test_indices.shuffle(&mut rng);
        debug!(n_train = train_indices.len(), n_test = test_indices.len());

        Ok(Split {
            train: self.subset(&train_indices),
            test: self.subset(&test_indices),
            train_indices,
            test_indices,
        })
    }
}

/// Shares `n_total` out between the classes proportionally to their sizes.
///
/// Floors first, then the leftovers go to the largest remainders, and ties go to the larger class.
/// Every class keeps at least one sample on either side.
fn allocate<const N: usize>(n_total: usize, class_sizes: &[usize; N]) -> [usize; N] {
    let n_samples: usize = class_sizes.iter().sum();
    let mut allocation = class_sizes.map(|size| size * n_total / n_samples);

    let n_left = n_total - allocation.iter().sum::<usize>();
    let mut by_remainder: Vec<usize> = (0..N).collect();
    by_remainder.sort_by_key(|class| {
        let remainder = class_sizes[*class] * n_total % n_samples;
        (Reverse(remainder), Reverse(class_sizes[*class]), *class)
    });
    for class in by_remainder.into_iter().take(n_left) {
        allocation[class] += 1;
    }

    for class in 0..N {
        if allocation[class] == 0 {
            let donor = (0..N)
                .filter(|donor| allocation[*donor] > 1)
                .max_by_key(|donor| allocation[*donor]);
            if let Some(donor) = donor {
                allocation[donor] -= 1;
                allocation[class] += 1;
            }
        } else if allocation[class] == class_sizes[class] {
            let receiver = (0..N)
                .filter(|receiver| allocation[*receiver] + 1 < class_sizes[*receiver])
                .max_by_key(|receiver| class_sizes[*receiver] - allocation[*receiver]);
            if let Some(receiver) = receiver {
                allocation[class] -= 1;
                allocation[receiver] += 1;
            }
        }
    }
    allocation
}
