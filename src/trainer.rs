//! Fits the harvest readiness classifier on a labelled dataset.
//!
//! Loads the CSV, splits it into stratified training and test partitions, standardises the features,
//! picks the neighbour count via cross-validation, evaluates the result on the test partition,
//! and stores the fitted classifier along with the scaler.

use crate::artifacts::Model;
use crate::classifier::Knn;
use crate::dataset::Dataset;
use crate::opts::TrainOpts;
use crate::prelude::*;
use crate::reading::Verdict;
use crate::scaler::StandardScaler;
use crate::trainer::metrics::Evaluation;

pub mod grid_search;
pub mod metrics;

pub struct Outcome {
    pub model: Model,
    pub evaluation: Evaluation,

    /// Test partition predictions, in the order of [`Outcome::test_indices`].
    pub test_predictions: Vec<Verdict>,

    /// Dataset row indices of the test partition.
    pub test_indices: Vec<usize>,
}

pub fn run(opts: &TrainOpts) -> Result {
    sentry::configure_scope(|scope| scope.set_tag("app", "train"));

    let dataset = Dataset::from_path(&opts.dataset)?;
    let outcome = fit(&dataset, opts)?;
    print_evaluation(&outcome.evaluation);
    outcome.model.save(&opts.artifacts)?;
    println!("Model saved to {}", opts.artifacts.model.display());
    println!("Scaler saved to {}", opts.artifacts.scaler.display());
    Ok(())
}

/// Runs the whole pipeline in memory, nothing is written.
#[instrument(skip_all, fields(n_samples = dataset.len()))]
pub fn fit(dataset: &Dataset, opts: &TrainOpts) -> Result<Outcome> {
    let split = dataset.split(opts.test_size, opts.seed)?;
    info!(n_train = split.train.len(), n_test = split.test.len(), "split");

    let scaler = StandardScaler::fit(&split.train.features)?;
    let train_features = scaler.transform_all(&split.train.features)?;
    let test_features = scaler.transform_all(&split.test.features)?;
    let scaled_train = Dataset {
        features: train_features,
        labels: split.train.labels,
    };

    let search = grid_search::run(&scaled_train, opts.max_neighbors, opts.folds)?;
    let classifier = Knn::fit(search.best.n_neighbors, scaled_train.features, scaled_train.labels)?;

    let test_predictions = classifier.predict_all(&test_features)?;
    let evaluation = Evaluation::new(&split.test.labels, &test_predictions)?;
    info!(
        accuracy = evaluation.accuracy,
        precision = evaluation.positive().precision,
        recall = evaluation.positive().recall,
        f1 = evaluation.positive().f1,
        "evaluated",
    );

    Ok(Outcome {
        model: Model { scaler, classifier },
        evaluation,
        test_predictions,
        test_indices: split.test_indices,
    })
}

fn print_evaluation(evaluation: &Evaluation) {
    println!("Accuracy: {:.4}\n", evaluation.accuracy);
    println!("Confusion Matrix:\n{}\n", evaluation.confusion_matrix);
    println!("Classification Report:\n{}", evaluation.report());
    println!("Evaluation Metrics Table:\n{}", evaluation.table());
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::dataset::tests::synthetic_csv;
    use crate::opts::ArtifactOpts;
    use crate::reading::Reading;

    fn train_opts(directory: &std::path::Path) -> TrainOpts {
        TrainOpts {
            artifacts: ArtifactOpts {
                model: directory.join("knn_model.pickle"),
                scaler: directory.join("scaler.pickle"),
            },
            dataset: directory.join("dataset.csv"),
            test_size: 0.3,
            seed: 101,
            max_neighbors: 20,
            folds: 5,
        }
    }

    #[test]
    fn fit_is_deterministic() -> Result {
        let directory = tempfile::tempdir()?;
        let opts = train_opts(directory.path());
        let dataset = Dataset::from_reader(synthetic_csv(90).as_bytes())?;

        let left = fit(&dataset, &opts)?;
        let right = fit(&dataset, &opts)?;
        assert_eq!(left.model.classifier.n_neighbors(), right.model.classifier.n_neighbors());
        assert_eq!(left.evaluation.confusion_matrix, right.evaluation.confusion_matrix);
        assert!((left.evaluation.accuracy - right.evaluation.accuracy).abs() < f64::EPSILON);
        assert_eq!(left.model.scaler, right.model.scaler);
        assert_eq!(left.test_indices, right.test_indices);
        Ok(())
    }

    #[test]
    fn scaler_ignores_test_partition() -> Result {
        let directory = tempfile::tempdir()?;
        let opts = train_opts(directory.path());
        let dataset = Dataset::from_reader(synthetic_csv(60).as_bytes())?;
        let original = fit(&dataset, &opts)?;

        let mut perturbed = dataset.clone();
        for index in &original.test_indices {
            perturbed.features[*index] = [1000.0, -1000.0, 14.0];
        }
        let perturbed = fit(&perturbed, &opts)?;
        assert_eq!(original.model.scaler, perturbed.model.scaler);
        Ok(())
    }

    #[test]
    fn raw_rows_reproduce_evaluation_predictions() -> Result {
        let directory = tempfile::tempdir()?;
        let opts = train_opts(directory.path());
        let dataset = Dataset::from_reader(synthetic_csv(60).as_bytes())?;
        let outcome = fit(&dataset, &opts)?;

        for (index, expected) in outcome.test_indices.iter().zip(&outcome.test_predictions) {
            let [temperature, humidity, ph] = dataset.features[*index];
            let verdict = outcome.model.classify(&Reading::new(temperature, humidity, ph))?;
            assert_eq!(verdict, *expected);
        }
        Ok(())
    }

    #[test]
    fn run_ok() -> Result {
        let directory = tempfile::tempdir()?;
        let opts = train_opts(directory.path());
        fs::write(&opts.dataset, synthetic_csv(60))?;
        run(&opts)?;

        let model = Model::load(&opts.artifacts)?;
        assert_eq!(model.classify(&Reading::new(55.0, 20.0, 7.2))?, Verdict::Feasible);
        assert_eq!(model.classify(&Reading::new(30.0, 45.0, 5.5))?, Verdict::NotFeasible);
        Ok(())
    }

    #[test]
    fn missing_column_writes_no_artifacts() -> Result {
        let directory = tempfile::tempdir()?;
        let opts = train_opts(directory.path());
        fs::write(&opts.dataset, "temperature,humidity,classification\n55,20,Layak\n")?;

        let error = run(&opts).unwrap_err();
        assert!(format!("{:#}", error).contains("ph"));
        assert!(!opts.artifacts.model.exists());
        assert!(!opts.artifacts.scaler.exists());
        Ok(())
    }
}
