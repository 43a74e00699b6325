//! Persisted classifier and scaler.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::classifier::Knn;
use crate::opts::ArtifactOpts;
use crate::prelude::*;
use crate::reading::{Reading, Verdict};
use crate::scaler::StandardScaler;

/// Fitted scaler and classifier, immutable for the lifetime of the process.
pub struct Model {
    pub scaler: StandardScaler,
    pub classifier: Knn,
}

impl Model {
    /// Scales the raw reading and classifies it.
    pub fn classify(&self, reading: &Reading) -> Result<Verdict> {
        self.classifier.predict(&self.scaler.transform(&reading.features())?)
    }

    #[instrument(skip_all, fields(model = ?opts.model, scaler = ?opts.scaler))]
    pub fn load(opts: &ArtifactOpts) -> Result<Self> {
        let model = Self {
            classifier: read(&opts.model).context("failed to load the classifier")?,
            scaler: read(&opts.scaler).context("failed to load the scaler")?,
        };
        info!(
            n_neighbors = model.classifier.n_neighbors(),
            n_samples = model.classifier.n_samples(),
            "loaded",
        );
        Ok(model)
    }

    /// Stores both artifacts.
    ///
    /// Both are serialised and staged next to their targets before anything is replaced.
    /// Should the scaler fail to move into place, the previous classifier is put back.
    #[instrument(skip_all, fields(model = ?opts.model, scaler = ?opts.scaler))]
    pub fn save(&self, opts: &ArtifactOpts) -> Result {
        let classifier = serialize(&self.classifier).context("failed to serialize the classifier")?;
        let scaler = serialize(&self.scaler).context("failed to serialize the scaler")?;

        let staged_classifier = with_suffix(&opts.model, "tmp");
        let staged_scaler = with_suffix(&opts.scaler, "tmp");
        let result = stage(&staged_classifier, &classifier)
            .and_then(|_| stage(&staged_scaler, &scaler))
            .and_then(|_| commit(&staged_classifier, &opts.model, &staged_scaler, &opts.scaler));
        if result.is_err() {
            remove(&staged_classifier);
            remove(&staged_scaler);
        }
        result?;

        info!("saved");
        Ok(())
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_pickle::to_vec(value, Default::default())?)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut path = path.as_os_str().to_owned();
    path.push(".");
    path.push(suffix);
    PathBuf::from(path)
}

fn stage(path: &Path, blob: &[u8]) -> Result {
    fs::write(path, blob).with_context(|| format!("failed to write `{}`", path.display()))
}

/// Moves both staged files into place, restoring the previous classifier on failure.
fn commit(
    staged_classifier: &Path,
    classifier_path: &Path,
    staged_scaler: &Path,
    scaler_path: &Path,
) -> Result {
    let backup_path = with_suffix(classifier_path, "bak");
    let has_backup = match fs::rename(classifier_path, &backup_path) {
        Ok(_) => true,
        Err(error) if error.kind() == io::ErrorKind::NotFound => false,
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to back up `{}`", classifier_path.display()));
        }
    };

    let result = rename(staged_classifier, classifier_path).and_then(|_| rename(staged_scaler, scaler_path));
    if result.is_err() {
        let restored = if has_backup {
            fs::rename(&backup_path, classifier_path)
        } else {
            fs::remove_file(classifier_path)
        };
        match restored {
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => error!("failed to restore `{}`: {:#}", classifier_path.display(), error),
        }
    } else if has_backup {
        remove(&backup_path);
    }
    result
}

fn rename(from: &Path, to: &Path) -> Result {
    fs::rename(from, to).with_context(|| format!("failed to move the artifact into `{}`", to.display()))
}

/// Removes a leftover file, if any.
fn remove(path: &Path) {
    match fs::remove_file(path) {
        Ok(_) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => warn!("failed to remove `{}`: {:#}", path.display(), error),
    }
}

fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let blob = fs::read(path).with_context(|| format!("failed to read `{}`", path.display()))?;
    serde_pickle::from_slice(&blob, Default::default())
        .with_context(|| format!("failed to deserialize `{}`", path.display()))
}
