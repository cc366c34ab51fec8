//! JSON files for reference sets, sample stores and captured landmarks.
//!
//! Loaded files are validated on the way in: every key must be a label
//! A-Z and every descriptor must hold `DESCRIPTOR_LEN` values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::detection::{DetectionConfig, DetectionFrame};
use crate::label::Label;
use crate::landmark::{Hand, Landmark, Pose};
use crate::matcher::{Descriptor, DESCRIPTOR_LEN};
use crate::reference::{ReferenceSet, SampleStore};

/// Errors reading or writing persisted data.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: invalid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: descriptor for {label} has {got} values, expected {expected}", path.display())]
    DescriptorLength {
        path: PathBuf,
        label: Label,
        expected: usize,
        got: usize,
    },

    #[error("{}: no usable hand in detection frame", path.display())]
    NoHand { path: PathBuf },

    #[error("{}: {source}", path.display())]
    Pose {
        path: PathBuf,
        #[source]
        source: crate::error::MatchError,
    },
}

pub type Result<T> = std::result::Result<T, PersistError>;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn check_len(path: &Path, label: &Label, descriptor: &Descriptor) -> Result<()> {
    if descriptor.len() != DESCRIPTOR_LEN {
        return Err(PersistError::DescriptorLength {
            path: path.to_path_buf(),
            label: *label,
            expected: DESCRIPTOR_LEN,
            got: descriptor.len(),
        });
    }
    Ok(())
}

// ── Reference sets ─────────────────────────────────────────

/// Load a reference set, e.g. `{"A": [63 numbers], "B": [...]}`.
pub fn load_reference_set(path: &Path) -> Result<ReferenceSet> {
    let set: ReferenceSet = read_json(path)?;
    for (label, descriptor) in set.iter() {
        check_len(path, label, descriptor)?;
    }
    info!(path = %path.display(), labels = set.len(), "reference set loaded");
    Ok(set)
}

pub fn save_reference_set(path: &Path, set: &ReferenceSet) -> Result<()> {
    write_json(path, set)?;
    info!(path = %path.display(), labels = set.len(), "reference set saved");
    Ok(())
}

// ── Sample stores ──────────────────────────────────────────

/// Load a sample store, e.g. `{"A": [[63 numbers], [63 numbers]]}`.
pub fn load_sample_store(path: &Path) -> Result<SampleStore> {
    let store: SampleStore = read_json(path)?;
    for (label, _) in store.counts() {
        for descriptor in store.samples(label) {
            check_len(path, label, descriptor)?;
        }
    }
    info!(
        path = %path.display(),
        labels = store.label_count(),
        samples = store.total_samples(),
        "sample store loaded"
    );
    Ok(store)
}

pub fn save_sample_store(path: &Path, store: &SampleStore) -> Result<()> {
    write_json(path, store)
}

// ── Landmarks ──────────────────────────────────────────────

/// Load one pose from either a bare landmark array
/// (`[{"x":..,"y":..,"z":..}, ...]`) or a detector results frame, in which
/// case the first accepted hand is used.
pub fn load_pose(path: &Path, config: &DetectionConfig) -> Result<Pose> {
    let value: serde_json::Value = read_json(path)?;
    let to_json_err = |source: serde_json::Error| PersistError::Json {
        path: path.to_path_buf(),
        source,
    };

    if value.is_array() {
        let landmarks: Vec<Landmark> = serde_json::from_value(value).map_err(to_json_err)?;
        return Pose::from_landmarks(landmarks).map_err(|source| PersistError::Pose {
            path: path.to_path_buf(),
            source,
        });
    }

    let frame: DetectionFrame = serde_json::from_value(value).map_err(to_json_err)?;
    let detection = frame.primary(config).ok_or_else(|| PersistError::NoHand {
        path: path.to_path_buf(),
    })?;
    debug!(
        path = %path.display(),
        hand = hand_name(detection.hand),
        score = detection.score,
        "using detected hand"
    );
    Ok(detection.pose)
}

fn hand_name(hand: Option<Hand>) -> &'static str {
    hand.as_ref().map(Hand::as_str).unwrap_or("unknown")
}

// ── Tests ──────────────────────────────────────────────────
