//! Reference templates and the sample store they are averaged from.
//!
//! Recording appends normalized descriptors per label to a `SampleStore`.
//! Export reduces the store to a `ReferenceSet` holding one mean
//! descriptor per label.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MatchError, Result};
use crate::label::Label;
use crate::matcher::{Descriptor, DESCRIPTOR_LEN};

// ── ReferenceSet ───────────────────────────────────────────

/// Label → template descriptor.  Serializes as a JSON object keyed by
/// label, e.g. `{"A": [0.0, 0.0, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceSet {
    templates: BTreeMap<Label, Descriptor>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the template for `label`.
    pub fn insert(&mut self, label: Label, descriptor: Descriptor) -> Option<Descriptor> {
        self.templates.insert(label, descriptor)
    }

    pub fn get(&self, label: &Label) -> Option<&Descriptor> {
        self.templates.get(label)
    }

    /// Templates in ascending label order.
    pub fn iter(&self) -> btree_map::Iter<'_, Label, Descriptor> {
        self.templates.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.templates.keys()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl FromIterator<(Label, Descriptor)> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = (Label, Descriptor)>>(iter: I) -> Self {
        Self {
            templates: iter.into_iter().collect(),
        }
    }
}

// ── SampleStore ────────────────────────────────────────────

/// Label → recorded descriptors, in recording order.
///
/// There is no cap and no deduplication; a store lives for one
/// interactive recording session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleStore {
    samples: BTreeMap<Label, Vec<Descriptor>>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor under `label`.  Returns the label's new sample
    /// count.
    ///
    /// Fails with `InvalidLabel` unless `label` is a single letter A-Z.
    pub fn record(&mut self, label: &str, descriptor: Descriptor) -> Result<usize> {
        let label = Label::parse(label)?;
        self.record_label(label, descriptor)
    }

    /// Append a descriptor under an already validated label.
    ///
    /// Fails with `LengthMismatch` unless the descriptor holds
    /// `DESCRIPTOR_LEN` values; the store is left unchanged.
    pub fn record_label(&mut self, label: Label, descriptor: Descriptor) -> Result<usize> {
        if descriptor.len() != DESCRIPTOR_LEN {
            return Err(MatchError::LengthMismatch {
                left: descriptor.len(),
                right: DESCRIPTOR_LEN,
            });
        }
        let entry = self.samples.entry(label).or_default();
        entry.push(descriptor);
        debug!(%label, count = entry.len(), "sample recorded");
        Ok(entry.len())
    }

    /// Recorded descriptors for `label`, oldest first.
    pub fn samples(&self, label: &Label) -> &[Descriptor] {
        self.samples.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Per-label sample counts in label order.
    pub fn counts(&self) -> impl Iterator<Item = (&Label, usize)> {
        self.samples.iter().map(|(label, v)| (label, v.len()))
    }

    /// Number of labels with at least one sample.
    pub fn label_count(&self) -> usize {
        self.samples.values().filter(|v| !v.is_empty()).count()
    }

    /// Total samples across all labels.
    pub fn total_samples(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_samples() == 0
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Average each label's samples into a single template.
    ///
    /// Labels without samples are left out.  Recording and loading both
    /// check descriptor length, so every label's samples share one length.
    pub fn build_reference_set(&self) -> ReferenceSet {
        self.samples
            .iter()
            .filter_map(|(label, descriptors)| {
                mean_descriptor(descriptors).map(|mean| (*label, mean))
            })
            .collect()
    }
}

/// Element-wise arithmetic mean, or `None` for an empty slice.
///
/// Accumulated as a running mean so identical samples average back to
/// exactly themselves.
fn mean_descriptor(descriptors: &[Descriptor]) -> Option<Descriptor> {
    let first = descriptors.first()?;
    let mut mean = first.values().to_vec();
    for (k, d) in descriptors.iter().enumerate().skip(1) {
        let n = (k + 1) as f32;
        for (m, v) in mean.iter_mut().zip(d.values()) {
            *m += (v - *m) / n;
        }
    }
    Some(Descriptor::from_values(mean))
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
fn descriptor_with_first(first: f32) -> Descriptor {
    let mut v = vec![0.0; DESCRIPTOR_LEN];
    v[0] = first;
    Descriptor::from_values(v)
}

// ── Tests ──────────────────────────────────────────────────
