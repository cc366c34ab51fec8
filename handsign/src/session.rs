//! Per-session recognition state.
//!
//! Owns the matcher, the samples recorded so far and the reference set
//! currently used for classification.  All mutation goes through
//! `&mut self`, so callers delivering frames from several contexts must
//! serialize access themselves.

use tracing::info;

use crate::error::Result;
use crate::label::Label;
use crate::landmark::Pose;
use crate::matcher::{Descriptor, Match, MatcherConfig, PoseMatcher};
use crate::reference::{ReferenceSet, SampleStore};

/// Central recording and classification state.
#[derive(Debug, Default)]
pub struct Session {
    /// Matcher and its configuration.
    pub matcher: PoseMatcher,
    /// Samples recorded since the last export or reset.
    samples: SampleStore,
    /// Templates used by `classify`, once loaded.
    reference: Option<ReferenceSet>,
}

impl Session {
    /// Create a new session with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MatcherConfig) -> Self {
        Self {
            matcher: PoseMatcher::with_config(config),
            ..Self::default()
        }
    }

    /// Normalize `pose` and record it under `label`.  Returns the label's
    /// sample count.
    pub fn record(&mut self, label: &str, pose: &Pose) -> Result<usize> {
        let label = Label::parse(label)?;
        let descriptor = self.matcher.normalize(pose)?;
        self.samples.record_label(label, descriptor)
    }

    /// Normalize without recording.
    pub fn normalize(&self, pose: &Pose) -> Result<Descriptor> {
        self.matcher.normalize(pose)
    }

    /// Classify against the loaded reference set.  Always `None` before a
    /// reference set is loaded.
    pub fn classify(&self, pose: &Pose) -> Result<Option<Match>> {
        match &self.reference {
            Some(reference) => self.matcher.classify(pose, reference),
            None => Ok(None),
        }
    }

    /// Average recorded samples into a reference set.  The sample store is
    /// consumed and starts over empty.
    pub fn export(&mut self) -> ReferenceSet {
        let samples = std::mem::take(&mut self.samples);
        let set = samples.build_reference_set();
        info!(
            labels = set.len(),
            samples = samples.total_samples(),
            "reference set exported"
        );
        set
    }

    /// Replace the reference set used for classification.
    pub fn load_reference(&mut self, reference: ReferenceSet) {
        info!(labels = reference.len(), "reference set active");
        self.reference = Some(reference);
    }

    pub fn reference(&self) -> Option<&ReferenceSet> {
        self.reference.as_ref()
    }

    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    /// Drop all recorded samples.  The reference set is kept.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Generate s-expression for IPC status.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:threshold {:.2} :reference {} :templates {} :labels {} :samples {})",
            self.matcher.config.threshold,
            if self.reference.is_some() { "t" } else { "nil" },
            self.reference.as_ref().map(ReferenceSet::len).unwrap_or(0),
            self.samples.label_count(),
            self.samples.total_samples(),
        )
    }

    /// Generate s-expression listing per-label sample counts.
    pub fn samples_sexp(&self) -> String {
        if self.samples.is_empty() {
            return "nil".to_string();
        }
        let mut s = String::from("(");
        for (i, (label, count)) in self.samples.counts().enumerate() {
            if i > 0 {
                s.push(' ');
            }
            s.push_str(&format!("(:label \"{}\" :count {})", label, count));
        }
        s.push(')');
        s
    }
}

// ── Tests ──────────────────────────────────────────────────
