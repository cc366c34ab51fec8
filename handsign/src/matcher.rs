//! Pose normalization and nearest-template matching.
//!
//! A pose is reduced to a wrist-relative, unit-scaled descriptor and
//! compared against per-label templates by Euclidean distance.  Matches
//! farther than the configured threshold are rejected.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MatchError, Result};
use crate::label::Label;
use crate::landmark::{HandLandmark, Landmark, Pose, LANDMARK_COUNT};
use crate::reference::ReferenceSet;

/// Number of values in a descriptor (x, y, z per landmark).
pub const DESCRIPTOR_LEN: usize = LANDMARK_COUNT * 3;

/// Default maximum distance for a template to count as a match.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

// ── Descriptor ─────────────────────────────────────────────

/// Normalized, flattened pose: `[x0, y0, z0, x1, y1, z1, ...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    /// Wrap raw values.  Length is not checked here; `distance` and the
    /// persistence layer validate it where it matters.
    pub fn from_values(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean distance to another descriptor.
    pub fn distance(&self, other: &Descriptor) -> Result<f32> {
        distance(&self.0, &other.0)
    }

    /// Position of one landmark inside the descriptor.
    pub fn landmark(&self, which: HandLandmark) -> [f32; 3] {
        let i = which.index() * 3;
        [self.0[i], self.0[i + 1], self.0[i + 2]]
    }
}

impl From<Descriptor> for Vec<f32> {
    fn from(d: Descriptor) -> Vec<f32> {
        d.0
    }
}

// ── Core operations ────────────────────────────────────────

/// Normalize raw landmarks into a translation- and scale-invariant
/// descriptor.
///
/// Every landmark is made relative to the wrist, then divided by the
/// largest wrist distance.  If every landmark coincides with the wrist the
/// zero offsets are kept unscaled.  Lengths and the division run in `f64`
/// so the result holds for any representable pose scale.
pub fn normalize(landmarks: &[Landmark]) -> Result<Descriptor> {
    if landmarks.len() != LANDMARK_COUNT {
        return Err(MatchError::InvalidPose {
            expected: LANDMARK_COUNT,
            got: landmarks.len(),
        });
    }

    let wrist = landmarks[HandLandmark::Wrist.index()];
    let translated: Vec<Landmark> = landmarks.iter().map(|l| l.relative_to(&wrist)).collect();
    let max_dist = translated.iter().map(Landmark::norm).fold(0.0_f64, f64::max);

    let mut values = Vec::with_capacity(DESCRIPTOR_LEN);
    for l in &translated {
        if max_dist > 0.0 {
            values.extend(l.to_array().map(|v| (f64::from(v) / max_dist) as f32));
        } else {
            values.extend_from_slice(&l.to_array());
        }
    }
    Ok(Descriptor(values))
}

/// Euclidean distance between two equal-length descriptors.
pub fn distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(MatchError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let sum: f32 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();
    Ok(sum.sqrt())
}

/// Result of a successful classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub label: Label,
    pub distance: f32,
}

/// Closest template to `descriptor`, regardless of threshold.
///
/// Templates are scanned in label order and only a strictly smaller
/// distance replaces the current best, so exact ties resolve to the
/// alphabetically first label.  Templates at a NaN distance never match.
pub fn nearest(descriptor: &Descriptor, reference: &ReferenceSet) -> Result<Option<Match>> {
    let mut best: Option<Match> = None;
    for (label, template) in reference.iter() {
        let d = descriptor.distance(template)?;
        if d.is_nan() {
            debug!(%label, "skipping template at NaN distance");
            continue;
        }
        match best {
            Some(current) if d >= current.distance => {}
            _ => {
                best = Some(Match {
                    label: *label,
                    distance: d,
                })
            }
        }
    }
    Ok(best)
}

/// Classify raw landmarks against a reference set.
///
/// Returns `Ok(None)` when the reference set is empty or the nearest
/// template is at or beyond `threshold`.
pub fn classify(
    landmarks: &[Landmark],
    reference: &ReferenceSet,
    threshold: f32,
) -> Result<Option<Match>> {
    let descriptor = normalize(landmarks)?;
    let best = nearest(&descriptor, reference)?;
    Ok(best.filter(|m| m.distance < threshold))
}

// ── Config ─────────────────────────────────────────────────

/// Configuration for template matching.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Matches must be strictly closer than this distance.
    pub threshold: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

// ── Matcher ────────────────────────────────────────────────

/// Stateless matcher carrying its configuration.
#[derive(Debug, Clone, Default)]
pub struct PoseMatcher {
    pub config: MatcherConfig,
}

impl PoseMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Normalize a validated pose.
    pub fn normalize(&self, pose: &Pose) -> Result<Descriptor> {
        normalize(pose.landmarks())
    }

    /// Classify a pose using the configured threshold.
    pub fn classify(&self, pose: &Pose, reference: &ReferenceSet) -> Result<Option<Match>> {
        let result = classify(pose.landmarks(), reference, self.config.threshold)?;
        match &result {
            Some(m) => debug!(label = %m.label, distance = m.distance, "pose matched"),
            None => debug!(templates = reference.len(), "no template within threshold"),
        }
        Ok(result)
    }

    /// Generate s-expression for IPC config.
    pub fn config_sexp(&self) -> String {
        format!("(:threshold {:.2})", self.config.threshold)
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
fn translate(pose: &Pose, dx: f32, dy: f32, dz: f32) -> Pose {
    let moved = pose
        .landmarks()
        .iter()
        .map(|l| Landmark::new(l.x + dx, l.y + dy, l.z + dz))
        .collect();
    Pose::from_landmarks(moved).unwrap()
}

#[cfg(test)]
fn scale(pose: &Pose, k: f32) -> Pose {
    let scaled = pose
        .landmarks()
        .iter()
        .map(|l| Landmark::new(l.x * k, l.y * k, l.z * k))
        .collect();
    Pose::from_landmarks(scaled).unwrap()
}

#[cfg(test)]
fn assert_descriptors_close(a: &Descriptor, b: &Descriptor, tol: f32) {
    let d = a.distance(b).unwrap();
    assert!(d < tol, "descriptors differ by {}: {:?} vs {:?}", d, a, b);
}

#[cfg(test)]
fn unit_descriptor(first: f32) -> Descriptor {
    let mut v = vec![0.0; DESCRIPTOR_LEN];
    v[0] = first;
    Descriptor::from_values(v)
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{test_fist, test_open_hand};

    #[test]
    fn test_normalize_wrist_at_origin() {
        for pose in [test_open_hand(), test_fist()] {
            let d = normalize(pose.landmarks()).unwrap();
            assert_eq!(d.len(), DESCRIPTOR_LEN);
            assert_eq!(&d.values()[0..3], &[0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_normalize_max_norm_is_one() {
        let d = normalize(test_open_hand().landmarks()).unwrap();
        let max = d
            .values()
            .chunks(3)
            .map(|c| (c[0] * c[0] + c[1] * c[1] + c[2] * c[2]).sqrt())
            .fold(0.0_f32, f32::max);
        assert!((max - 1.0).abs() < 1e-5, "expected max norm 1, got {}", max);
    }

    #[test]
    fn test_normalize_degenerate_pose_stays_at_origin() {
        let lm = vec![Landmark::new(0.4, 0.6, -0.1); LANDMARK_COUNT];
        let d = normalize(&lm).unwrap();
        assert!(d.values().iter().all(|v| *v == 0.0), "got {:?}", d);
    }

    #[test]
    fn test_normalize_translation_invariant() {
        let pose = test_open_hand();
        let a = normalize(pose.landmarks()).unwrap();
        let b = normalize(translate(&pose, 0.3, -0.2, 0.15).landmarks()).unwrap();
        assert_descriptors_close(&a, &b, 1e-5);
    }

    #[test]
    fn test_normalize_scale_invariant() {
        let pose = test_fist();
        let a = normalize(pose.landmarks()).unwrap();
        for k in [0.25, 3.7, 10.0] {
            let b = normalize(scale(&pose, k).landmarks()).unwrap();
            assert_descriptors_close(&a, &b, 1e-5);
        }
    }

    #[test]
    fn test_normalize_scale_invariant_extreme() {
        let pose = test_open_hand();
        let a = normalize(pose.landmarks()).unwrap();
        for k in [1e-22, 1e20] {
            let b = normalize(scale(&pose, k).landmarks()).unwrap();
            let max = b
                .values()
                .chunks(3)
                .map(|c| (c[0] * c[0] + c[1] * c[1] + c[2] * c[2]).sqrt())
                .fold(0.0_f32, f32::max);
            assert!((max - 1.0).abs() < 1e-5, "k = {}: max norm {}", k, max);
            assert_descriptors_close(&a, &b, 1e-4);
        }
    }

    #[test]
    fn test_normalize_single_offset() {
        // Only the index tip moves away from the wrist; it must land on the unit sphere.
        let mut lm = vec![Landmark::new(1.0, 1.0, 1.0); LANDMARK_COUNT];
        lm[HandLandmark::IndexTip.index()] = Landmark::new(1.0, 3.0, 1.0);
        let d = normalize(&lm).unwrap();
        assert_eq!(d.landmark(HandLandmark::IndexTip), [0.0, 1.0, 0.0]);
        assert_eq!(d.landmark(HandLandmark::ThumbTip), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_normalize_wrong_count() {
        let lm = vec![Landmark::default(); 20];
        assert_eq!(
            normalize(&lm),
            Err(MatchError::InvalidPose { expected: 21, got: 20 })
        );
    }

    #[test]
    fn test_distance_identity_and_symmetry() {
        let a = normalize(test_open_hand().landmarks()).unwrap();
        let b = normalize(test_fist().landmarks()).unwrap();
        assert_eq!(a.distance(&a).unwrap(), 0.0);
        assert!(a.distance(&b).unwrap() > 0.0);
        assert_eq!(a.distance(&b).unwrap(), b.distance(&a).unwrap());
    }

    #[test]
    fn test_distance_known_value() {
        let d = distance(&[0.0, 0.0, 0.0], &[3.0, 4.0, 0.0]).unwrap();
        assert!((d - 5.0).abs() < 1e-6, "expected 5.0, got {}", d);
    }

    #[test]
    fn test_distance_length_mismatch() {
        assert_eq!(
            distance(&[0.0; 63], &[0.0; 60]),
            Err(MatchError::LengthMismatch { left: 63, right: 60 })
        );
    }

    #[test]
    fn test_classify_empty_reference_is_no_match() {
        let reference = ReferenceSet::new();
        for pose in [test_open_hand(), test_fist()] {
            assert_eq!(classify(pose.landmarks(), &reference, 10.0).unwrap(), None);
        }
    }

    #[test]
    fn test_classify_picks_nearest() {
        let mut reference = ReferenceSet::new();
        reference.insert(Label::parse("B").unwrap(), normalize(test_open_hand().landmarks()).unwrap());
        reference.insert(Label::parse("A").unwrap(), normalize(test_fist().landmarks()).unwrap());

        let m = classify(test_open_hand().landmarks(), &reference, 0.5).unwrap().unwrap();
        assert_eq!(m.label.as_char(), 'B');
        assert_eq!(m.distance, 0.0);

        let m = classify(test_fist().landmarks(), &reference, 0.5).unwrap().unwrap();
        assert_eq!(m.label.as_char(), 'A');
    }

    #[test]
    fn test_classify_threshold_is_strict() {
        let pose = test_open_hand();
        let template = normalize(test_fist().landmarks()).unwrap();
        let d = normalize(pose.landmarks()).unwrap().distance(&template).unwrap();
        assert!(d > 0.0);

        let mut reference = ReferenceSet::new();
        reference.insert(Label::parse("F").unwrap(), template);

        assert_eq!(classify(pose.landmarks(), &reference, d).unwrap(), None);
        let m = classify(pose.landmarks(), &reference, d + 1e-3).unwrap();
        assert_eq!(m.map(|m| m.label.as_char()), Some('F'));
    }

    #[test]
    fn test_classify_tie_prefers_first_label() {
        let pose = test_open_hand();
        let descriptor = normalize(pose.landmarks()).unwrap();
        let mut reference = ReferenceSet::new();
        reference.insert(Label::parse("M").unwrap(), descriptor.clone());
        reference.insert(Label::parse("C").unwrap(), descriptor);

        for _ in 0..3 {
            let m = classify(pose.landmarks(), &reference, 0.5).unwrap().unwrap();
            assert_eq!(m.label.as_char(), 'C');
        }
    }

    #[test]
    fn test_classify_propagates_length_mismatch() {
        let mut reference = ReferenceSet::new();
        reference.insert(Label::parse("A").unwrap(), Descriptor::from_values(vec![0.0; 3]));
        let err = classify(test_open_hand().landmarks(), &reference, 0.5).unwrap_err();
        assert_eq!(err, MatchError::LengthMismatch { left: 63, right: 3 });
    }

    #[test]
    fn test_nearest_skips_nan_distance() {
        let mut values = vec![0.0; DESCRIPTOR_LEN];
        values[1] = f32::NAN;
        let poisoned = Descriptor::from_values(values);
        let mut reference = ReferenceSet::new();
        reference.insert(Label::parse("A").unwrap(), unit_descriptor(0.2));
        reference.insert(Label::parse("B").unwrap(), poisoned);

        let m = nearest(&unit_descriptor(0.0), &reference).unwrap().unwrap();
        assert_eq!(m.label.as_char(), 'A');
        assert!((m.distance - 0.2).abs() < 1e-6);

        let mut only_nan = ReferenceSet::new();
        only_nan.insert(
            Label::parse("C").unwrap(),
            Descriptor::from_values(vec![f32::NAN; DESCRIPTOR_LEN]),
        );
        assert_eq!(nearest(&unit_descriptor(0.0), &only_nan).unwrap(), None);
    }

    #[test]
    fn test_nearest_ignores_threshold() {
        let mut reference = ReferenceSet::new();
        reference.insert(Label::parse("A").unwrap(), unit_descriptor(100.0));
        let m = nearest(&unit_descriptor(0.0), &reference).unwrap().unwrap();
        assert_eq!(m.distance, 100.0);
    }

    #[test]
    fn test_matcher_uses_config_threshold() {
        let mut reference = ReferenceSet::new();
        reference.insert(Label::parse("A").unwrap(), normalize(test_fist().landmarks()).unwrap());
        let pose = test_open_hand();

        let mut matcher = PoseMatcher::new();
        matcher.config.threshold = 0.0;
        assert_eq!(matcher.classify(&pose, &reference).unwrap(), None);

        matcher.config.threshold = 100.0;
        assert!(matcher.classify(&pose, &reference).unwrap().is_some());
    }

    #[test]
    fn test_config_sexp() {
        let matcher = PoseMatcher::new();
        assert_eq!(matcher.config_sexp(), "(:threshold 0.50)");
    }
}
