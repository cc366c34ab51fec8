//! Hand landmark data structures.
//!
//! Models the 21 landmarks per hand emitted by image-based hand detectors,
//! in detector order: wrist first, then four landmarks per finger from
//! thumb to pinky, each finger ending at its tip.

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

// ── Landmark definitions ───────────────────────────────────

/// The 21 hand landmarks, in detector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

impl HandLandmark {
    /// Convert landmark enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }
}

// ── Hand enum ──────────────────────────────────────────────

/// Which hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Parse a detector handedness label ("Left"/"Right", any case).
    pub fn parse(s: &str) -> Option<Hand> {
        if s.eq_ignore_ascii_case("left") {
            Some(Hand::Left)
        } else if s.eq_ignore_ascii_case("right") {
            Some(Hand::Right)
        } else {
            None
        }
    }
}

// ── Landmark ───────────────────────────────────────────────

/// One tracked hand joint.  `x`/`y` are image-relative (nominally 0..1),
/// `z` is relative depth and unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise difference `self - origin`.
    pub fn relative_to(&self, origin: &Landmark) -> Landmark {
        Landmark {
            x: self.x - origin.x,
            y: self.y - origin.y,
            z: self.z - origin.z,
        }
    }

    /// Euclidean length of the landmark as a vector from the origin.
    ///
    /// Squared in `f64`, so no component magnitude that fits an `f32` can
    /// overflow or underflow the sum.
    pub fn norm(&self) -> f64 {
        let [x, y, z] = self.to_array().map(f64::from);
        (x * x + y * y + z * z).sqrt()
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

// ── Pose ───────────────────────────────────────────────────

/// All 21 landmarks of one hand at one instant.
///
/// Construction checks the landmark count, so every `Pose` in circulation
/// is well-formed.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    landmarks: Vec<Landmark>,
}

impl Pose {
    /// Build a pose from detector landmarks.
    ///
    /// Fails with `InvalidPose` unless exactly `LANDMARK_COUNT` landmarks
    /// are supplied.
    pub fn from_landmarks(landmarks: Vec<Landmark>) -> Result<Self> {
        if landmarks.len() != LANDMARK_COUNT {
            return Err(MatchError::InvalidPose {
                expected: LANDMARK_COUNT,
                got: landmarks.len(),
            });
        }
        Ok(Self { landmarks })
    }

    /// Landmarks in detector order.
    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Look up a single landmark.
    pub fn landmark(&self, which: HandLandmark) -> &Landmark {
        &self.landmarks[which.index()]
    }

    pub fn wrist(&self) -> &Landmark {
        self.landmark(HandLandmark::Wrist)
    }
}

impl TryFrom<Vec<Landmark>> for Pose {
    type Error = MatchError;

    fn try_from(landmarks: Vec<Landmark>) -> Result<Self> {
        Self::from_landmarks(landmarks)
    }
}

// ── Test helpers ───────────────────────────────────────────

/// A plausible open-hand pose: wrist at (0.5, 0.9), fingers fanning upward.
#[cfg(test)]
pub(crate) fn test_open_hand() -> Pose {
    let mut landmarks = vec![Landmark::new(0.5, 0.9, 0.0)];
    for finger in 0..5 {
        let dx = (finger as f32 - 2.0) * 0.06;
        for joint in 1..=4 {
            let t = joint as f32;
            landmarks.push(Landmark::new(
                0.5 + dx * t * 0.5,
                0.9 - 0.07 * t,
                -0.01 * t,
            ));
        }
    }
    Pose::from_landmarks(landmarks).unwrap()
}

/// A fist-like pose: every finger folded back toward the palm.
#[cfg(test)]
pub(crate) fn test_fist() -> Pose {
    let mut landmarks = vec![Landmark::new(0.5, 0.9, 0.0)];
    for finger in 0..5 {
        let dx = (finger as f32 - 2.0) * 0.03;
        for joint in 1..=4 {
            let reach = if joint <= 2 { joint as f32 } else { 5.0 - joint as f32 };
            landmarks.push(Landmark::new(0.5 + dx, 0.9 - 0.04 * reach, -0.02));
        }
    }
    Pose::from_landmarks(landmarks).unwrap()
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_count() {
        assert_eq!(HandLandmark::Wrist.index(), 0);
        assert_eq!(HandLandmark::PinkyTip.index(), 20);
        assert_eq!(LANDMARK_COUNT, 21);
    }

    #[test]
    fn test_hand_parse() {
        assert_eq!(Hand::parse("Left"), Some(Hand::Left));
        assert_eq!(Hand::parse("right"), Some(Hand::Right));
        assert_eq!(Hand::parse("both"), None);
        assert_eq!(Hand::Left.as_str(), "left");
    }

    #[test]
    fn test_pose_requires_21_landmarks() {
        let err = Pose::from_landmarks(vec![Landmark::default(); 20]).unwrap_err();
        assert_eq!(err, MatchError::InvalidPose { expected: 21, got: 20 });

        let err = Pose::try_from(vec![Landmark::default(); 22]).unwrap_err();
        assert_eq!(err, MatchError::InvalidPose { expected: 21, got: 22 });

        assert!(Pose::from_landmarks(vec![Landmark::default(); 21]).is_ok());
    }

    #[test]
    fn test_pose_accessors() {
        let pose = test_open_hand();
        assert_eq!(pose.landmarks().len(), LANDMARK_COUNT);
        assert_eq!(*pose.wrist(), Landmark::new(0.5, 0.9, 0.0));
        let tip = pose.landmark(HandLandmark::MiddleTip);
        assert!((tip.x - 0.5).abs() < 1e-6, "middle finger is centred, got {:?}", tip);
    }

    #[test]
    fn test_relative_to_and_norm() {
        let a = Landmark::new(3.5, 4.5, 1.0);
        let origin = Landmark::new(0.5, 0.5, 1.0);
        let d = a.relative_to(&origin);
        assert_eq!(d.to_array(), [3.0, 4.0, 0.0]);
        assert!((d.norm() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_norm_extreme_magnitudes() {
        let big = Landmark::new(3e30, 4e30, 0.0);
        assert!((big.norm() / 5e30 - 1.0).abs() < 1e-6, "got {}", big.norm());

        let tiny = Landmark::new(3e-30, 4e-30, 0.0);
        assert!((tiny.norm() / 5e-30 - 1.0).abs() < 1e-6, "got {}", tiny.norm());
    }

    #[test]
    fn test_landmark_deserialize_ignores_extra_fields() {
        let lm: Landmark =
            serde_json::from_str(r#"{"x":0.1,"y":0.2,"z":-0.3,"visibility":0.9}"#).unwrap();
        assert_eq!(lm, Landmark::new(0.1, 0.2, -0.3));
    }
}
