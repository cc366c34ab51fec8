//! Adapter from hand-detector result frames to typed poses.
//!
//! Detectors report every visible hand as a list of landmark objects plus a
//! handedness classification.  Those payloads are mapped here, once, into
//! `HandDetection` values so nothing downstream depends on their shape.

use serde::Deserialize;
use tracing::debug;

use crate::landmark::{Hand, Landmark, Pose};

// ── Detector payload ───────────────────────────────────────

/// Handedness classification for one detected hand.
#[derive(Debug, Clone, Deserialize)]
pub struct Handedness {
    /// "Left" or "Right".
    pub label: String,
    /// Classification confidence (0.0-1.0).
    #[serde(default = "default_score")]
    pub score: f32,
}

fn default_score() -> f32 {
    1.0
}

/// One detector results frame.  Both lists are absent when no hand is in
/// view.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionFrame {
    #[serde(default)]
    pub multi_hand_landmarks: Vec<Vec<Landmark>>,
    #[serde(default)]
    pub multi_handedness: Vec<Handedness>,
}

// ── Config ─────────────────────────────────────────────────

/// Configuration for accepting detected hands.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Minimum handedness score (0.0-1.0) for a hand to be used.
    pub min_confidence: f32,
    /// Maximum number of hands taken from one frame, in detector order.
    pub max_hands: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            max_hands: 1,
        }
    }
}

// ── Typed result ───────────────────────────────────────────

/// A single accepted hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandDetection {
    /// `None` when the detector gave no usable handedness label.
    pub hand: Option<Hand>,
    pub score: f32,
    pub pose: Pose,
}

impl DetectionFrame {
    /// Accepted hands in detector order.
    ///
    /// Hands with the wrong landmark count or a score below
    /// `min_confidence` are skipped.  A hand without a matching handedness
    /// entry is kept with an unknown hand and full score.
    pub fn hands(&self, config: &DetectionConfig) -> Vec<HandDetection> {
        let mut hands = Vec::new();
        for (i, landmarks) in self.multi_hand_landmarks.iter().enumerate() {
            if hands.len() >= config.max_hands {
                break;
            }

            let handedness = self.multi_handedness.get(i);
            let score = handedness.map(|h| h.score).unwrap_or(1.0);
            if score < config.min_confidence {
                debug!(index = i, score, "skipping low-confidence hand");
                continue;
            }

            let pose = match Pose::from_landmarks(landmarks.clone()) {
                Ok(p) => p,
                Err(e) => {
                    debug!(index = i, "skipping hand: {}", e);
                    continue;
                }
            };

            hands.push(HandDetection {
                hand: handedness.and_then(|h| Hand::parse(&h.label)),
                score,
                pose,
            });
        }
        hands
    }

    /// The first accepted hand, if any.
    pub fn primary(&self, config: &DetectionConfig) -> Option<HandDetection> {
        self.hands(config).into_iter().next()
    }
}

// ── Tests ──────────────────────────────────────────────────
