//! Validation errors raised by the matching core.

/// Errors raised synchronously by pose normalization, descriptor distance
/// and sample recording.  None of them are retried internally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    /// The pose does not contain exactly one landmark per hand joint.
    #[error("invalid pose: expected {expected} landmarks, got {got}")]
    InvalidPose {
        /// Always `LANDMARK_COUNT`.
        expected: usize,
        got: usize,
    },

    /// Two descriptors of different length were compared.
    #[error("descriptor length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// A label that is not a single uppercase ASCII letter.
    #[error("invalid label {0:?}: expected a single letter A-Z")]
    InvalidLabel(String),
}

pub type Result<T> = std::result::Result<T, MatchError>;
