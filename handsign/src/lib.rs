//! handsign - single-hand gesture recognition from 3-D landmarks.
//!
//! Poses of 21 landmarks are normalized into translation- and
//! scale-invariant descriptors and matched against per-letter templates.
//! Templates are built by averaging recorded samples.

pub mod detection;
pub mod error;
pub mod ipc;
pub mod label;
pub mod landmark;
pub mod matcher;
pub mod persist;
pub mod reference;
pub mod session;

pub use error::MatchError;
pub use label::Label;
pub use landmark::{Hand, HandLandmark, Landmark, Pose, LANDMARK_COUNT};
pub use matcher::{
    classify, distance, normalize, Descriptor, Match, MatcherConfig, PoseMatcher, DESCRIPTOR_LEN,
};
pub use reference::{ReferenceSet, SampleStore};
pub use session::Session;
