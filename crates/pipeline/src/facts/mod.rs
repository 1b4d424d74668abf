//! Canonical fact normalization

mod normalizer;

pub use normalizer::{clamp_confidence, FactNormalizer};
