//! Text-level normalizers applied before parsing.
//!
//! Each normalizer decides whether it applies to the raw text and, if so,
//! rewrites it. Normalizers run in weight order (lower first) and every
//! accepted normalizer sees the previous one's output.

mod doctype;

pub use doctype::{DocTypeNormalizer, LEGACY_ENTITIES};

use tracing::debug;

use crate::settings::Settings;

/// A pre-parse text transform.
pub trait Normalizer: Send + Sync {
    /// Normalizer name for debugging.
    fn name(&self) -> &str;

    /// Ordering key; lower runs first.
    fn weight(&self) -> i32 {
        0
    }

    /// Whether this normalizer applies to `input`.
    fn accept(&self, input: &str) -> bool;

    /// Rewrite `input`. Only called when [`Normalizer::accept`] returned true.
    fn normalize(&self, input: &str) -> String;
}

/// Weight-ordered normalizers applied in sequence.
pub struct NormalizerChain {
    normalizers: Vec<Box<dyn Normalizer>>,
}

impl NormalizerChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            normalizers: Vec::new(),
        }
    }

    /// Add a normalizer, keeping the chain sorted by weight.
    ///
    /// Normalizers with equal weight keep insertion order.
    pub fn add<N: Normalizer + 'static>(mut self, normalizer: N) -> Self {
        self.normalizers.push(Box::new(normalizer));
        self.normalizers.sort_by_key(|n| n.weight());
        self
    }

    /// The standard chain for the given settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new().add(DocTypeNormalizer::from_settings(&settings.normalizer))
    }

    /// Normalizer names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.normalizers.iter().map(|n| n.name()).collect()
    }

    /// Run every accepting normalizer over the input.
    pub fn process(&self, input: &str) -> String {
        self.normalizers
            .iter()
            .fold(input.to_string(), |acc, normalizer| {
                if normalizer.accept(&acc) {
                    debug!(normalizer = normalizer.name(), "normalizing rich text");
                    normalizer.normalize(&acc)
                } else {
                    acc
                }
            })
    }
}

impl Default for NormalizerChain {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
