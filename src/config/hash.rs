//! Fingerprinting for change detection.
//!
//! Stack parameters and template resources are hashed deterministically so
//! the local backend can tell whether a launch or change set alters anything.

use sha2::{Digest, Sha256};

use super::spec::StackConfig;

/// Hasher for computing stack and resource fingerprints.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of a stack's parameters and tags.
    ///
    /// Template contents are fingerprinted separately, per resource.
    #[must_use]
    pub fn hash_stack_inputs(&self, stack: &StackConfig) -> String {
        let mut hasher = Sha256::new();

        // BTreeMap iteration is already sorted
        for (key, value) in &stack.parameters {
            hasher.update(b"p:");
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }

        for (key, value) in &stack.tags {
            hasher.update(b"t:");
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a hash of a template resource body.
    ///
    /// `serde_json::Value` objects keep their keys sorted, so the canonical
    /// JSON form is stable across key order in the source document.
    #[must_use]
    pub fn hash_resource(&self, body: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}
