//! Hashing utilities for plans and signatures.
//!
//! This module provides:
//! - `PlanHash`: A truncated 20-character hash identifying a compiled plan
//! - `ContentHash`: A full 64-character hash
//! - `hash_bytes()`: Arbitrary byte hashing

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::PLAN_HASH_PREFIX_LEN;

pub type HashError = serde_json::Error;

/// A content-addressed hash of a serialized value.
///
/// The hash is a 20-character truncated SHA-256 of the JSON-serialized value.
/// Two plans with the same hash are structurally identical down to every field.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string, e.g., `"a1b2c3d4e5f6789012ab"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanHash(pub String);

impl std::fmt::Display for PlanHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<PlanHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    let full = hash_bytes(serialized.as_bytes());
    Ok(PlanHash(full.0[..PLAN_HASH_PREFIX_LEN].to_string()))
  }
}

/// A full 64-character SHA256 hash.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Serialize)]
  struct Sample {
    name: &'static str,
    args: Vec<&'static str>,
  }

  impl Hashable for Sample {}

  #[test]
  fn hash_bytes_is_full_length_hex() {
    let hash = hash_bytes(b"hello world");
    assert_eq!(hash.0.len(), 64);
    assert_eq!(hash.0, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
  }

  #[test]
  fn compute_hash_is_deterministic_and_truncated() {
    let sample = Sample {
      name: "compile",
      args: vec!["docker", "run"],
    };

    let a = sample.compute_hash().unwrap();
    let b = sample.compute_hash().unwrap();

    assert_eq!(a, b);
    assert_eq!(a.0.len(), PLAN_HASH_PREFIX_LEN);
  }

  #[test]
  fn argument_order_changes_the_hash() {
    let a = Sample {
      name: "compile",
      args: vec!["a", "b"],
    };
    let b = Sample {
      name: "compile",
      args: vec!["b", "a"],
    };

    assert_ne!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
  }
}
