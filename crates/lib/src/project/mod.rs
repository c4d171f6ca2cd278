//! Project records and the registry they are read from.
//!
//! The compiler only ever reads records. Creating and updating them belongs to
//! an ingestion process outside this crate; [`ProjectRegistry`] is the narrow
//! seam behind which the storage technology lives.

mod registry;

pub use registry::{DirRegistry, MemoryRegistry, ProjectRegistry, RegistryError};

use serde::{Deserialize, Serialize};

/// Persisted configuration and build recipe of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
  /// Unique, immutable key.
  pub name: String,
  /// Raw `project.yaml` text.
  pub project_yaml: String,
  /// Raw Dockerfile text.
  pub dockerfile: String,
}

impl ProjectRecord {
  pub fn new(name: impl Into<String>, project_yaml: impl Into<String>, dockerfile: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      project_yaml: project_yaml.into(),
      dockerfile: dockerfile.into(),
    }
  }
}
