//! Project registry adapters.
//!
//! # Directory layout
//!
//! [`DirRegistry`] reads the layout of a projects checkout:
//!
//! ```text
//! {root}/
//! └── <name>/
//!     ├── project.yaml
//!     └── Dockerfile
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::{DOCKERFILE_FILENAME, PROJECT_YAML_FILENAME};

use super::ProjectRecord;

/// Longest project name accepted as a single path component.
const MAX_NAME_LEN: usize = 255;

/// Operational failures talking to a registry. Absence is not an error.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// Reading from the backing store failed.
  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The backing service could not be reached.
  #[error("registry unavailable: {0}")]
  Unavailable(String),
}

/// Read-only lookup of project records by name.
pub trait ProjectRegistry: Send + Sync {
  /// Fetch one record. `Ok(None)` means the project does not exist.
  fn get(&self, name: &str) -> Result<Option<ProjectRecord>, RegistryError>;

  /// Names of every stored project, sorted.
  fn names(&self) -> Result<Vec<String>, RegistryError>;
}

/// In-memory registry.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
  records: BTreeMap<String, ProjectRecord>,
}

impl MemoryRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store a record, replacing any previous record with the same name.
  pub fn put(&mut self, record: ProjectRecord) {
    self.records.insert(record.name.clone(), record);
  }

  pub fn with(mut self, record: ProjectRecord) -> Self {
    self.put(record);
    self
  }
}

impl ProjectRegistry for MemoryRegistry {
  fn get(&self, name: &str) -> Result<Option<ProjectRecord>, RegistryError> {
    Ok(self.records.get(name).cloned())
  }

  fn names(&self) -> Result<Vec<String>, RegistryError> {
    Ok(self.records.keys().cloned().collect())
  }
}

/// Registry backed by a directory of project folders.
#[derive(Debug, Clone)]
pub struct DirRegistry {
  root: PathBuf,
}

impl DirRegistry {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn project_dir(&self, name: &str) -> Option<PathBuf> {
    let valid = !name.is_empty()
      && name != "."
      && name != ".."
      && name.len() <= MAX_NAME_LEN
      && !name.contains(['/', '\\', '\0'])
      && !name.starts_with('.');
    if !valid {
      warn!(name = %name, "rejecting project name outside the registry root");
      return None;
    }
    Some(self.root.join(name))
  }
}

/// Read a file, mapping `NotFound` to `Ok(None)`.
fn read_optional(path: &Path) -> Result<Option<String>, RegistryError> {
  match fs::read_to_string(path) {
    Ok(content) => Ok(Some(content)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(RegistryError::Io {
      path: path.to_path_buf(),
      source: e,
    }),
  }
}

impl ProjectRegistry for DirRegistry {
  fn get(&self, name: &str) -> Result<Option<ProjectRecord>, RegistryError> {
    let Some(dir) = self.project_dir(name) else {
      return Ok(None);
    };

    match fs::metadata(&dir) {
      Ok(meta) if meta.is_dir() => {}
      Ok(_) => {
        debug!(path = ?dir, "not a project folder, project absent");
        return Ok(None);
      }
      Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => return Ok(None),
      Err(e) => return Err(RegistryError::Io { path: dir, source: e }),
    }

    let Some(project_yaml) = read_optional(&dir.join(PROJECT_YAML_FILENAME))? else {
      debug!(path = ?dir, "no project.yaml, project absent");
      return Ok(None);
    };

    // A missing Dockerfile surfaces later as a validation error, not as absence.
    let dockerfile = read_optional(&dir.join(DOCKERFILE_FILENAME))?.unwrap_or_default();

    Ok(Some(ProjectRecord {
      name: name.to_string(),
      project_yaml,
      dockerfile,
    }))
  }

  fn names(&self) -> Result<Vec<String>, RegistryError> {
    let entries = fs::read_dir(&self.root).map_err(|e| RegistryError::Io {
      path: self.root.clone(),
      source: e,
    })?;

    let mut names = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|e| RegistryError::Io {
        path: self.root.clone(),
        source: e,
      })?;
      let path = entry.path();
      if path.is_dir()
        && path.join(PROJECT_YAML_FILENAME).is_file()
        && let Some(name) = path.file_name().and_then(|n| n.to_str())
      {
        names.push(name.to_string());
      }
    }

    names.sort();
    Ok(names)
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  fn write_project(root: &Path, name: &str, yaml: &str, dockerfile: Option<&str>) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(PROJECT_YAML_FILENAME), yaml).unwrap();
    if let Some(dockerfile) = dockerfile {
      fs::write(dir.join(DOCKERFILE_FILENAME), dockerfile).unwrap();
    }
  }

  #[test]
  fn memory_registry_returns_stored_records() {
    let registry = MemoryRegistry::new().with(ProjectRecord::new("zlib", "language: c\n", "FROM base"));

    assert_eq!(registry.get("zlib").unwrap().unwrap().project_yaml, "language: c\n");
    assert!(registry.get("libpng").unwrap().is_none());
    assert_eq!(registry.names().unwrap(), vec!["zlib"]);
  }

  #[test]
  fn dir_registry_reads_project_folders() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path(), "zlib", "language: c\n", Some("FROM base-builder\n"));

    let registry = DirRegistry::new(temp.path());
    let record = registry.get("zlib").unwrap().unwrap();

    assert_eq!(record.name, "zlib");
    assert_eq!(record.project_yaml, "language: c\n");
    assert_eq!(record.dockerfile, "FROM base-builder\n");
  }

  #[test]
  fn dir_registry_missing_project_is_absent() {
    let temp = TempDir::new().unwrap();
    let registry = DirRegistry::new(temp.path());

    assert!(registry.get("nonexistent").unwrap().is_none());
  }

  #[test]
  fn dir_registry_folder_without_yaml_is_absent() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("half")).unwrap();
    let registry = DirRegistry::new(temp.path());

    assert!(registry.get("half").unwrap().is_none());
  }

  #[test]
  fn dir_registry_missing_dockerfile_reads_as_empty() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path(), "nodocker", "language: c\n", None);
    let registry = DirRegistry::new(temp.path());

    assert_eq!(registry.get("nodocker").unwrap().unwrap().dockerfile, "");
  }

  #[test]
  fn dir_registry_rejects_traversal() {
    let temp = TempDir::new().unwrap();
    let inner = temp.path().join("projects");
    fs::create_dir_all(&inner).unwrap();
    write_project(temp.path(), "outside", "language: c\n", Some("FROM base"));
    let registry = DirRegistry::new(&inner);

    assert!(registry.get("../outside").unwrap().is_none());
    assert!(registry.get("..").unwrap().is_none());
    assert!(registry.get("").unwrap().is_none());
  }

  #[test]
  fn dir_registry_plain_file_is_absent() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path(), "zlib", "language: c\n", Some("FROM base"));
    fs::write(temp.path().join("README"), "x").unwrap();
    let registry = DirRegistry::new(temp.path());

    assert!(registry.get("README").unwrap().is_none());
  }

  #[test]
  fn dir_registry_rejects_unrepresentable_names() {
    let temp = TempDir::new().unwrap();
    let registry = DirRegistry::new(temp.path());

    assert!(registry.get("a\0b").unwrap().is_none());
    assert!(registry.get(&"x".repeat(300)).unwrap().is_none());
  }

  #[test]
  fn dir_registry_lists_sorted_names() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path(), "zlib", "language: c\n", Some("FROM base"));
    write_project(temp.path(), "curl", "language: c\n", Some("FROM base"));
    fs::create_dir_all(temp.path().join("not-a-project")).unwrap();
    fs::write(temp.path().join("README"), "x").unwrap();

    let registry = DirRegistry::new(temp.path());
    assert_eq!(registry.names().unwrap(), vec!["curl", "zlib"]);
  }
}
