mod compile;
mod validate;
mod variants;

pub use compile::{CompileArgs, cmd_compile};
pub use validate::cmd_validate;
pub use variants::cmd_variants;

use std::path::Path;

use anyhow::{Context, Result};

use fuzzbuild_lib::config::{self, ParsedSettings};
use fuzzbuild_lib::project::{DirRegistry, ProjectRegistry};

/// Read and parse one project from the projects directory.
fn load_settings(projects_dir: &Path, name: &str) -> Result<ParsedSettings> {
  let registry = DirRegistry::new(projects_dir);
  let record = registry
    .get(name)
    .with_context(|| format!("Failed to read project {}", name))?
    .with_context(|| format!("Project '{}' not found in {}", name, projects_dir.display()))?;

  config::parse(&record.project_yaml, &record.dockerfile)
    .with_context(|| format!("Invalid configuration for project {}", name))
}
