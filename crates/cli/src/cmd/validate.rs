//! Implementation of the `fuzzbuild validate` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use fuzzbuild_lib::matrix;

use crate::output::{OutputFormat, print_json, print_stat, print_success, print_warning};

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
  items.into_iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

/// Parse a project and expand its matrix, reporting the settings or the first error.
pub fn cmd_validate(projects_dir: &Path, project: &str, format: OutputFormat) -> Result<()> {
  let settings = super::load_settings(projects_dir, project)?;
  let variants = matrix::expand(&settings).with_context(|| format!("Project {} cannot be built", project))?;

  if format.is_json() {
    return print_json(&json!({
      "project": project,
      "settings": settings,
      "variants": variants.iter().map(|v| &v.tag).collect::<Vec<_>>(),
    }));
  }

  print_success(&format!("{} is valid", project));
  print_stat("Language", settings.language.as_str());
  print_stat("Sanitizers", &join(&settings.sanitizers));
  if !settings.experimental.is_empty() {
    print_stat("Experimental", &join(&settings.experimental));
  }
  print_stat("Architectures", &join(&settings.architectures));
  print_stat("Engines", &join(&settings.engines));
  if !settings.build_flags.is_empty() {
    print_stat("Build flags", &join(settings.build_flags.keys()));
  }
  if let Some(contact) = &settings.metadata.primary_contact {
    print_stat("Contact", contact);
  }
  print_stat("Variants", &variants.len().to_string());

  if settings.metadata.disabled {
    print_warning(&format!("{} is disabled and will not be compiled", project));
  }
  Ok(())
}
