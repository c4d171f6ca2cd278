//! Implementation of the `fuzzbuild variants` command.
//!
//! Lists every sanitizer × architecture × engine candidate of a project in
//! build order, with the exclusion rule that rejected it, if any.

use std::path::Path;

use anyhow::{Result, bail};

use fuzzbuild_lib::matrix::{self, Candidate};

use crate::output::{OutputFormat, print_json, print_skipped, print_success};

pub fn cmd_variants(projects_dir: &Path, project: &str, format: OutputFormat) -> Result<()> {
  let settings = super::load_settings(projects_dir, project)?;
  let candidates = matrix::explain(&settings);

  if format.is_json() {
    print_json(&candidates)?;
  } else {
    for candidate in &candidates {
      match candidate.excluded_by {
        None => print_success(&candidate.tag().to_string()),
        Some(reason) => print_skipped(&candidate.tag().to_string(), reason),
      }
    }
  }

  if !candidates.iter().any(Candidate::is_allowed) {
    bail!("Project {} has no valid build variants", project);
  }
  Ok(())
}
