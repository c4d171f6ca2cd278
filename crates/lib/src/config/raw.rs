//! Wire schema of `project.yaml`.
//!
//! Deserialization is strict: unknown keys are rejected so that a typo such as
//! `sanitiser:` fails loudly instead of silently falling back to defaults.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawProjectYaml {
  pub language: Option<String>,
  pub sanitizers: Option<Vec<RawSanitizer>>,
  pub architectures: Option<Vec<String>>,
  pub fuzzing_engines: Option<Vec<String>>,
  #[serde(default)]
  pub build_flags: BTreeMap<String, String>,

  pub homepage: Option<String>,
  pub main_repo: Option<String>,
  pub primary_contact: Option<String>,
  pub auto_ccs: Option<OneOrMany>,
  pub vendor_ccs: Option<OneOrMany>,
  #[serde(default)]
  pub disabled: bool,
  pub builds_per_day: Option<u32>,
  #[serde(default)]
  pub labels: BTreeMap<String, Vec<String>>,

  // Accepted for compatibility with existing project files; not used here.
  #[allow(dead_code)]
  pub file_github_issue: Option<bool>,
  #[allow(dead_code)]
  pub coverage_extra_args: Option<String>,
  #[allow(dead_code)]
  pub help_url: Option<String>,
  #[allow(dead_code)]
  pub view_restrictions: Option<String>,
}

/// `- address` or `- memory: { experimental: true }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawSanitizer {
  Name(String),
  Detailed(BTreeMap<String, SanitizerOptions>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SanitizerOptions {
  #[serde(default)]
  pub experimental: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
  One(String),
  Many(Vec<String>),
}

impl OneOrMany {
  pub fn into_vec(self) -> Vec<String> {
    match self {
      OneOrMany::One(s) => vec![s],
      OneOrMany::Many(v) => v,
    }
  }
}
