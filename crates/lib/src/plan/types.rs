//! Build step and plan types.
//!
//! These are the records handed to the build backend. Their serialized form is
//! part of the contract: field order is fixed by declaration order, `env`
//! keeps insertion order, and `timeout` renders as `"<seconds>s"`.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix::VariantTag;
use crate::util::hash::Hashable;

/// Identifier of a step, unique within one plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepName(pub String);

impl StepName {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for StepName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for StepName {
  fn from(s: &str) -> Self {
    StepName(s.to_string())
  }
}

/// One instruction for the build backend.
///
/// Equality is order-sensitive in every field, `env` included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStep {
  pub name: StepName,
  pub args: Vec<String>,
  #[serde(default)]
  pub env: IndexMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "timeout_secs")]
  pub timeout: Option<Duration>,
  #[serde(default)]
  pub depends_on: Vec<StepName>,
}

impl PartialEq for BuildStep {
  fn eq(&self, other: &Self) -> bool {
    self.name == other.name
      && self.args == other.args
      && self.env.iter().eq(other.env.iter())
      && self.timeout == other.timeout
      && self.depends_on == other.depends_on
  }
}

impl Eq for BuildStep {}

mod timeout_secs {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer, de::Error};

  pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
      Some(d) => serializer.serialize_str(&format!("{}s", d.as_secs())),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
      return Ok(None);
    };
    raw
      .strip_suffix('s')
      .and_then(|secs| secs.parse::<u64>().ok())
      .map(|secs| Some(Duration::from_secs(secs)))
      .ok_or_else(|| D::Error::custom(format!("invalid timeout '{raw}', expected '<seconds>s'")))
  }
}

/// The ordered steps compiled for one project at one logical time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPlan {
  pub project: String,
  pub issued_at: DateTime<Utc>,
  /// Deterministic tag pushed images carry: `<project>-<timestamp>`.
  pub image_tag: String,
  pub variants: Vec<VariantTag>,
  pub steps: Vec<BuildStep>,
}

impl Hashable for BuildPlan {}

impl BuildPlan {
  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// Look up a step by name.
  pub fn step(&self, name: &str) -> Option<&BuildStep> {
    self.steps.iter().find(|s| s.name.as_str() == name)
  }

  /// Step names in emission order.
  pub fn step_names(&self) -> impl Iterator<Item = &StepName> {
    self.steps.iter().map(|s| &s.name)
  }
}

/// Structural violations caught while assembling a plan.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
  #[error("duplicate step name '{0}'")]
  DuplicateStep(StepName),

  #[error("step '{step}' depends on '{dependency}' which has not been emitted")]
  ForwardReference { step: StepName, dependency: StepName },
}

/// Accumulates steps while enforcing unique names and backward-only dependencies.
#[derive(Debug, Default)]
pub struct PlanBuilder {
  steps: Vec<BuildStep>,
  emitted: HashSet<StepName>,
}

impl PlanBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Whether a step with this name has already been emitted.
  pub fn contains(&self, name: &StepName) -> bool {
    self.emitted.contains(name)
  }

  pub fn push(&mut self, step: BuildStep) -> Result<(), PlanError> {
    if self.emitted.contains(&step.name) {
      return Err(PlanError::DuplicateStep(step.name));
    }
    if let Some(missing) = step.depends_on.iter().find(|dep| !self.emitted.contains(*dep)) {
      return Err(PlanError::ForwardReference {
        step: step.name.clone(),
        dependency: missing.clone(),
      });
    }

    self.emitted.insert(step.name.clone());
    self.steps.push(step);
    Ok(())
  }

  pub fn extend(&mut self, steps: impl IntoIterator<Item = BuildStep>) -> Result<(), PlanError> {
    for step in steps {
      self.push(step)?;
    }
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn finish(self) -> Vec<BuildStep> {
    self.steps
  }
}
