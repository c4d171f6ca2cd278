//! Internal action descriptors.
//!
//! An [`Action`] is what the compiler decides to do; the emitter turns it into
//! one or more [`BuildStep`](super::BuildStep)s. Step names are derived from
//! the action alone, so the compiler can reference an action's steps before
//! rendering it.

use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

use crate::config::{Language, Platform};
use crate::matrix::Variant;

use super::types::StepName;

/// A logical build action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  /// Pull the language's builder base image. Shared by the whole plan.
  FetchBaseImage { image: String },

  /// Build the project image on top of the base image from the stored Dockerfile.
  BuildProjectImage {
    platform: Platform,
    image: String,
    base_image: String,
    dockerfile: String,
  },

  /// Compile one variant inside the project image.
  Compile {
    variant: Variant,
    language: Language,
    platform: Platform,
    image: String,
    out_dir: String,
    build_flags: BTreeMap<String, String>,
  },

  /// Archive a variant's output and upload it with its `latest` pointer.
  Upload {
    variant: Variant,
    out_dir: String,
    archive_path: String,
    archive_name: String,
    archive_url: Url,
    latest_url: Url,
  },

  /// Tag the project image for a variant and push it.
  TagPush {
    variant: Variant,
    source_image: String,
    target_image: String,
  },
}

impl Action {
  /// Names of the steps this action renders to, in order.
  pub fn step_names(&self) -> Vec<StepName> {
    match self {
      Action::FetchBaseImage { .. } => vec![base_image_step()],
      Action::BuildProjectImage { platform, .. } => vec![project_image_step(*platform)],
      Action::Compile { variant, .. } => vec![compile_step(variant)],
      Action::Upload { variant, .. } => vec![
        StepName(format!("archive-{}", variant.tag)),
        StepName(format!("upload-{}", variant.tag)),
        StepName(format!("upload-latest-{}", variant.tag)),
      ],
      Action::TagPush { variant, .. } => vec![
        StepName(format!("tag-{}", variant.tag)),
        StepName(format!("push-{}", variant.tag)),
      ],
    }
  }
}

pub fn base_image_step() -> StepName {
  StepName("base-image".to_string())
}

pub fn project_image_step(platform: Platform) -> StepName {
  StepName(format!("project-image-{}", platform.slug()))
}

pub fn compile_step(variant: &Variant) -> StepName {
  StepName(format!("compile-{}", variant.tag))
}

/// An action together with where it sits in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
  pub action: Action,
  /// Steps the action's first step waits for. Later steps of the same action
  /// wait for their predecessor.
  pub depends_on: Vec<StepName>,
  /// Applied to every step the action renders to.
  pub timeout: Option<Duration>,
}

impl ActionDescriptor {
  pub fn new(action: Action, depends_on: Vec<StepName>, timeout: Option<Duration>) -> Self {
    Self {
      action,
      depends_on,
      timeout,
    }
  }
}
