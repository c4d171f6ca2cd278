//! Build plan compilation.
//!
//! [`Compiler::compile`] turns a project name into a [`BuildPlan`]: fetch the
//! record, parse it, expand the variant matrix, then emit actions variant by
//! variant. One compilation moves through
//! `Start -> Fetched -> Parsed -> Expanded -> Emitting(i) -> Done` and either
//! returns the whole plan or an error, never a partial plan.
//!
//! # Plan shape
//!
//! ```text
//! base-image
//! project-image-amd64            (once per container platform, on first use)
//! compile-<tag>                  per variant, in matrix order:
//! archive-<tag>                    compile, archive, upload, upload-latest,
//! upload-<tag>                     tag, push
//! upload-latest-<tag>
//! tag-<tag>
//! push-<tag>
//! ```

mod action;
mod emit;
mod graph;
mod types;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::{self, Architecture, Engine, Platform, Sanitizer, ValidationError};
use crate::consts::{ARCHIVE_STAMP_FORMAT, COVERAGE_BUCKET, IMAGE_TAG_TIME_FORMAT};
use crate::matrix::{self, ConfigurationError, Variant};
use crate::project::{ProjectRegistry, RegistryError};
use crate::sign::{ResolveError, SignError, SignedUrlResolver, UrlSigner};

pub use action::{Action, ActionDescriptor, base_image_step, compile_step, project_image_step};
pub use emit::{ARCHIVE_SCRIPT, BUILD_IMAGE_SCRIPT, render};
pub use graph::{GraphError, PlanGraph};
pub use types::{BuildPlan, BuildStep, PlanBuilder, PlanError, StepName};

/// Compiler settings. Everything here is static for a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
  /// Container registry host, e.g. `gcr.io`.
  pub registry_host: String,
  /// Registry project that receives project images.
  pub image_project: String,
  /// Registry project that publishes the builder base images.
  pub base_images_project: String,
  /// Root of the build workspace on the worker.
  pub workspace: String,
  pub pull_timeout: Duration,
  pub image_timeout: Duration,
  pub compile_timeout: Duration,
  pub upload_timeout: Duration,
  pub push_timeout: Duration,
}

impl Default for CompileOptions {
  fn default() -> Self {
    Self {
      registry_host: "gcr.io".to_string(),
      image_project: "oss-fuzz".to_string(),
      base_images_project: "oss-fuzz-base".to_string(),
      workspace: "/workspace".to_string(),
      pull_timeout: Duration::from_secs(600),
      image_timeout: Duration::from_secs(30 * 60),
      compile_timeout: Duration::from_secs(4 * 60 * 60),
      upload_timeout: Duration::from_secs(600),
      push_timeout: Duration::from_secs(600),
    }
  }
}

impl CompileOptions {
  fn base_image(&self, language: config::Language) -> String {
    format!(
      "{}/{}/{}",
      self.registry_host,
      self.base_images_project,
      language.base_image()
    )
  }

  fn project_image(&self, project: &str, platform: Platform) -> String {
    match platform {
      Platform::Amd64 => format!("{}/{}/{}", self.registry_host, self.image_project, project),
      Platform::Arm64 => format!("{}/{}/{}-arm64", self.registry_host, self.image_project, project),
    }
  }
}

/// Where a compilation was when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Start,
  Fetched,
  Parsed,
  Expanded,
  /// Emitting the variant at this index.
  Emitting(usize),
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Phase::Start => f.write_str("start"),
      Phase::Fetched => f.write_str("fetched"),
      Phase::Parsed => f.write_str("parsed"),
      Phase::Expanded => f.write_str("expanded"),
      Phase::Emitting(i) => write!(f, "emitting variant {}", i),
    }
  }
}

/// Operational failures of an external collaborator. Worth retrying from scratch.
#[derive(Debug, Error)]
pub enum BuildPlanError {
  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error("failed to sign {path}: {source}")]
  Signing {
    path: String,
    #[source]
    source: SignError,
  },
}

/// Everything [`Compiler::compile`] can fail with.
#[derive(Debug, Error)]
pub enum CompileError {
  #[error("project '{0}' not found")]
  NotFound(String),

  #[error("invalid project configuration: {0}")]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Configuration(#[from] ConfigurationError),

  #[error(transparent)]
  Transient(#[from] BuildPlanError),

  #[error("compilation cancelled at {phase}")]
  Cancelled { phase: Phase },

  #[error("internal plan error: {0}")]
  InvalidPlan(#[from] PlanError),
}

/// Coarse classification of a [`CompileError`] for callers and exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Validation,
  Configuration,
  Transient,
  Cancelled,
  Internal,
}

impl ErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorKind::NotFound => "not-found",
      ErrorKind::Validation => "validation",
      ErrorKind::Configuration => "configuration",
      ErrorKind::Transient => "transient",
      ErrorKind::Cancelled => "cancelled",
      ErrorKind::Internal => "internal",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl CompileError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      CompileError::NotFound(_) => ErrorKind::NotFound,
      CompileError::Validation(_) => ErrorKind::Validation,
      CompileError::Configuration(_) => ErrorKind::Configuration,
      CompileError::Transient(_) => ErrorKind::Transient,
      CompileError::Cancelled { .. } => ErrorKind::Cancelled,
      CompileError::InvalidPlan(_) => ErrorKind::Internal,
    }
  }

  /// Whether retrying the whole compilation may succeed.
  pub fn is_transient(&self) -> bool {
    matches!(self, CompileError::Transient(_))
  }
}

impl From<RegistryError> for CompileError {
  fn from(err: RegistryError) -> Self {
    CompileError::Transient(BuildPlanError::Registry(err))
  }
}

/// Turns project names into build plans.
///
/// Holds only shared, read-only collaborators, so one compiler serves any
/// number of concurrent compilations.
#[derive(Clone)]
pub struct Compiler {
  registry: Arc<dyn ProjectRegistry>,
  signer: Arc<dyn UrlSigner>,
  clock: Arc<dyn Clock>,
  options: CompileOptions,
}

/// Names fixed for one compilation by the captured time.
struct Stamps<'a> {
  project: &'a str,
  image_tag: String,
  archive_stamp: String,
}

impl<'a> Stamps<'a> {
  fn new(project: &'a str, issued_at: DateTime<Utc>) -> Self {
    Self {
      project,
      image_tag: format!("{}-{}", project, issued_at.format(IMAGE_TAG_TIME_FORMAT)),
      archive_stamp: issued_at.format(ARCHIVE_STAMP_FORMAT).to_string(),
    }
  }
}

/// Storage bucket a variant's archive is uploaded to.
pub fn upload_bucket(variant: &Variant) -> String {
  let bucket = if variant.sanitizer == Sanitizer::Coverage {
    COVERAGE_BUCKET
  } else {
    match variant.engine {
      Engine::Libfuzzer => "clusterfuzz-builds",
      Engine::Afl => "clusterfuzz-builds-afl",
      Engine::Honggfuzz => "clusterfuzz-builds-honggfuzz",
      Engine::None => "clusterfuzz-builds-no-engine",
    }
  };

  match variant.architecture {
    Architecture::X86_64 => bucket.to_string(),
    other => format!("{}-{}", bucket, other),
  }
}

fn check(cancel: &CancellationToken, phase: Phase) -> Result<(), CompileError> {
  if cancel.is_cancelled() {
    debug!(%phase, "compilation cancelled");
    return Err(CompileError::Cancelled { phase });
  }
  Ok(())
}

impl Compiler {
  pub fn new(registry: Arc<dyn ProjectRegistry>, signer: Arc<dyn UrlSigner>, clock: Arc<dyn Clock>) -> Self {
    Self {
      registry,
      signer,
      clock,
      options: CompileOptions::default(),
    }
  }

  pub fn with_options(mut self, options: CompileOptions) -> Self {
    self.options = options;
    self
  }

  pub fn options(&self) -> &CompileOptions {
    &self.options
  }

  pub fn registry(&self) -> &dyn ProjectRegistry {
    self.registry.as_ref()
  }

  /// Compile `name` into its build plan.
  ///
  /// # Errors
  ///
  /// See [`CompileError`]. No partial plan is ever returned.
  pub fn compile(&self, name: &str) -> Result<BuildPlan, CompileError> {
    self.compile_with_cancel(name, &CancellationToken::new())
  }

  /// Like [`compile`](Self::compile), stopping early once `cancel` fires.
  ///
  /// The token is checked at every phase transition, before each variant and
  /// before each signing request.
  pub fn compile_with_cancel(&self, name: &str, cancel: &CancellationToken) -> Result<BuildPlan, CompileError> {
    let issued_at = self.clock.now();
    check(cancel, Phase::Start)?;
    info!(project = %name, %issued_at, "compiling build plan");

    let record = self
      .registry
      .get(name)?
      .ok_or_else(|| CompileError::NotFound(name.to_string()))?;
    check(cancel, Phase::Fetched)?;

    let settings = config::parse(&record.project_yaml, &record.dockerfile)?;
    if settings.metadata.disabled {
      return Err(ConfigurationError::Disabled.into());
    }
    check(cancel, Phase::Parsed)?;

    let variants = matrix::expand(&settings)?;
    check(cancel, Phase::Expanded)?;
    info!(project = %name, variants = variants.len(), "expanded variant matrix");

    let stamps = Stamps::new(&record.name, issued_at);
    let resolver = SignedUrlResolver::new(self.signer.as_ref(), issued_at, cancel);
    let mut builder = PlanBuilder::new();

    builder.extend(render(&ActionDescriptor::new(
      Action::FetchBaseImage {
        image: self.options.base_image(settings.language),
      },
      Vec::new(),
      Some(self.options.pull_timeout),
    )))?;

    for (index, variant) in variants.iter().enumerate() {
      let phase = Phase::Emitting(index);
      check(cancel, phase)?;
      debug!(project = %name, variant = %variant.tag, "emitting variant");

      let platform = variant.architecture.platform();
      let image_step = project_image_step(platform);
      let image = self.options.project_image(&record.name, platform);
      if !builder.contains(&image_step) {
        builder.extend(render(&ActionDescriptor::new(
          Action::BuildProjectImage {
            platform,
            image: image.clone(),
            base_image: self.options.base_image(settings.language),
            dockerfile: settings.dockerfile.clone(),
          },
          vec![base_image_step()],
          Some(self.options.image_timeout),
        )))?;
      }

      let out_dir = format!("{}/out/{}", self.options.workspace, variant.tag);
      let compile = compile_step(variant);
      builder.extend(render(&ActionDescriptor::new(
        Action::Compile {
          variant: variant.clone(),
          language: settings.language,
          platform,
          image: image.clone(),
          out_dir: out_dir.clone(),
          build_flags: settings.build_flags.clone(),
        },
        vec![image_step],
        Some(self.options.compile_timeout),
      )))?;

      let upload = self.upload_action(&stamps, variant, out_dir, &resolver, phase)?;
      builder.extend(render(&ActionDescriptor::new(
        upload,
        vec![compile.clone()],
        Some(self.options.upload_timeout),
      )))?;

      builder.extend(render(&ActionDescriptor::new(
        Action::TagPush {
          variant: variant.clone(),
          source_image: image,
          target_image: format!(
            "{}/{}/{}-{}:{}",
            self.options.registry_host, self.options.image_project, record.name, variant.tag, stamps.image_tag
          ),
        },
        vec![compile],
        Some(self.options.push_timeout),
      )))?;
    }

    let steps = builder.finish();
    info!(project = %name, steps = steps.len(), "build plan compiled");

    Ok(BuildPlan {
      project: record.name.clone(),
      issued_at,
      image_tag: stamps.image_tag,
      variants: variants.into_iter().map(|v| v.tag).collect(),
      steps,
    })
  }

  fn upload_action(
    &self,
    stamps: &Stamps<'_>,
    variant: &Variant,
    out_dir: String,
    resolver: &SignedUrlResolver<'_>,
    phase: Phase,
  ) -> Result<Action, CompileError> {
    let bucket = upload_bucket(variant);
    let archive_name = format!("{}-{}-{}.zip", stamps.project, variant.sanitizer, stamps.archive_stamp);
    let archive_object = format!("/{}/{}/{}", bucket, stamps.project, archive_name);
    let latest_object = format!(
      "/{}/{}/{}-{}-latest.version",
      bucket, stamps.project, stamps.project, variant.sanitizer
    );

    let sign = |path: &str| {
      resolver.resolve_upload_url(path).map_err(|err| match err {
        ResolveError::Cancelled => CompileError::Cancelled { phase },
        ResolveError::Sign { path, source } => CompileError::Transient(BuildPlanError::Signing { path, source }),
      })
    };
    let archive_url = sign(&archive_object)?;
    let latest_url = sign(&latest_object)?;

    Ok(Action::Upload {
      variant: variant.clone(),
      archive_path: format!("{}.zip", out_dir),
      out_dir,
      archive_name,
      archive_url,
      latest_url,
    })
  }
}
