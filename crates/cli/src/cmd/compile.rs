//! Implementation of the `fuzzbuild compile` command.
//!
//! Compiles build plans for the requested projects concurrently. Each
//! compilation runs on a blocking task; a deadline cancels whatever is still
//! running through one shared token.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use clap::Args;
use serde_json::json;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use fuzzbuild_lib::plan::{BuildPlan, CompileError, CompileOptions, Compiler};
use fuzzbuild_lib::project::{DirRegistry, ProjectRegistry};
use fuzzbuild_lib::sign::DigestSigner;
use fuzzbuild_lib::util::hash::Hashable;
use fuzzbuild_lib::{Clock, FixedClock, SystemClock};

use crate::output::{
  OutputFormat, format_duration, print_error, print_info, print_json, print_stat, print_success, print_warning,
  symbols, truncate_hash,
};

#[derive(Debug, Args)]
pub struct CompileArgs {
  /// Projects to compile
  #[arg(required_unless_present = "all", conflicts_with = "all")]
  projects: Vec<String>,

  /// Compile every project in the projects directory
  #[arg(long)]
  all: bool,

  /// Registry project receiving built images
  #[arg(long, env = "FUZZBUILD_IMAGE_PROJECT", default_value = "oss-fuzz")]
  image_project: String,

  /// Registry project publishing the builder base images
  #[arg(long, env = "FUZZBUILD_BASE_IMAGES_PROJECT", default_value = "oss-fuzz-base")]
  base_images_project: String,

  /// Logical build time (RFC 3339); defaults to now
  #[arg(long)]
  at: Option<DateTime<Utc>>,

  /// Cancel compilations still running after this long, e.g. "30s"
  #[arg(long, value_parser = humantime::parse_duration)]
  deadline: Option<Duration>,

  /// Secret used to sign upload URLs
  #[arg(long, env = "FUZZBUILD_SIGNING_KEY", hide_env_values = true)]
  signing_key: String,

  /// Account named in signed upload URLs
  #[arg(long, env = "FUZZBUILD_SERVICE_ACCOUNT", default_value = "fuzzbuild@localhost")]
  service_account: String,

  /// Storage endpoint upload URLs point at
  #[arg(long, env = "FUZZBUILD_STORAGE_ENDPOINT", default_value = "https://storage.googleapis.com")]
  storage_endpoint: Url,

  /// How long signed upload URLs stay valid
  #[arg(long, value_parser = humantime::parse_duration, default_value = "1h")]
  url_validity: Duration,

  /// Write each plan to <DIR>/<project>.json instead of printing it
  #[arg(long)]
  output_dir: Option<PathBuf>,

  #[arg(long, value_enum, default_value_t)]
  format: OutputFormat,
}

type Outcome = (String, Result<BuildPlan, CompileError>);

pub fn cmd_compile(projects_dir: &Path, args: CompileArgs, verbose: bool) -> Result<()> {
  let registry = Arc::new(DirRegistry::new(projects_dir));
  let names = if args.all {
    registry
      .names()
      .with_context(|| format!("Failed to list projects in {}", projects_dir.display()))?
  } else {
    args.projects.clone()
  };

  if names.is_empty() {
    print_warning(&format!("No projects found in {}", projects_dir.display()));
    return Ok(());
  }

  let clock: Arc<dyn Clock> = match args.at {
    Some(at) => Arc::new(FixedClock(at)),
    None => Arc::new(SystemClock),
  };
  let validity = TimeDelta::from_std(args.url_validity)
    .ok()
    .filter(|validity| clock.now().checked_add_signed(*validity).is_some())
    .with_context(|| format!("URL validity {} is out of range", humantime::format_duration(args.url_validity)))?;
  let signer = Arc::new(DigestSigner::new(
    args.storage_endpoint.clone(),
    args.service_account.as_str(),
    args.signing_key.as_str(),
    validity,
  ));
  let options = CompileOptions {
    image_project: args.image_project.clone(),
    base_images_project: args.base_images_project.clone(),
    ..CompileOptions::default()
  };
  let compiler = Compiler::new(registry, signer, clock).with_options(options);

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcomes = rt.block_on(compile_all(compiler, names, args.deadline))?;
  let elapsed = started.elapsed();

  let total = outcomes.len();
  let failed = outcomes.iter().filter(|(_, result)| result.is_err()).count();

  if let Some(dir) = &args.output_dir {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
  }

  if args.format.is_json() {
    let mut report = Vec::with_capacity(total);
    for (name, result) in &outcomes {
      report.push(match result {
        Ok(plan) => match &args.output_dir {
          Some(dir) => json!({ "project": name, "path": write_plan(dir, plan)? }),
          None => json!({ "project": name, "plan": plan }),
        },
        Err(err) => json!({ "project": name, "error": { "kind": err.kind().as_str(), "message": err.to_string() } }),
      });
    }
    print_json(&report)?;
  } else {
    for (name, result) in &outcomes {
      match result {
        Ok(plan) => print_plan(name, plan, args.output_dir.as_deref(), verbose)?,
        Err(err) => print_error(&format!("{}: [{}] {}", name, err.kind(), err)),
      }
    }
    println!();
    print_info(&format!(
      "Compiled {} of {} project(s) in {}",
      total - failed,
      total,
      format_duration(elapsed)
    ));
  }

  if failed > 0 {
    bail!("{} of {} project(s) failed to compile", failed, total);
  }
  Ok(())
}

/// Compile every project concurrently, returning outcomes in request order.
///
/// A zero deadline cancels before any compilation starts.
async fn compile_all(compiler: Compiler, names: Vec<String>, deadline: Option<Duration>) -> Result<Vec<Outcome>> {
  let cancel = CancellationToken::new();
  match deadline {
    Some(deadline) if deadline.is_zero() => cancel.cancel(),
    Some(deadline) => {
      let token = cancel.clone();
      tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        warn!(deadline = %humantime::format_duration(deadline), "deadline reached, cancelling compilations");
        token.cancel();
      });
    }
    None => {}
  }

  run_compilations(compiler, names, cancel).await
}

async fn run_compilations(compiler: Compiler, names: Vec<String>, cancel: CancellationToken) -> Result<Vec<Outcome>> {
  let mut tasks = JoinSet::new();
  for (index, name) in names.into_iter().enumerate() {
    let compiler = compiler.clone();
    let cancel = cancel.clone();
    tasks.spawn_blocking(move || {
      let result = compiler.compile_with_cancel(&name, &cancel);
      (index, name, result)
    });
  }

  let mut outcomes = Vec::new();
  while let Some(joined) = tasks.join_next().await {
    outcomes.push(joined.context("Compilation task panicked")?);
  }
  outcomes.sort_by_key(|(index, _, _)| *index);
  info!(projects = outcomes.len(), "compilations finished");

  Ok(outcomes.into_iter().map(|(_, name, result)| (name, result)).collect())
}

fn write_plan(dir: &Path, plan: &BuildPlan) -> Result<String> {
  let path = dir.join(format!("{}.json", plan.project));
  let json = serde_json::to_string_pretty(plan).context("Failed to serialize plan")?;
  fs::write(&path, json).with_context(|| format!("Failed to write plan: {}", path.display()))?;
  Ok(path.display().to_string())
}

fn print_plan(name: &str, plan: &BuildPlan, output_dir: Option<&Path>, verbose: bool) -> Result<()> {
  let hash = plan.compute_hash().context("Failed to compute plan hash")?;

  print_success(&format!(
    "{}: {} step(s) for {} variant(s)",
    name,
    plan.len(),
    plan.variants.len()
  ));
  print_stat("Image tag", &plan.image_tag);
  print_stat("Plan", truncate_hash(&hash.0));

  match output_dir {
    Some(dir) => print_stat("Path", &write_plan(dir, plan)?),
    None => {
      for step in &plan.steps {
        if verbose && !step.depends_on.is_empty() {
          let deps: Vec<_> = step.depends_on.iter().map(|d| d.as_str()).collect();
          println!("  {} {} {} {}", symbols::INFO, step.name, symbols::ARROW, deps.join(", "));
        } else {
          println!("  {} {}", symbols::INFO, step.name);
        }
      }
    }
  }
  Ok(())
}
