mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use output::OutputFormat;

/// fuzzbuild - compile continuous fuzzing build plans
#[derive(Parser)]
#[command(name = "fuzzbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Directory holding one sub-directory per project
  #[arg(long, global = true, env = "FUZZBUILD_PROJECTS_DIR", default_value = "projects")]
  projects_dir: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile build plans for one or more projects
  Compile(cmd::CompileArgs),

  /// Show the variant matrix of a project and why candidates were excluded
  Variants {
    /// Project name
    project: String,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Parse and validate a project's configuration
  Validate {
    /// Project name
    project: String,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Compile(args) => cmd::cmd_compile(&cli.projects_dir, args, cli.verbose),
    Commands::Variants { project, format } => cmd::cmd_variants(&cli.projects_dir, &project, format),
    Commands::Validate { project, format } => cmd::cmd_validate(&cli.projects_dir, &project, format),
  }
}
