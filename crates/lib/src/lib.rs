//! fuzzbuild-lib: build plan compilation for continuous fuzzing
//!
//! This crate turns a project's stored configuration into the ordered list of
//! steps a build backend executes:
//! - `project`: project records and the registries that store them
//! - `config`: parsing and validation of `project.yaml`
//! - `matrix`: sanitizer × architecture × engine expansion
//! - `sign`: signed upload URLs
//! - `plan`: the compiler, its actions and the emitted `BuildPlan`

pub mod clock;
pub mod config;
pub mod consts;
pub mod matrix;
pub mod plan;
pub mod project;
pub mod sign;
pub mod util;

pub use clock::{Clock, FixedClock, SystemClock};
pub use plan::{BuildPlan, BuildStep, CompileError, CompileOptions, Compiler, ErrorKind};
