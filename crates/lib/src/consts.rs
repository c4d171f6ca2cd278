//! Constants shared across the compiler.

/// Length of the truncated plan hash (hex characters).
pub const PLAN_HASH_PREFIX_LEN: usize = 20;

/// File holding a project's configuration inside its registry directory.
pub const PROJECT_YAML_FILENAME: &str = "project.yaml";

/// File holding a project's build recipe inside its registry directory.
pub const DOCKERFILE_FILENAME: &str = "Dockerfile";

/// Format of the image tag suffix: `<project>-20200101T000000Z`.
pub const IMAGE_TAG_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Format of the stamp embedded in uploaded archive names.
pub const ARCHIVE_STAMP_FORMAT: &str = "%Y%m%d%H%M";

/// Number of build steps every variant contributes to a plan.
///
/// compile, archive, upload, upload-latest, tag, push.
pub const STEPS_PER_VARIANT: usize = 6;

/// Bucket receiving coverage builds, regardless of engine.
pub const COVERAGE_BUCKET: &str = "oss-fuzz-coverage";

/// Environment variables the compile step always sets; build flags may not shadow them.
pub const RESERVED_COMPILE_ENV: &[&str] = &["FUZZING_ENGINE", "SANITIZER", "ARCHITECTURE", "FUZZING_LANGUAGE"];
