//! Parsed project settings.
//!
//! Every enum below declares its variants in canonical priority order, so the
//! derived `Ord` and the `ALL` slices agree. Expansion iterates `ALL`, never
//! the order in which a project happened to list its tokens.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Errors produced while parsing or validating a project configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
  /// The configuration text is not valid YAML or does not match the schema
  /// (including unknown keys).
  #[error("malformed project.yaml: {0}")]
  Malformed(#[from] serde_yaml::Error),

  /// A token is not a member of its enumeration.
  #[error("unknown {kind} '{token}'")]
  UnknownToken { kind: &'static str, token: String },

  /// A list was given explicitly but contains nothing.
  #[error("'{0}' must not be empty when present")]
  EmptyList(&'static str),

  /// A sanitizer mapping entry is not a single-key map.
  #[error("sanitizer entries must be a name or a single-key mapping")]
  InvalidSanitizerEntry,

  /// A build flag name is not a valid environment variable name.
  #[error("invalid build flag name '{0}': expected [A-Z_][A-Z0-9_]*")]
  InvalidFlagName(String),

  /// A build flag would overwrite a variable the compile step sets itself.
  #[error("build flag '{0}' is reserved")]
  ReservedFlag(String),

  /// The stored Dockerfile has no content.
  #[error("Dockerfile is empty")]
  EmptyDockerfile,
}

macro_rules! token_enum {
  (
    $(#[$meta:meta])*
    $name:ident, $kind:literal {
      $( $(#[$vmeta:meta])* $variant:ident => $token:literal $(| $alias:literal)* ),+ $(,)?
    }
  ) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum $name {
      $( $(#[$vmeta])* $variant ),+
    }

    impl $name {
      /// All variants, in canonical priority order.
      pub const ALL: &'static [$name] = &[$($name::$variant),+];

      /// The token used in configuration files and build arguments.
      pub fn as_str(&self) -> &'static str {
        match self {
          $( $name::$variant => $token ),+
        }
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl FromStr for $name {
      type Err = ValidationError;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          $( $token $(| $alias)* => Ok($name::$variant), )+
          other => Err(ValidationError::UnknownToken {
            kind: $kind,
            token: other.to_string(),
          }),
        }
      }
    }

    impl Serialize for $name {
      fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
      }
    }
  };
}

token_enum! {
  /// Project implementation language.
  Language, "language" {
    C => "c",
    Cpp => "c++",
    Go => "go",
    Python => "python",
    Rust => "rust",
    Jvm => "jvm",
    Swift => "swift",
    JavaScript => "javascript",
  }
}

token_enum! {
  /// Sanitizer a variant is instrumented with.
  Sanitizer, "sanitizer" {
    Address => "address",
    Undefined => "undefined",
    Memory => "memory",
    Coverage => "coverage",
    None => "none",
  }
}

token_enum! {
  /// Target CPU architecture.
  Architecture, "architecture" {
    X86_64 => "x86_64",
    I386 => "i386",
    Arm64 => "arm64" | "aarch64",
  }
}

token_enum! {
  /// Fuzzing engine linked into the targets.
  Engine, "fuzzing engine" {
    Libfuzzer => "libfuzzer",
    Afl => "afl",
    Honggfuzz => "honggfuzz",
    None => "none",
  }
}

impl Language {
  /// `c` and `c++` are built natively; everything else goes through a
  /// language-specific toolchain layered on libFuzzer.
  pub fn is_c_family(&self) -> bool {
    matches!(self, Language::C | Language::Cpp)
  }

  /// Name of the builder base image for this language.
  pub fn base_image(&self) -> &'static str {
    match self {
      Language::C | Language::Cpp => "base-builder",
      Language::Go => "base-builder-go",
      Language::Python => "base-builder-python",
      Language::Rust => "base-builder-rust",
      Language::Jvm => "base-builder-jvm",
      Language::Swift => "base-builder-swift",
      Language::JavaScript => "base-builder-javascript",
    }
  }

  /// Defaults applied to any dimension a project omits.
  pub fn profile(&self) -> LanguageProfile {
    match self {
      Language::JavaScript => LanguageProfile {
        sanitizers: &[Sanitizer::None],
        architectures: &[Architecture::X86_64],
        engines: &[Engine::Libfuzzer],
      },
      _ => LanguageProfile::DEFAULT,
    }
  }
}

impl Architecture {
  /// Container platform the project image for this architecture runs on.
  ///
  /// `i386` targets are cross-compiled inside the `x86_64` image.
  pub fn platform(&self) -> Platform {
    match self {
      Architecture::X86_64 | Architecture::I386 => Platform::Amd64,
      Architecture::Arm64 => Platform::Arm64,
    }
  }
}

/// Container platform of a project image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
  Amd64,
  Arm64,
}

impl Platform {
  /// Short name used in step names and image names.
  pub fn slug(&self) -> &'static str {
    match self {
      Platform::Amd64 => "amd64",
      Platform::Arm64 => "arm64",
    }
  }

  /// Docker `--platform` value.
  pub fn docker(&self) -> &'static str {
    match self {
      Platform::Amd64 => "linux/amd64",
      Platform::Arm64 => "linux/arm64",
    }
  }
}

/// Language-specific defaults for omitted dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageProfile {
  pub sanitizers: &'static [Sanitizer],
  pub architectures: &'static [Architecture],
  pub engines: &'static [Engine],
}

impl LanguageProfile {
  pub const DEFAULT: LanguageProfile = LanguageProfile {
    sanitizers: &[Sanitizer::Address],
    architectures: &[Architecture::X86_64],
    engines: &[Engine::Libfuzzer],
  };
}

/// Descriptive fields of a project. Persisted alongside the configuration but
/// only `disabled` affects compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectMetadata {
  pub homepage: Option<String>,
  pub main_repo: Option<String>,
  pub primary_contact: Option<String>,
  pub auto_ccs: Vec<String>,
  pub vendor_ccs: Vec<String>,
  pub disabled: bool,
  pub builds_per_day: Option<u32>,
  pub labels: BTreeMap<String, Vec<String>>,
}

/// Validated, defaulted settings for one project.
///
/// Immutable once produced by [`parse`](super::parse); every set is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedSettings {
  pub language: Language,
  pub sanitizers: BTreeSet<Sanitizer>,
  pub architectures: BTreeSet<Architecture>,
  pub engines: BTreeSet<Engine>,
  /// Sanitizers declared with `experimental: true`. Still built.
  pub experimental: BTreeSet<Sanitizer>,
  /// Extra variables exported to every compile step, sorted by name.
  pub build_flags: BTreeMap<String, String>,
  pub dockerfile: String,
  pub metadata: ProjectMetadata,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokens_roundtrip_through_from_str() {
    for sanitizer in Sanitizer::ALL {
      assert_eq!(sanitizer.as_str().parse::<Sanitizer>().unwrap(), *sanitizer);
    }
    for engine in Engine::ALL {
      assert_eq!(engine.as_str().parse::<Engine>().unwrap(), *engine);
    }
    for language in Language::ALL {
      assert_eq!(language.as_str().parse::<Language>().unwrap(), *language);
    }
  }

  #[test]
  fn aarch64_is_an_alias_for_arm64() {
    assert_eq!("aarch64".parse::<Architecture>().unwrap(), Architecture::Arm64);
    assert_eq!(Architecture::Arm64.as_str(), "arm64");
  }

  #[test]
  fn unknown_token_names_its_kind() {
    let err = "thread".parse::<Sanitizer>().unwrap_err();
    assert_eq!(err.to_string(), "unknown sanitizer 'thread'");
  }

  #[test]
  fn all_is_sorted_by_priority() {
    let mut sorted = Sanitizer::ALL.to_vec();
    sorted.sort();
    assert_eq!(sorted, Sanitizer::ALL);
    assert_eq!(Architecture::ALL[0], Architecture::X86_64);
    assert_eq!(Engine::ALL[0], Engine::Libfuzzer);
  }

  #[test]
  fn i386_shares_the_amd64_image() {
    assert_eq!(Architecture::I386.platform(), Architecture::X86_64.platform());
    assert_ne!(Architecture::Arm64.platform(), Platform::Amd64);
  }
}
