//! Project configuration parsing.
//!
//! [`parse`] turns the raw `project.yaml` text and Dockerfile of a project into
//! an immutable [`ParsedSettings`]. It is a pure transform: defaults come from
//! the language's [`LanguageProfile`], and anything unknown or malformed is a
//! [`ValidationError`] rather than a silent drop.

mod raw;
mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use tracing::debug;

use crate::consts::RESERVED_COMPILE_ENV;

use raw::{RawProjectYaml, RawSanitizer};
pub use types::*;

/// Parse and validate a project's configuration and Dockerfile.
///
/// # Errors
///
/// Returns a [`ValidationError`] for malformed YAML, unknown keys, unknown
/// enum tokens, explicitly empty lists, invalid build flags, or a blank
/// Dockerfile.
pub fn parse(raw_config: &str, raw_dockerfile: &str) -> Result<ParsedSettings, ValidationError> {
  let raw: RawProjectYaml = if raw_config.trim().is_empty() {
    RawProjectYaml::default()
  } else {
    serde_yaml::from_str(raw_config)?
  };

  let language = match raw.language.as_deref() {
    Some(token) => token.parse::<Language>()?,
    None => Language::Cpp,
  };
  let profile = language.profile();

  let (sanitizers, experimental) = match raw.sanitizers {
    Some(entries) => parse_sanitizers(entries)?,
    None => (profile.sanitizers.iter().copied().collect(), BTreeSet::new()),
  };
  let architectures = parse_tokens("architectures", raw.architectures, profile.architectures)?;
  let engines = parse_tokens("fuzzing_engines", raw.fuzzing_engines, profile.engines)?;

  validate_build_flags(&raw.build_flags)?;

  if raw_dockerfile.trim().is_empty() {
    return Err(ValidationError::EmptyDockerfile);
  }

  let metadata = ProjectMetadata {
    homepage: raw.homepage,
    main_repo: raw.main_repo,
    primary_contact: raw.primary_contact,
    auto_ccs: raw.auto_ccs.map(|c| c.into_vec()).unwrap_or_default(),
    vendor_ccs: raw.vendor_ccs.map(|c| c.into_vec()).unwrap_or_default(),
    disabled: raw.disabled,
    builds_per_day: raw.builds_per_day,
    labels: raw.labels,
  };

  debug!(
    language = %language,
    sanitizers = sanitizers.len(),
    architectures = architectures.len(),
    engines = engines.len(),
    "parsed project settings"
  );

  Ok(ParsedSettings {
    language,
    sanitizers,
    architectures,
    engines,
    experimental,
    build_flags: raw.build_flags,
    dockerfile: raw_dockerfile.to_string(),
    metadata,
  })
}

fn parse_tokens<T: FromStr<Err = ValidationError> + Ord + Copy>(
  key: &'static str,
  tokens: Option<Vec<String>>,
  defaults: &[T],
) -> Result<BTreeSet<T>, ValidationError> {
  match tokens {
    None => Ok(defaults.iter().copied().collect()),
    Some(tokens) if tokens.is_empty() => Err(ValidationError::EmptyList(key)),
    Some(tokens) => tokens.iter().map(|t| t.parse::<T>()).collect(),
  }
}

fn parse_sanitizers(entries: Vec<RawSanitizer>) -> Result<(BTreeSet<Sanitizer>, BTreeSet<Sanitizer>), ValidationError> {
  if entries.is_empty() {
    return Err(ValidationError::EmptyList("sanitizers"));
  }

  let mut sanitizers = BTreeSet::new();
  let mut experimental = BTreeSet::new();

  for entry in entries {
    match entry {
      RawSanitizer::Name(name) => {
        sanitizers.insert(name.parse::<Sanitizer>()?);
      }
      RawSanitizer::Detailed(map) => {
        if map.len() != 1 {
          return Err(ValidationError::InvalidSanitizerEntry);
        }
        for (name, options) in map {
          let sanitizer = name.parse::<Sanitizer>()?;
          sanitizers.insert(sanitizer);
          if options.experimental {
            experimental.insert(sanitizer);
          }
        }
      }
    }
  }

  Ok((sanitizers, experimental))
}

fn validate_build_flags(flags: &BTreeMap<String, String>) -> Result<(), ValidationError> {
  for name in flags.keys() {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_uppercase() || c == '_')
      && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if !valid {
      return Err(ValidationError::InvalidFlagName(name.clone()));
    }
    if RESERVED_COMPILE_ENV.contains(&name.as_str()) {
      return Err(ValidationError::ReservedFlag(name.clone()));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  const GOLDEN_YAML: &str = "language: c++\nsanitizers:\n  - address\narchitectures:\n  - x86_64\n";

  #[test]
  fn parses_explicit_sets_and_defaults_engines() {
    let settings = parse(GOLDEN_YAML, "test line").unwrap();

    assert_eq!(settings.language, Language::Cpp);
    assert_eq!(settings.sanitizers, BTreeSet::from([Sanitizer::Address]));
    assert_eq!(settings.architectures, BTreeSet::from([Architecture::X86_64]));
    assert_eq!(settings.engines, BTreeSet::from([Engine::Libfuzzer]));
    assert_eq!(settings.dockerfile, "test line");
  }

  #[test]
  fn omitted_language_defaults_to_cpp() {
    let settings = parse("homepage: https://example.com\n", "FROM base").unwrap();

    assert_eq!(settings.language, Language::Cpp);
    assert_eq!(settings.metadata.homepage.as_deref(), Some("https://example.com"));
  }

  #[test]
  fn empty_config_uses_every_default() {
    let settings = parse("", "FROM base").unwrap();

    assert_eq!(settings.language, Language::Cpp);
    assert_eq!(settings.sanitizers, BTreeSet::from([Sanitizer::Address]));
    assert_eq!(settings.architectures, BTreeSet::from([Architecture::X86_64]));
    assert_eq!(settings.engines, BTreeSet::from([Engine::Libfuzzer]));
  }

  #[test]
  fn javascript_defaults_to_no_sanitizer() {
    let settings = parse("language: javascript\n", "FROM base").unwrap();

    assert_eq!(settings.sanitizers, BTreeSet::from([Sanitizer::None]));
  }

  #[test]
  fn unknown_language_is_rejected() {
    let err = parse("language: cobol\n", "FROM base").unwrap_err();
    assert!(matches!(err, ValidationError::UnknownToken { kind: "language", .. }));
  }

  #[test]
  fn unknown_sanitizer_is_rejected() {
    let err = parse("sanitizers:\n  - address\n  - thread\n", "FROM base").unwrap_err();
    assert!(matches!(err, ValidationError::UnknownToken { kind: "sanitizer", ref token } if token == "thread"));
  }

  #[test]
  fn unknown_architecture_and_engine_are_rejected() {
    let err = parse("architectures:\n  - mips\n", "FROM base").unwrap_err();
    assert!(matches!(err, ValidationError::UnknownToken { kind: "architecture", .. }));

    let err = parse("fuzzing_engines:\n  - centipede\n", "FROM base").unwrap_err();
    assert!(matches!(err, ValidationError::UnknownToken { kind: "fuzzing engine", .. }));
  }

  #[test]
  fn unknown_keys_are_rejected() {
    let err = parse("language: c\nsanitiser:\n  - address\n", "FROM base").unwrap_err();
    assert!(matches!(err, ValidationError::Malformed(_)));
  }

  #[test]
  fn malformed_yaml_is_rejected() {
    let err = parse("language: [c\n", "FROM base").unwrap_err();
    assert!(matches!(err, ValidationError::Malformed(_)));
  }

  #[test]
  fn explicit_empty_list_is_rejected() {
    let err = parse("sanitizers: []\n", "FROM base").unwrap_err();
    assert!(matches!(err, ValidationError::EmptyList("sanitizers")));

    let err = parse("fuzzing_engines: []\n", "FROM base").unwrap_err();
    assert!(matches!(err, ValidationError::EmptyList("fuzzing_engines")));
  }

  #[test]
  fn blank_dockerfile_is_rejected() {
    let err = parse(GOLDEN_YAML, "  \n").unwrap_err();
    assert!(matches!(err, ValidationError::EmptyDockerfile));
  }

  #[test]
  fn experimental_sanitizers_are_kept_and_flagged() {
    let yaml = "sanitizers:\n  - address\n  - memory:\n      experimental: true\n";
    let settings = parse(yaml, "FROM base").unwrap();

    assert_eq!(settings.sanitizers, BTreeSet::from([Sanitizer::Address, Sanitizer::Memory]));
    assert_eq!(settings.experimental, BTreeSet::from([Sanitizer::Memory]));
  }

  #[test]
  fn duplicate_tokens_collapse() {
    let settings = parse("sanitizers:\n  - undefined\n  - address\n  - undefined\n", "FROM base").unwrap();
    assert_eq!(settings.sanitizers.len(), 2);
  }

  #[test]
  fn build_flags_are_validated() {
    let settings = parse("build_flags:\n  ZZ_LAST: \"1\"\n  CFLAGS: -O1\n", "FROM base").unwrap();
    let keys: Vec<_> = settings.build_flags.keys().cloned().collect();
    assert_eq!(keys, vec!["CFLAGS", "ZZ_LAST"]);

    let err = parse("build_flags:\n  cflags: -O1\n", "FROM base").unwrap_err();
    assert!(matches!(err, ValidationError::InvalidFlagName(_)));

    let err = parse("build_flags:\n  SANITIZER: memory\n", "FROM base").unwrap_err();
    assert!(matches!(err, ValidationError::ReservedFlag(_)));
  }

  #[test]
  fn auto_ccs_accepts_string_or_list() {
    let settings = parse("auto_ccs: a@example.com\n", "FROM base").unwrap();
    assert_eq!(settings.metadata.auto_ccs, vec!["a@example.com"]);

    let settings = parse("auto_ccs:\n  - a@example.com\n  - b@example.com\n", "FROM base").unwrap();
    assert_eq!(settings.metadata.auto_ccs.len(), 2);
  }
}
