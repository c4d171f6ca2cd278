//! Variant matrix expansion.
//!
//! A project's sanitizer, architecture and engine sets are expanded into the
//! ordered list of [`Variant`]s to build. Iteration always follows the
//! canonical priority lists (`Sanitizer::ALL`, `Architecture::ALL`,
//! `Engine::ALL`) so two equivalent settings produce the same order no matter
//! how their sets were written.

mod rules;

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::{Architecture, Engine, Language, ParsedSettings, Sanitizer};

pub use rules::{EXCLUSION_RULES, ExclusionRule, Match, find_exclusion, is_allowed};

/// A syntactically valid project that still cannot be built.
#[derive(Debug, Error)]
pub enum ConfigurationError {
  /// Exclusion rules removed every candidate.
  #[error("no valid build variants ({} candidate(s) excluded)", rejected.len())]
  NoValidVariants { rejected: Vec<Candidate> },

  /// The project is marked `disabled`.
  #[error("project is disabled")]
  Disabled,
}

/// Deterministic identifier of a variant: `<engine>-<sanitizer>-<architecture>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VariantTag(pub String);

impl VariantTag {
  pub fn new(sanitizer: Sanitizer, architecture: Architecture, engine: Engine) -> Self {
    VariantTag(format!("{}-{}-{}", engine, sanitizer, architecture))
  }
}

impl fmt::Display for VariantTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// One point of the sanitizer × architecture × engine matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Variant {
  pub sanitizer: Sanitizer,
  pub architecture: Architecture,
  pub engine: Engine,
  pub tag: VariantTag,
}

impl Variant {
  pub fn new(sanitizer: Sanitizer, architecture: Architecture, engine: Engine) -> Self {
    let tag = VariantTag::new(sanitizer, architecture, engine);
    Self {
      sanitizer,
      architecture,
      engine,
      tag,
    }
  }
}

/// A candidate tuple and the rule that rejected it, if any.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
  pub sanitizer: Sanitizer,
  pub architecture: Architecture,
  pub engine: Engine,
  /// Reason of the first matching exclusion rule; `None` when allowed.
  pub excluded_by: Option<&'static str>,
}

impl Candidate {
  pub fn is_allowed(&self) -> bool {
    self.excluded_by.is_none()
  }

  /// Tag the candidate would carry as a variant.
  pub fn tag(&self) -> VariantTag {
    VariantTag::new(self.sanitizer, self.architecture, self.engine)
  }
}

/// Every candidate considered for `settings`, in canonical order, with its verdict.
///
/// Coverage is collapsed to the single `(coverage, x86_64, libfuzzer)`
/// candidate whatever architectures and engines were declared.
pub fn explain(settings: &ParsedSettings) -> Vec<Candidate> {
  let language = settings.language;
  let mut candidates = Vec::new();

  for sanitizer in Sanitizer::ALL.iter().filter(|s| settings.sanitizers.contains(s)) {
    if *sanitizer == Sanitizer::Coverage {
      candidates.push(candidate(language, *sanitizer, Architecture::X86_64, Engine::Libfuzzer));
      continue;
    }

    for architecture in Architecture::ALL.iter().filter(|a| settings.architectures.contains(a)) {
      for engine in Engine::ALL.iter().filter(|e| settings.engines.contains(e)) {
        candidates.push(candidate(language, *sanitizer, *architecture, *engine));
      }
    }
  }

  candidates
}

fn candidate(language: Language, sanitizer: Sanitizer, architecture: Architecture, engine: Engine) -> Candidate {
  Candidate {
    sanitizer,
    architecture,
    engine,
    excluded_by: find_exclusion(language, sanitizer, architecture, engine).map(|rule| rule.reason),
  }
}

/// Expand `settings` into the ordered list of variants to build.
///
/// # Errors
///
/// Returns [`ConfigurationError::NoValidVariants`] when the exclusion rules
/// leave nothing to build.
pub fn expand(settings: &ParsedSettings) -> Result<Vec<Variant>, ConfigurationError> {
  let (allowed, rejected): (Vec<_>, Vec<_>) = explain(settings).into_iter().partition(Candidate::is_allowed);

  for rejection in &rejected {
    debug!(
      sanitizer = %rejection.sanitizer,
      architecture = %rejection.architecture,
      engine = %rejection.engine,
      reason = rejection.excluded_by.unwrap_or_default(),
      "excluded build variant"
    );
  }

  if allowed.is_empty() {
    return Err(ConfigurationError::NoValidVariants { rejected });
  }

  Ok(
    allowed
      .into_iter()
      .map(|c| Variant::new(c.sanitizer, c.architecture, c.engine))
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use std::collections::{BTreeMap, BTreeSet};

  use super::*;
  use crate::config::ProjectMetadata;

  fn settings(
    language: Language,
    sanitizers: &[Sanitizer],
    architectures: &[Architecture],
    engines: &[Engine],
  ) -> ParsedSettings {
    ParsedSettings {
      language,
      sanitizers: sanitizers.iter().copied().collect(),
      architectures: architectures.iter().copied().collect(),
      engines: engines.iter().copied().collect(),
      experimental: BTreeSet::new(),
      build_flags: BTreeMap::new(),
      dockerfile: "FROM base".to_string(),
      metadata: ProjectMetadata::default(),
    }
  }

  fn tags(variants: &[Variant]) -> Vec<&str> {
    variants.iter().map(|v| v.tag.0.as_str()).collect()
  }

  #[test]
  fn single_default_variant() {
    let s = settings(Language::Cpp, &[Sanitizer::Address], &[Architecture::X86_64], &[Engine::Libfuzzer]);
    let variants = expand(&s).unwrap();

    assert_eq!(tags(&variants), vec!["libfuzzer-address-x86_64"]);
  }

  #[test]
  fn order_follows_priority_lists() {
    let s = settings(
      Language::Cpp,
      &[Sanitizer::Undefined, Sanitizer::Address],
      &[Architecture::I386, Architecture::X86_64],
      &[Engine::Honggfuzz, Engine::Afl, Engine::Libfuzzer],
    );
    let variants = expand(&s).unwrap();

    assert_eq!(
      tags(&variants),
      vec![
        "libfuzzer-address-x86_64",
        "afl-address-x86_64",
        "honggfuzz-address-x86_64",
        "libfuzzer-address-i386",
        "libfuzzer-undefined-x86_64",
        "honggfuzz-undefined-x86_64",
      ]
    );
  }

  #[test]
  fn input_order_does_not_matter() {
    let a = settings(
      Language::C,
      &[Sanitizer::Undefined, Sanitizer::Address],
      &[Architecture::Arm64, Architecture::X86_64],
      &[Engine::Afl, Engine::Libfuzzer],
    );
    let b = settings(
      Language::C,
      &[Sanitizer::Address, Sanitizer::Undefined],
      &[Architecture::X86_64, Architecture::Arm64],
      &[Engine::Libfuzzer, Engine::Afl],
    );

    assert_eq!(expand(&a).unwrap(), expand(&b).unwrap());
  }

  #[test]
  fn coverage_collapses_to_one_variant() {
    let s = settings(
      Language::Cpp,
      &[Sanitizer::Coverage],
      &[Architecture::X86_64, Architecture::I386, Architecture::Arm64],
      &[Engine::Libfuzzer, Engine::Afl, Engine::Honggfuzz],
    );
    let variants = expand(&s).unwrap();

    assert_eq!(tags(&variants), vec!["libfuzzer-coverage-x86_64"]);
  }

  #[test]
  fn coverage_ignores_declared_architectures() {
    let s = settings(Language::Cpp, &[Sanitizer::Coverage], &[Architecture::Arm64], &[Engine::Afl]);
    let variants = expand(&s).unwrap();

    assert_eq!(tags(&variants), vec!["libfuzzer-coverage-x86_64"]);
  }

  #[test]
  fn memory_on_excluded_architecture_is_a_configuration_error() {
    let s = settings(Language::Cpp, &[Sanitizer::Memory], &[Architecture::Arm64], &[Engine::Libfuzzer]);
    let err = expand(&s).unwrap_err();

    match err {
      ConfigurationError::NoValidVariants { rejected } => {
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].excluded_by, Some("memory sanitizer is x86_64 only"));
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn tags_are_unique() {
    let s = settings(Language::Cpp, Sanitizer::ALL, Architecture::ALL, Engine::ALL);
    let variants = expand(&s).unwrap();
    let unique: BTreeSet<_> = variants.iter().map(|v| &v.tag).collect();

    assert_eq!(unique.len(), variants.len());
  }

  #[test]
  fn explain_reports_every_candidate() {
    let s = settings(Language::Cpp, &[Sanitizer::Undefined], &[Architecture::X86_64], &[Engine::Libfuzzer, Engine::Afl]);
    let candidates = explain(&s);

    assert_eq!(candidates.len(), 2);
    assert!(candidates[0].is_allowed());
    assert_eq!(candidates[1].excluded_by, Some("afl supports only the address sanitizer"));
  }

  #[test]
  fn candidate_tags_match_variant_tags() {
    let s = settings(Language::Cpp, &[Sanitizer::Address], &[Architecture::X86_64], &[Engine::Libfuzzer, Engine::Afl]);
    let candidate_tags: Vec<_> = explain(&s).iter().map(Candidate::tag).collect();
    let variant_tags: Vec<_> = expand(&s).unwrap().into_iter().map(|v| v.tag).collect();

    assert_eq!(candidate_tags, variant_tags);
    assert_eq!(candidate_tags[1].to_string(), "afl-address-x86_64");
  }
}
