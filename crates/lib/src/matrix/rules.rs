//! Exclusion rules for build variants.
//!
//! The table is pure data. A candidate `(language, sanitizer, architecture,
//! engine)` is allowed iff no rule in [`EXCLUSION_RULES`] matches it.

use crate::config::{Architecture, Engine, Language, Sanitizer};

/// A set predicate over one dimension.
#[derive(Debug, Clone, Copy)]
pub enum Match<T: 'static> {
  /// Matches every value.
  Any,
  /// Matches the listed values.
  OneOf(&'static [T]),
  /// Matches everything except the listed values.
  NoneOf(&'static [T]),
}

impl<T: PartialEq> Match<T> {
  pub fn matches(&self, value: &T) -> bool {
    match self {
      Match::Any => true,
      Match::OneOf(values) => values.contains(value),
      Match::NoneOf(values) => !values.contains(value),
    }
  }
}

/// A rule denying every candidate matched by all four predicates.
#[derive(Debug, Clone, Copy)]
pub struct ExclusionRule {
  pub language: Match<Language>,
  pub sanitizer: Match<Sanitizer>,
  pub architecture: Match<Architecture>,
  pub engine: Match<Engine>,
  pub reason: &'static str,
}

impl ExclusionRule {
  pub fn matches(&self, language: Language, sanitizer: Sanitizer, architecture: Architecture, engine: Engine) -> bool {
    self.language.matches(&language)
      && self.sanitizer.matches(&sanitizer)
      && self.architecture.matches(&architecture)
      && self.engine.matches(&engine)
  }
}

const C_FAMILY: &[Language] = &[Language::C, Language::Cpp];
const X86_64_ONLY: &[Architecture] = &[Architecture::X86_64];

pub const EXCLUSION_RULES: &[ExclusionRule] = &[
  ExclusionRule {
    language: Match::Any,
    sanitizer: Match::NoneOf(&[Sanitizer::Address]),
    architecture: Match::Any,
    engine: Match::OneOf(&[Engine::Afl]),
    reason: "afl supports only the address sanitizer",
  },
  ExclusionRule {
    language: Match::Any,
    sanitizer: Match::NoneOf(&[Sanitizer::Address, Sanitizer::None]),
    architecture: Match::Any,
    engine: Match::OneOf(&[Engine::None]),
    reason: "engine-less builds support only the address sanitizer or none",
  },
  ExclusionRule {
    language: Match::OneOf(C_FAMILY),
    sanitizer: Match::OneOf(&[Sanitizer::None]),
    architecture: Match::Any,
    engine: Match::NoneOf(&[Engine::None]),
    reason: "uninstrumented c/c++ builds require the none engine",
  },
  ExclusionRule {
    language: Match::Any,
    sanitizer: Match::Any,
    architecture: Match::NoneOf(X86_64_ONLY),
    engine: Match::OneOf(&[Engine::Afl, Engine::Honggfuzz, Engine::None]),
    reason: "afl, honggfuzz and engine-less builds are x86_64 only",
  },
  ExclusionRule {
    language: Match::Any,
    sanitizer: Match::NoneOf(&[Sanitizer::Address]),
    architecture: Match::OneOf(&[Architecture::I386]),
    engine: Match::Any,
    reason: "i386 builds support only the address sanitizer",
  },
  ExclusionRule {
    language: Match::Any,
    sanitizer: Match::OneOf(&[Sanitizer::Memory]),
    architecture: Match::NoneOf(X86_64_ONLY),
    engine: Match::Any,
    reason: "memory sanitizer is x86_64 only",
  },
  ExclusionRule {
    language: Match::NoneOf(C_FAMILY),
    sanitizer: Match::OneOf(&[Sanitizer::Memory]),
    architecture: Match::Any,
    engine: Match::Any,
    reason: "memory sanitizer requires a c/c++ project",
  },
  ExclusionRule {
    language: Match::NoneOf(C_FAMILY),
    sanitizer: Match::Any,
    architecture: Match::Any,
    engine: Match::NoneOf(&[Engine::Libfuzzer]),
    reason: "non-c/c++ projects build only with libfuzzer",
  },
  ExclusionRule {
    language: Match::NoneOf(C_FAMILY),
    sanitizer: Match::Any,
    architecture: Match::NoneOf(X86_64_ONLY),
    engine: Match::Any,
    reason: "non-c/c++ projects build only on x86_64",
  },
  ExclusionRule {
    language: Match::OneOf(&[Language::JavaScript]),
    sanitizer: Match::NoneOf(&[Sanitizer::None]),
    architecture: Match::Any,
    engine: Match::Any,
    reason: "javascript projects build only without a sanitizer",
  },
  ExclusionRule {
    language: Match::NoneOf(&[Language::C, Language::Cpp, Language::JavaScript]),
    sanitizer: Match::OneOf(&[Sanitizer::None]),
    architecture: Match::Any,
    engine: Match::Any,
    reason: "managed-language projects require a sanitizer",
  },
  ExclusionRule {
    language: Match::Any,
    sanitizer: Match::OneOf(&[Sanitizer::Coverage]),
    architecture: Match::Any,
    engine: Match::NoneOf(&[Engine::Libfuzzer]),
    reason: "coverage builds use libfuzzer",
  },
  ExclusionRule {
    language: Match::Any,
    sanitizer: Match::OneOf(&[Sanitizer::Coverage]),
    architecture: Match::NoneOf(X86_64_ONLY),
    engine: Match::Any,
    reason: "coverage builds are x86_64 only",
  },
];

/// First rule denying the candidate, if any.
pub fn find_exclusion(
  language: Language,
  sanitizer: Sanitizer,
  architecture: Architecture,
  engine: Engine,
) -> Option<&'static ExclusionRule> {
  EXCLUSION_RULES
    .iter()
    .find(|rule| rule.matches(language, sanitizer, architecture, engine))
}

/// Whether the candidate survives every rule.
pub fn is_allowed(language: Language, sanitizer: Sanitizer, architecture: Architecture, engine: Engine) -> bool {
  find_exclusion(language, sanitizer, architecture, engine).is_none()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_cpp_variant_is_allowed() {
    assert!(is_allowed(Language::Cpp, Sanitizer::Address, Architecture::X86_64, Engine::Libfuzzer));
  }

  #[test]
  fn memory_is_denied_off_x86_64() {
    let rule = find_exclusion(Language::C, Sanitizer::Memory, Architecture::I386, Engine::Libfuzzer).unwrap();
    // i386 rule comes first in the table
    assert_eq!(rule.reason, "i386 builds support only the address sanitizer");

    let rule = find_exclusion(Language::C, Sanitizer::Memory, Architecture::Arm64, Engine::Libfuzzer).unwrap();
    assert_eq!(rule.reason, "memory sanitizer is x86_64 only");
  }

  #[test]
  fn afl_supports_only_address() {
    assert!(is_allowed(Language::Cpp, Sanitizer::Address, Architecture::X86_64, Engine::Afl));
    assert!(!is_allowed(Language::Cpp, Sanitizer::Undefined, Architecture::X86_64, Engine::Afl));
    assert!(!is_allowed(Language::Cpp, Sanitizer::Memory, Architecture::X86_64, Engine::Afl));
  }

  #[test]
  fn honggfuzz_supports_memory_on_x86_64() {
    assert!(is_allowed(Language::Cpp, Sanitizer::Memory, Architecture::X86_64, Engine::Honggfuzz));
    assert!(!is_allowed(Language::Cpp, Sanitizer::Address, Architecture::Arm64, Engine::Honggfuzz));
  }

  #[test]
  fn libfuzzer_builds_on_every_architecture() {
    for arch in Architecture::ALL {
      assert!(is_allowed(Language::C, Sanitizer::Address, *arch, Engine::Libfuzzer), "{arch}");
    }
  }

  #[test]
  fn uninstrumented_builds_pair_with_the_none_engine() {
    assert!(is_allowed(Language::Cpp, Sanitizer::None, Architecture::X86_64, Engine::None));
    assert!(is_allowed(Language::Cpp, Sanitizer::Address, Architecture::X86_64, Engine::None));
    assert!(!is_allowed(Language::Cpp, Sanitizer::None, Architecture::X86_64, Engine::Libfuzzer));
    assert!(!is_allowed(Language::Cpp, Sanitizer::Undefined, Architecture::X86_64, Engine::None));
  }

  #[test]
  fn managed_languages_are_libfuzzer_x86_64() {
    assert!(is_allowed(Language::Python, Sanitizer::Address, Architecture::X86_64, Engine::Libfuzzer));
    assert!(is_allowed(Language::Jvm, Sanitizer::Undefined, Architecture::X86_64, Engine::Libfuzzer));
    assert!(!is_allowed(Language::Go, Sanitizer::Address, Architecture::X86_64, Engine::Afl));
    assert!(!is_allowed(Language::Rust, Sanitizer::Address, Architecture::Arm64, Engine::Libfuzzer));
    assert!(!is_allowed(Language::Rust, Sanitizer::Memory, Architecture::X86_64, Engine::Libfuzzer));
    assert!(!is_allowed(Language::Python, Sanitizer::None, Architecture::X86_64, Engine::Libfuzzer));
  }

  #[test]
  fn javascript_builds_only_without_a_sanitizer() {
    assert!(is_allowed(Language::JavaScript, Sanitizer::None, Architecture::X86_64, Engine::Libfuzzer));
    assert!(!is_allowed(Language::JavaScript, Sanitizer::Address, Architecture::X86_64, Engine::Libfuzzer));
    assert!(!is_allowed(Language::JavaScript, Sanitizer::Coverage, Architecture::X86_64, Engine::Libfuzzer));
  }

  #[test]
  fn coverage_is_libfuzzer_x86_64() {
    assert!(is_allowed(Language::Go, Sanitizer::Coverage, Architecture::X86_64, Engine::Libfuzzer));
    assert!(!is_allowed(Language::Cpp, Sanitizer::Coverage, Architecture::X86_64, Engine::Honggfuzz));
    assert!(!is_allowed(Language::Cpp, Sanitizer::Coverage, Architecture::Arm64, Engine::Libfuzzer));
  }

  #[test]
  fn every_rule_has_a_reason() {
    assert!(EXCLUSION_RULES.iter().all(|rule| !rule.reason.is_empty()));
  }
}
