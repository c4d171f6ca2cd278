//! Logical time source for compilation.
//!
//! The compiler reads its clock exactly once per `compile` call and threads the
//! captured instant through every consumer (image tags, archive stamps, URL
//! signing). Tests hold the clock fixed with [`FixedClock`].

use chrono::{DateTime, Utc};

/// Source of the "build issued" instant.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    self.0
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn fixed_clock_never_moves() {
    let at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let clock = FixedClock(at);

    assert_eq!(clock.now(), at);
    assert_eq!(clock.now(), clock.now());
  }
}
