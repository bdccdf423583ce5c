//! Caching implementations for F1 types.

use crate::cache::{Cacheable, KeyDerivation};

use super::types::{RaceWinner, Season};

impl Cacheable for Season {
  fn entity_type() -> &'static str {
    "season"
  }

  fn key_derivation() -> KeyDerivation {
    // There is one seasons list, whatever URL it came from.
    KeyDerivation::Fixed("seasons")
  }
}

impl Cacheable for RaceWinner {
  fn entity_type() -> &'static str {
    "race_winner"
  }

  fn key_derivation() -> KeyDerivation {
    KeyDerivation::YearOrHash("race_winners")
  }
}
