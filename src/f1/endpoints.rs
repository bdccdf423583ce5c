//! Resource paths of the standings API, relative to the configured base URL.

/// Every season with its champions.
pub const SEASONS: &str = "seasons.json";

/// Race winners of `year`.
pub fn race_winners(year: u16) -> String {
  format!("{}/winners.json", year)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::Cacheable;
  use crate::f1::types::RaceWinner;

  #[test]
  fn test_race_winners_path_keys_by_year() {
    assert_eq!(race_winners(2008), "2008/winners.json");
    assert_eq!(
      RaceWinner::cache_key(&race_winners(2008)).as_str(),
      "race_winners_2008"
    );
  }
}
