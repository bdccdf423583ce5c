use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A championship season and its drivers' champion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
  pub year: u16,
  pub champion: String,
  pub constructor: String,
  #[serde(default)]
  pub wins: u32,
  /// Reference page for the season
  #[serde(default)]
  pub url: Option<String>,
}

/// Winner of a single grand prix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceWinner {
  pub round: u32,
  pub race_name: String,
  pub circuit: String,
  pub date: NaiveDate,
  pub winner: String,
  pub constructor: String,
  #[serde(default)]
  pub laps: u32,
  /// Race time of the winner, absent for races decided on laps
  #[serde(default)]
  pub time: Option<String>,
}
