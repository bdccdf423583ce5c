//! Cache-first loading of Formula 1 standings.
//!
//! Collections are served from a persistent local cache while valid,
//! fetched from the standings API when missing or stale, written back to
//! the cache, and served stale when the network is unavailable.

pub mod cache;
pub mod config;
pub mod f1;
pub mod logging;

pub use config::Config;
pub use f1::{CachedF1Client, RaceWinner, Season};
