mod cache;
pub mod cached_client;
pub mod endpoints;
pub mod types;

pub use cached_client::CachedF1Client;
pub use types::{RaceWinner, Season};
