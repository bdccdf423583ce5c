//! Generic caching layer for data persistence and offline support.
//!
//! This module provides an entity-agnostic caching mechanism that:
//! - Persists collections as timestamped JSON entries in a key-value store
//! - Decides staleness through composable invalidation policies
//! - Falls back to the network on a miss and writes results back
//! - Provides basic offline mode (serve stale cache when network unavailable)

mod entry;
mod error;
mod file_storage;
mod key;
mod layer;
mod local;
mod policy;
mod preference_storage;
mod remote;
mod storage;
mod traits;

pub use entry::{CacheEntry, EntryMetadata};
pub use error::{CompositeError, LocalError, RemoteError, StorageError};
pub use file_storage::FileStorage;
pub use key::{CacheKey, KeyDerivation};
pub use layer::{CompositeLoader, FetchMode};
pub use local::LocalLoader;
pub use policy::{
  CompositeMode, InvalidationPolicy, VersionSource, VersionTags, DEFAULT_INVALIDATION_WINDOW,
};
pub use preference_storage::{PreferenceStorage, DEFAULT_MAX_VALUE_BYTES, DEFAULT_PREFIX};
pub use remote::{HttpFetcher, RemoteFetcher, RemoteLoader};
pub use storage::{open_storage, KeyValueStore, KeyValueStoreExt, NoopStorage, StoredVersions};
pub use traits::{CacheResult, CacheSource, Cacheable, Loader};
