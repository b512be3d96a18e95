//! Local view of state that lives in a remote store (tables of the columnar store, cores of the
//! document store, clients connected to those cores).
//!
//! The cache is loaded from the remote on first use, and entries are created remotely when they
//! are missing. It never changes behind the caller's back: an entry only appears through an
//! explicit [`RemoteCache::get_or_create`] or [`RemoteCache::refresh`], and disappears only
//! through [`RemoteCache::invalidate`].

use std::collections::HashMap;

use crate::Error;
use crate::Result;

/// Outcome of creating a missing entry.
pub(crate) enum Created<V> {
    /// The entry was built locally and can be cached as is.
    Entry(V),
    /// The remote was mutated, the cache must be reloaded to pick up the new entry.
    Refresh,
}

/// The remote side of a [`RemoteCache`].
#[trait_variant::make(CacheSource: Send)]
#[allow(dead_code)]
pub(crate) trait LocalCacheSource<V> {
    /// Fetches every entry the remote currently knows about.
    async fn load(&mut self) -> Result<HashMap<String, V>>;

    /// Creates `key` on the remote.
    async fn create(&mut self, key: &str) -> Result<Created<V>>;
}

pub(crate) struct RemoteCache<V> {
    entries: HashMap<String, V>,
    loaded: bool,
}

impl<V: Send> RemoteCache<V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            loaded: false,
        }
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut V)> {
        self.entries.iter_mut()
    }

    /// Drops every cached entry, the next access reloads from the remote.
    pub(crate) fn invalidate(&mut self) {
        self.entries.clear();
        self.loaded = false;
    }

    /// Replaces the cached entries with what the remote currently knows.
    pub(crate) async fn refresh<S>(&mut self, source: &mut S) -> Result<()>
    where
        S: CacheSource<V>,
    {
        self.entries = source.load().await?;
        self.loaded = true;
        Ok(())
    }

    /// Returns the entry for `key`, loading the cache on first use and creating the entry on the
    /// remote when it is missing.
    pub(crate) async fn get_or_create<S>(&mut self, key: &str, source: &mut S) -> Result<&mut V>
    where
        S: CacheSource<V>,
    {
        if !self.loaded {
            self.refresh(source).await?;
        }

        if !self.entries.contains_key(key) {
            match source.create(key).await? {
                Created::Entry(value) => {
                    self.entries.insert(key.to_string(), value);
                }
                Created::Refresh => self.refresh(source).await?,
            }
        }

        self.entries
            .get_mut(key)
            .ok_or_else(|| Error::Schema(format!("{key} is still unknown after creating it")))
    }
}
