//! Run-scoped cache of loaded artifact descriptions.
//!
//! One instance lives exactly as long as one pipeline run. There is no
//! eviction. Entries are `Rc<RefCell<_>>`: the cache is single-threaded by
//! construction, which is what keeps transformer ordering and cross-artifact
//! visibility deterministic.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use classweave_shared::{BinaryName, Result};
use serde::Serialize;

use crate::artifact::ArtifactDescription;

/// A cached description, shared between the cache and its borrowers.
pub type SharedArtifact = Rc<RefCell<ArtifactDescription>>;

/// Hit/miss counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct ArtifactCache {
    entries: RefCell<HashMap<BinaryName, SharedArtifact>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for `name`, if any. Counts a hit when found.
    pub fn get(&self, name: &BinaryName) -> Option<SharedArtifact> {
        let found = self.entries.borrow().get(name).cloned();
        if found.is_some() {
            self.hits.set(self.hits.get() + 1);
        }
        found
    }

    /// Return the cached entry or build one with `load`.
    ///
    /// `load` runs without the cache borrowed, so it may itself resolve other
    /// names. If `load` inserted `name` re-entrantly, that entry wins.
    pub fn get_or_try_insert_with(
        &self,
        name: &BinaryName,
        load: impl FnOnce() -> Result<ArtifactDescription>,
    ) -> Result<SharedArtifact> {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }

        self.misses.set(self.misses.get() + 1);
        let description = load()?;

        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .entry(name.clone())
            .or_insert_with(|| Rc::new(RefCell::new(description)));
        Ok(Rc::clone(entry))
    }

    pub fn contains(&self, name: &BinaryName) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.get(),
            misses: self.misses.get(),
        }
    }
}
