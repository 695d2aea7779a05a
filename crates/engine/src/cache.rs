//! Memoized assembly results keyed by document type and store version.
//!
//! Entries for older store versions are unreachable after any mutation and
//! are purged on the next insert.

use crate::builder::AssemblyResult;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe result cache with hit/miss counters.
#[derive(Debug, Default)]
pub struct AssemblyCache {
    entries: RwLock<HashMap<(String, u64), AssemblyResult>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AssemblyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for a document type at a store version.
    pub fn get(&self, document_type: &str, version: u64) -> Option<AssemblyResult> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let found = entries.get(&(document_type.to_string(), version)).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store a result, dropping entries built from older versions.
    pub fn insert(&self, version: u64, result: AssemblyResult) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|(_, v), _| *v >= version);
        entries.insert((result.document_type.clone(), version), result);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
