//! The three fragment pools of a session.
//!
//! Every mutation bumps a store version; the assembly cache keys on it, so
//! any add, overwrite, removal, or clear invalidates previously built
//! contexts.

use docweaver_core::{ContextFragment, FragmentCategory, FragmentKey, TokenEstimator};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Core, enriched, and injected fragments of one session.
pub struct ContextStore {
    core: Option<ContextFragment>,
    enriched: HashMap<FragmentKey, ContextFragment>,
    injected: HashMap<FragmentKey, ContextFragment>,
    estimator: Arc<dyn TokenEstimator>,
    next_sequence: u64,
    version: u64,
}

impl ContextStore {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            core: None,
            enriched: HashMap::new(),
            injected: HashMap::new(),
            estimator,
            next_sequence: 0,
            version: 0,
        }
    }

    /// Monotonic mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn estimator(&self) -> &Arc<dyn TokenEstimator> {
        &self.estimator
    }

    /// Swap the estimator and recount every fragment.
    pub fn set_estimator(&mut self, estimator: Arc<dyn TokenEstimator>) {
        self.estimator = estimator;
        let estimator = Arc::clone(&self.estimator);
        for fragment in self
            .core
            .iter_mut()
            .chain(self.enriched.values_mut())
            .chain(self.injected.values_mut())
        {
            fragment.token_count = estimator.estimate(&fragment.content);
        }
        self.version += 1;
    }

    /// Insert or overwrite a fragment in its category's pool.
    ///
    /// Token count is recomputed. An overwritten key keeps its original
    /// insertion order. Returns `true` when an existing fragment was replaced.
    pub fn insert(&mut self, mut fragment: ContextFragment) -> bool {
        fragment.token_count = self.estimator.estimate(&fragment.content);

        let previous_sequence = match fragment.category {
            FragmentCategory::Core => self.core.as_ref().map(|f| f.sequence),
            FragmentCategory::Enriched => self.enriched.get(&fragment.key).map(|f| f.sequence),
            FragmentCategory::Injected => self.injected.get(&fragment.key).map(|f| f.sequence),
        };
        fragment.sequence = match previous_sequence {
            Some(seq) => seq,
            None => {
                let seq = self.next_sequence;
                self.next_sequence += 1;
                seq
            }
        };

        debug!(
            key = %fragment.key,
            category = %fragment.category,
            tokens = fragment.token_count,
            replaced = previous_sequence.is_some(),
            "Stored context fragment"
        );

        match fragment.category {
            FragmentCategory::Core => {
                fragment.key = FragmentKey::Core;
                self.core = Some(fragment);
            }
            FragmentCategory::Enriched => {
                self.enriched.insert(fragment.key.clone(), fragment);
            }
            FragmentCategory::Injected => {
                self.injected.insert(fragment.key.clone(), fragment);
            }
        }
        self.version += 1;
        previous_sequence.is_some()
    }

    /// Remove one fragment. Returns whether it existed.
    pub fn remove(&mut self, category: FragmentCategory, key: &FragmentKey) -> bool {
        let removed = match category {
            FragmentCategory::Core => self.core.take().is_some(),
            FragmentCategory::Enriched => self.enriched.remove(key).is_some(),
            FragmentCategory::Injected => self.injected.remove(key).is_some(),
        };
        if removed {
            self.version += 1;
        }
        removed
    }

    /// Drop every fragment of a category. Returns how many were removed.
    pub fn clear(&mut self, category: FragmentCategory) -> usize {
        let removed = match category {
            FragmentCategory::Core => usize::from(self.core.take().is_some()),
            FragmentCategory::Enriched => {
                let n = self.enriched.len();
                self.enriched.clear();
                n
            }
            FragmentCategory::Injected => {
                let n = self.injected.len();
                self.injected.clear();
                n
            }
        };
        if removed > 0 {
            self.version += 1;
        }
        removed
    }

    /// Drop everything, core included.
    pub fn clear_all(&mut self) -> usize {
        self.clear(FragmentCategory::Core)
            + self.clear(FragmentCategory::Enriched)
            + self.clear(FragmentCategory::Injected)
    }

    pub fn core(&self) -> Option<&ContextFragment> {
        self.core.as_ref()
    }

    pub fn get(&self, category: FragmentCategory, key: &FragmentKey) -> Option<&ContextFragment> {
        match category {
            FragmentCategory::Core => self.core.as_ref(),
            FragmentCategory::Enriched => self.enriched.get(key),
            FragmentCategory::Injected => self.injected.get(key),
        }
    }

    /// Enriched fragments in insertion order.
    pub fn enriched(&self) -> Vec<&ContextFragment> {
        sorted_by_sequence(self.enriched.values())
    }

    /// Injected fragments in insertion order.
    pub fn injected(&self) -> Vec<&ContextFragment> {
        sorted_by_sequence(self.injected.values())
    }

    /// Enriched and injected fragments in insertion order.
    pub fn candidates(&self) -> Vec<&ContextFragment> {
        sorted_by_sequence(self.enriched.values().chain(self.injected.values()))
    }

    pub fn enriched_count(&self) -> usize {
        self.enriched.len()
    }

    pub fn injected_count(&self) -> usize {
        self.injected.len()
    }

    /// Total fragments across all pools.
    pub fn len(&self) -> usize {
        usize::from(self.core.is_some()) + self.enriched.len() + self.injected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sorted_by_sequence<'a>(
    fragments: impl Iterator<Item = &'a ContextFragment>,
) -> Vec<&'a ContextFragment> {
    let mut out: Vec<&ContextFragment> = fragments.collect();
    out.sort_by_key(|f| f.sequence);
    out
}
