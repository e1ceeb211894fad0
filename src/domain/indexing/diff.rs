//! Hash-level diff between the indexed and the new chunk list

use std::collections::{HashMap, HashSet, VecDeque};

/// Set difference of old and new chunk hashes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDiff {
    pub added: HashSet<String>,
    pub removed: HashSet<String>,
    pub old_len: usize,
    pub new_len: usize,
}

impl ChunkDiff {
    pub fn compute(old_hashes: &[String], new_hashes: &[String]) -> Self {
        let old: HashSet<&String> = old_hashes.iter().collect();
        let new: HashSet<&String> = new_hashes.iter().collect();

        Self {
            added: new.difference(&old).map(|h| (*h).clone()).collect(),
            removed: old.difference(&new).map(|h| (*h).clone()).collect(),
            old_len: old_hashes.len(),
            new_len: new_hashes.len(),
        }
    }

    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// Whether the change is large enough to rebuild the document from scratch
    pub fn exceeds(&self, threshold: f64) -> bool {
        let base = self.old_len.max(self.new_len);
        self.change_count() as f64 > threshold * base as f64
    }
}

/// Positional plan for a partial update
///
/// `slots[i]` is `Some(entry_id)` when new chunk `i` reuses an existing entry and `None`
/// when it must be embedded and upserted. `stale` lists entries no new chunk claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplicePlan {
    pub slots: Vec<Option<String>>,
    pub stale: Vec<String>,
}

impl SplicePlan {
    /// Match new chunks to old entries by hash
    ///
    /// Duplicated hashes are paired one-to-one in document order.
    pub fn build(old_hashes: &[String], old_entry_ids: &[String], new_hashes: &[String]) -> Self {
        let mut available: HashMap<&str, VecDeque<&str>> = HashMap::new();
        for (hash, entry_id) in old_hashes.iter().zip(old_entry_ids) {
            available
                .entry(hash.as_str())
                .or_default()
                .push_back(entry_id.as_str());
        }

        let slots = new_hashes
            .iter()
            .map(|hash| {
                available
                    .get_mut(hash.as_str())
                    .and_then(VecDeque::pop_front)
                    .map(str::to_string)
            })
            .collect();

        let unclaimed: HashSet<&str> = available
            .values()
            .flat_map(|queue| queue.iter().copied())
            .collect();

        // Keep the original document order for stale entries
        let stale = old_entry_ids
            .iter()
            .filter(|id| unclaimed.contains(id.as_str()))
            .cloned()
            .collect();

        Self { slots, stale }
    }

    pub fn reused(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn to_insert(&self) -> usize {
        self.slots.len() - self.reused()
    }
}
