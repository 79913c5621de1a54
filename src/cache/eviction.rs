//! Eviction Module
//!
//! Least-valuable-first victim selection for capacity-driven eviction.

use std::cmp::Ordering;

use crate::cache::CacheEntry;

/// Denominator of the fraction of candidates removed per pass (one fifth).
const EVICTION_DIVISOR: usize = 5;

// == Batch Size ==
/// Number of entries one eviction pass removes from `candidates` entries:
/// 20% rounded up, at least one while any candidate exists.
pub fn batch_size(candidates: usize) -> usize {
    candidates.div_ceil(EVICTION_DIVISOR)
}

// == Eviction Order ==
/// Ordering used to rank entries for eviction: fewest reads first, then the
/// least recently read. Keys break remaining ties so the order is total.
pub fn eviction_order(a: &CacheEntry, b: &CacheEntry) -> Ordering {
    a.access_count
        .cmp(&b.access_count)
        .then(a.last_accessed_at.cmp(&b.last_accessed_at))
        .then_with(|| a.key.cmp(&b.key))
}

// == Select Victims ==
/// Picks the keys one eviction pass should remove.
///
/// `protected` is the key currently being written; it is never a candidate.
pub fn select_victims<'a, I>(entries: I, protected: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a CacheEntry>,
{
    let mut candidates: Vec<&CacheEntry> = entries
        .into_iter()
        .filter(|entry| entry.key != protected)
        .collect();

    candidates.sort_by(|a, b| eviction_order(a, b));

    let count = batch_size(candidates.len());
    candidates
        .into_iter()
        .take(count)
        .map(|entry| entry.key.clone())
        .collect()
}
