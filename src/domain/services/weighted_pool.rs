//! Weighted Pool
//!
//! Pure domain logic for picking one of several items with probability
//! proportional to an integer weight. Used by the router for secondary
//! connections but generic over the stored item.

use crate::domain::errors::RouterError;
use rand::Rng;

/// Largest weight a single entry may carry.
pub const MAX_WEIGHT: u32 = 1_000_000;

/// An item and its relative weight.
#[derive(Debug, Clone)]
pub struct WeightedEntry<T> {
    pub item: T,
    pub weight: u32,
}

/// Ordered collection of weighted items.
///
/// Selection goes through a slot map rebuilt on every `add`: slot `n` in
/// `1..=total_weight` points at the entry owning it, each entry owning
/// `weight` contiguous slots in insertion order. A draw is a single
/// random number and one index lookup.
#[derive(Debug, Clone)]
pub struct WeightedPool<T> {
    entries: Vec<WeightedEntry<T>>,
    /// `slots[n - 1]` is the entry index for slot `n`
    slots: Vec<usize>,
}

impl<T> Default for WeightedPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WeightedPool<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Append an item. The weight must be in `1..=MAX_WEIGHT`; anything
    /// else leaves the pool unchanged.
    ///
    /// The pool keeps one slot per unit of weight, so memory grows with
    /// the total weight.
    pub fn add(&mut self, item: T, weight: i64) -> Result<(), RouterError> {
        let weight = u32::try_from(weight)
            .ok()
            .filter(|w| (1..=MAX_WEIGHT).contains(w))
            .ok_or(RouterError::InvalidWeight(weight))?;

        self.entries.push(WeightedEntry { item, weight });
        self.rebuild_slots();
        Ok(())
    }

    /// Pick an item using the thread-local generator.
    pub fn select(&self) -> Result<&T, RouterError> {
        self.select_with(&mut rand::thread_rng())
    }

    /// Pick an item using the given generator.
    pub fn select_with<R: Rng>(&self, rng: &mut R) -> Result<&T, RouterError> {
        match self.entries.as_slice() {
            [] => Err(RouterError::NoConnectionsAvailable),
            [only] => Ok(&only.item),
            _ => {
                let slot = rng.gen_range(1..=self.slots.len());
                let index = self.slots[slot - 1];
                Ok(&self.entries[index].item)
            }
        }
    }

    /// Items in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.item)
    }

    pub fn entries(&self) -> &[WeightedEntry<T>] {
        &self.entries
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> usize {
        self.slots.len()
    }

    /// Entry index owning 1-based `slot`.
    pub fn slot(&self, slot: usize) -> Option<usize> {
        slot.checked_sub(1).and_then(|i| self.slots.get(i)).copied()
    }

    fn rebuild_slots(&mut self) {
        let total: usize = self.entries.iter().map(|e| e.weight as usize).sum();
        let mut slots = Vec::with_capacity(total);
        for (index, entry) in self.entries.iter().enumerate() {
            slots.extend(std::iter::repeat(index).take(entry.weight as usize));
        }
        self.slots = slots;
    }
}
