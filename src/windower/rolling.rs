//! Fixed-capacity circular buffer holding the frames of the current window

use crate::error::{ClipPrepError, Result};

/// Circular buffer addressed by offset from the oldest slot.
///
/// `advance(n)` drops the `n` oldest entries by moving the head index; stored
/// frames are never shifted. Offset `i` always refers to the `i`-th frame of
/// the current window.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
}

impl<T> RollingBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ClipPrepError::config_value_error(
                "buffer capacity",
                capacity,
                ">= 1",
                None,
            ));
        }
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Ok(Self { slots, head: 0 })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Physical index of the oldest slot
    #[must_use]
    pub fn head(&self) -> usize {
        self.head
    }

    fn physical(&self, offset: usize) -> usize {
        (self.head + offset) % self.slots.len()
    }

    /// Evict the `n` oldest entries and rotate the head past them
    pub fn advance(&mut self, n: usize) {
        let capacity = self.slots.len();
        for i in 0..n.min(capacity) {
            let index = (self.head + i) % capacity;
            if let Some(slot) = self.slots.get_mut(index) {
                *slot = None;
            }
        }
        self.head = (self.head + n) % capacity;
    }

    /// Store `value` at window offset `offset`
    pub fn set(&mut self, offset: usize, value: T) -> Result<()> {
        if offset >= self.slots.len() {
            return Err(ClipPrepError::internal(format!(
                "Buffer offset {} out of range for capacity {}",
                offset,
                self.slots.len()
            )));
        }
        let index = self.physical(offset);
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(value);
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, offset: usize) -> Option<&T> {
        if offset >= self.slots.len() {
            return None;
        }
        self.slots.get(self.physical(offset)).and_then(Option::as_ref)
    }

    /// Occupied slots in window order, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.slots.len()).filter_map(move |offset| self.get(offset))
    }

    /// Number of occupied slots
    #[must_use]
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Every slot holds a frame
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Drop all entries and rewind the head
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
    }
}
