//! RollbackHistory: fixed-capacity ring of the most recent deltas applied to a bank.
//! Allocated once. Oldest entry overwritten when full, and gone for good.

use crate::algebra::DeltaWord;

use super::config::{ConfigError, MAX_HISTORY_CAPACITY};

pub struct RollbackHistory<const LIMBS: usize> {
    entries: Box<[DeltaWord<LIMBS>]>,
    /// Slot the next push lands in.
    head: usize,
    len: usize,
}

impl<const LIMBS: usize> RollbackHistory<LIMBS> {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        if capacity > MAX_HISTORY_CAPACITY {
            return Err(ConfigError::HistoryCapacityTooLarge {
                requested: capacity,
                max: MAX_HISTORY_CAPACITY,
            });
        }
        Ok(Self {
            entries: vec![DeltaWord::ZERO; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        })
    }

    /// Record `delta`. Returns the evicted entry if the ring was full.
    #[inline]
    pub fn push(&mut self, delta: DeltaWord<LIMBS>) -> Option<DeltaWord<LIMBS>> {
        let cap = self.entries.len();
        let evicted = (self.len == cap).then(|| self.entries[self.head]);
        self.entries[self.head] = delta;
        self.head = (self.head + 1) % cap;
        if evicted.is_none() {
            self.len += 1;
        }
        evicted
    }

    /// Remove and return the most recent entry.
    #[inline]
    pub fn pop(&mut self) -> Option<DeltaWord<LIMBS>> {
        if self.len == 0 {
            return None;
        }
        let cap = self.entries.len();
        self.head = (self.head + cap - 1) % cap;
        self.len -= 1;
        let delta = self.entries[self.head];
        self.entries[self.head] = DeltaWord::ZERO;
        Some(delta)
    }

    #[inline]
    pub fn latest(&self) -> Option<&DeltaWord<LIMBS>> {
        if self.len == 0 {
            return None;
        }
        let cap = self.entries.len();
        Some(&self.entries[(self.head + cap - 1) % cap])
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &DeltaWord<LIMBS>> + '_ {
        let cap = self.entries.len();
        let start = (self.head + cap - self.len) % cap;
        (0..self.len).map(move |i| &self.entries[(start + i) % cap])
    }

    pub fn clear(&mut self) {
        self.entries.fill(DeltaWord::ZERO);
        self.head = 0;
        self.len = 0;
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len == self.entries.len()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}

impl<const LIMBS: usize> core::fmt::Debug for RollbackHistory<LIMBS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RollbackHistory")
            .field("len", &self.len)
            .field("capacity", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Word64;

    fn w(v: u64) -> Word64 {
        Word64::from_u64(v)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            RollbackHistory::<1>::new(0).unwrap_err(),
            ConfigError::ZeroHistoryCapacity
        );
        assert_eq!(
            RollbackHistory::<1>::new(usize::MAX / 8).unwrap_err(),
            ConfigError::HistoryCapacityTooLarge {
                requested: usize::MAX / 8,
                max: MAX_HISTORY_CAPACITY
            }
        );
    }

    #[test]
    fn test_push_pop_lifo() {
        let mut history = RollbackHistory::<1>::new(4).unwrap();
        assert!(history.push(w(1)).is_none());
        assert!(history.push(w(2)).is_none());
        assert_eq!(history.latest(), Some(&w(2)));
        assert_eq!(history.pop(), Some(w(2)));
        assert_eq!(history.pop(), Some(w(1)));
        assert_eq!(history.pop(), None);
        assert!(history.is_empty());
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut history = RollbackHistory::<1>::new(3).unwrap();
        for i in 1..=3 {
            assert!(history.push(w(i)).is_none());
        }
        assert!(history.is_full());
        assert_eq!(history.push(w(4)), Some(w(1)));
        assert_eq!(history.push(w(5)), Some(w(2)));
        assert_eq!(history.len(), 3);

        let oldest_first: Vec<_> = history.iter().copied().collect();
        assert_eq!(oldest_first, vec![w(3), w(4), w(5)]);

        assert_eq!(history.pop(), Some(w(5)));
        assert_eq!(history.pop(), Some(w(4)));
        assert_eq!(history.pop(), Some(w(3)));
        assert_eq!(history.pop(), None);
    }

    #[test]
    fn test_pop_then_push_reuses_slot() {
        let mut history = RollbackHistory::<1>::new(2).unwrap();
        history.push(w(1));
        history.push(w(2));
        history.pop();
        assert!(history.push(w(3)).is_none());
        let entries: Vec<_> = history.iter().copied().collect();
        assert_eq!(entries, vec![w(1), w(3)]);
    }

    #[test]
    fn test_clear() {
        let mut history = RollbackHistory::<1>::new(2).unwrap();
        history.push(w(1));
        history.push(w(2));
        history.push(w(3));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 2);
        assert_eq!(history.iter().count(), 0);
    }
}
