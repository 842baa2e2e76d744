//! Bank: one independent accumulator plus its own undo ring.
//! Mutated only through its owner; no coordination with other banks.

use crate::algebra::DeltaWord;

use super::config::ConfigError;
use super::history::RollbackHistory;

#[derive(Debug)]
pub struct Bank<const LIMBS: usize> {
    accumulator: DeltaWord<LIMBS>,
    history: RollbackHistory<LIMBS>,
    /// Net deltas applied since the last reset (accumulates minus undos).
    applied: u64,
}

impl<const LIMBS: usize> Bank<LIMBS> {
    pub fn new(history_capacity: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            accumulator: DeltaWord::ZERO,
            history: RollbackHistory::new(history_capacity)?,
            applied: 0,
        })
    }

    /// O(1), no allocation.
    #[inline(always)]
    pub fn accumulate(&mut self, delta: DeltaWord<LIMBS>) {
        self.accumulator ^= delta;
        self.history.push(delta);
        self.applied += 1;
    }

    /// Undo up to `count` of this bank's most recent deltas.
    /// Returns how many were actually undone; short when history runs out.
    pub fn rollback(&mut self, count: usize) -> usize {
        let mut undone = 0;
        while undone < count && self.undo_latest().is_some() {
            undone += 1;
        }
        undone
    }

    /// Cancel the most recent delta by composing it again.
    #[inline]
    pub fn undo_latest(&mut self) -> Option<DeltaWord<LIMBS>> {
        let delta = self.history.pop()?;
        self.accumulator ^= delta;
        self.applied = self.applied.saturating_sub(1);
        Some(delta)
    }

    pub fn reset(&mut self) {
        self.accumulator = DeltaWord::ZERO;
        self.history.clear();
        self.applied = 0;
    }

    /// Rebuild from persisted parts. `history` is oldest first and must fit.
    pub(crate) fn restore<'a, I>(
        &mut self,
        accumulator: DeltaWord<LIMBS>,
        history: I,
        applied: u64,
    ) where
        I: IntoIterator<Item = &'a DeltaWord<LIMBS>>,
    {
        self.history.clear();
        for delta in history {
            self.history.push(*delta);
        }
        self.accumulator = accumulator;
        self.applied = applied;
    }

    #[inline(always)]
    pub fn accumulator(&self) -> DeltaWord<LIMBS> {
        self.accumulator
    }

    #[inline(always)]
    pub fn history(&self) -> &RollbackHistory<LIMBS> {
        &self.history
    }

    #[inline(always)]
    pub fn applied(&self) -> u64 {
        self.applied
    }

    #[inline(always)]
    pub fn is_zero(&self) -> bool {
        self.accumulator.is_zero()
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
    fn test_accumulate_and_rollback() {
        let mut bank = Bank::<1>::new(8).unwrap();
        bank.accumulate(w(0x11));
        bank.accumulate(w(0x22));
        assert_eq!(bank.accumulator(), w(0x33));
        assert_eq!(bank.applied(), 2);

        assert_eq!(bank.rollback(1), 1);
        assert_eq!(bank.accumulator(), w(0x11));
        assert_eq!(bank.rollback(5), 1);
        assert!(bank.is_zero());
        assert_eq!(bank.applied(), 0);
    }

    #[test]
    fn test_rollback_reports_truncation() {
        let mut bank = Bank::<1>::new(2).unwrap();
        for v in [1, 2, 4, 8] {
            bank.accumulate(w(v));
        }
        assert_eq!(bank.accumulator(), w(15));

        // Only the last two are still undoable.
        assert_eq!(bank.rollback(4), 2);
        assert_eq!(bank.accumulator(), w(3));
        assert_eq!(bank.rollback(1), 0);
    }

    #[test]
    fn test_rollback_zero_is_noop() {
        let mut bank = Bank::<1>::new(2).unwrap();
        bank.accumulate(w(9));
        assert_eq!(bank.rollback(0), 0);
        assert_eq!(bank.accumulator(), w(9));
    }

    #[test]
    fn test_reset() {
        let mut bank = Bank::<1>::new(4).unwrap();
        bank.accumulate(w(7));
        bank.reset();
        assert!(bank.is_zero());
        assert!(bank.history().is_empty());
        assert_eq!(bank.applied(), 0);
    }
}
