//! ParallelAccumulator: N banks, a distributor, a merge tree and a global undo log.
//!
//! - ACCUMULATE touches one bank lock plus the order log tail.
//! - READ samples banks one at a time. No global lock, relaxed consistency.
//! - ROLLBACK locks every bank in index order, then walks the order log.
//! - LOAD and `rebank` take `&mut self`. Exclusivity is the borrow checker's job.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use arrayvec::ArrayVec;

use crate::algebra::{merge_tree, DeltaWord};

use super::bank::Bank;
use super::checkpoint::{BankRecord, Checkpoint, CheckpointError};
use super::config::{ConfigError, Distribution, EngineConfig, MAX_BANKS};
use super::metrics::{EngineMetrics, MetricsSnapshot};
use super::ring::{CachePadded, OrderLog};
use super::state::{StateReconstructor, XorReconstructor};

/// Per-bank accumulator sample. Never touches the heap.
pub type BankSample<const LIMBS: usize> = ArrayVec<DeltaWord<LIMBS>, MAX_BANKS>;

type BankGuards<'a, const LIMBS: usize> = ArrayVec<MutexGuard<'a, Bank<LIMBS>>, MAX_BANKS>;

/// Everything observable about an accumulator, taken under all bank locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatorSnapshot<const LIMBS: usize> {
    pub state: DeltaWord<LIMBS>,
    pub merged: DeltaWord<LIMBS>,
    pub accumulator_zero: bool,
    /// Net deltas applied since LOAD.
    pub delta_count: u64,
    /// ROLLBACK steps currently available.
    pub undo_depth: usize,
    pub banks: BankSample<LIMBS>,
}

pub struct ParallelAccumulator<const LIMBS: usize, R = XorReconstructor> {
    banks: Box<[CachePadded<Mutex<Bank<LIMBS>>>]>,
    initial_state: DeltaWord<LIMBS>,
    /// Round-robin cursor. Only fairness depends on it.
    cursor: CachePadded<AtomicUsize>,
    order: OrderLog,
    config: EngineConfig,
    metrics: EngineMetrics,
    reconstructor: R,
}

#[inline(always)]
fn lock<const LIMBS: usize>(bank: &Mutex<Bank<LIMBS>>) -> MutexGuard<'_, Bank<LIMBS>> {
    // A bank is consistent between statements, so a poisoned lock is still usable.
    bank.lock().unwrap_or_else(PoisonError::into_inner)
}

fn build_banks<const LIMBS: usize>(
    config: &EngineConfig,
) -> Result<Box<[CachePadded<Mutex<Bank<LIMBS>>>]>, ConfigError> {
    (0..config.banks)
        .map(|_| Ok(CachePadded::new(Mutex::new(Bank::new(config.history_capacity)?))))
        .collect()
}

/// Steps a rollback could take: walk the log newest first until a bank
/// would run out of history.
fn reachable_depth<const LIMBS: usize>(guards: &BankGuards<'_, LIMBS>, order: &[u32]) -> usize {
    let mut used = [0usize; MAX_BANKS];
    let mut depth = 0;
    for &bank in order.iter().rev() {
        let bank = bank as usize;
        match guards.get(bank) {
            Some(guard) if used[bank] < guard.history().len() => {
                used[bank] += 1;
                depth += 1;
            }
            _ => break,
        }
    }
    depth
}

impl<const LIMBS: usize> ParallelAccumulator<LIMBS> {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_reconstructor(config, XorReconstructor)
    }

    /// Rebuild an engine whose READ, STATUS and ROLLBACK match the checkpointed one.
    pub fn from_checkpoint(checkpoint: &Checkpoint<LIMBS>) -> Result<Self, CheckpointError> {
        Self::restore_with(checkpoint, XorReconstructor)
    }
}

impl<const LIMBS: usize, R: StateReconstructor<LIMBS>> ParallelAccumulator<LIMBS, R> {
    pub fn with_reconstructor(config: EngineConfig, reconstructor: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            banks: build_banks(&config)?,
            initial_state: DeltaWord::ZERO,
            cursor: CachePadded::new(AtomicUsize::new(0)),
            order: OrderLog::new(config.order_capacity()),
            config,
            metrics: EngineMetrics::new(),
            reconstructor,
        })
    }

    pub fn restore_with(
        checkpoint: &Checkpoint<LIMBS>,
        reconstructor: R,
    ) -> Result<Self, CheckpointError> {
        checkpoint.validate()?;
        let mut engine = Self::with_reconstructor(checkpoint.config(), reconstructor)?;
        for (slot, record) in engine.banks.iter_mut().zip(&checkpoint.banks) {
            slot.get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .restore(record.accumulator, &record.history, record.applied);
        }
        engine.order.restore(&checkpoint.order);
        engine.initial_state = checkpoint.initial_state;

        tracing::debug!(
            banks = engine.config.banks,
            undo_depth = engine.order.available(),
            "restored accumulator from checkpoint"
        );
        Ok(engine)
    }

    /// LOAD: discard every delta and start over from `initial_state`.
    pub fn load(&mut self, initial_state: DeltaWord<LIMBS>) {
        for bank in self.banks.iter_mut() {
            bank.get_mut().unwrap_or_else(PoisonError::into_inner).reset();
        }
        *self.cursor.get_mut() = 0;
        self.order.clear();
        self.initial_state = initial_state;
        self.metrics.record_load();
        tracing::debug!(initial_state = %initial_state, banks = self.banks.len(), "load");
    }

    #[inline(always)]
    fn select_bank(&self, delta: &DeltaWord<LIMBS>) -> usize {
        let n = self.banks.len();
        match self.config.distribution {
            Distribution::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % n,
            Distribution::Hashed => (delta.fingerprint() % n as u64) as usize,
        }
    }

    /// ACCUMULATE: compose `delta` into exactly one bank.
    #[inline]
    pub fn accumulate(&self, delta: DeltaWord<LIMBS>) {
        let index = self.select_bank(&delta);
        let mut bank = lock(&self.banks[index]);
        bank.accumulate(delta);
        // Logged under the bank lock so per-bank log order matches history order.
        self.order.record(index as u32);
    }

    pub fn accumulate_batch<I>(&self, deltas: I)
    where
        I: IntoIterator<Item = DeltaWord<LIMBS>>,
    {
        for delta in deltas {
            self.accumulate(delta);
        }
    }

    /// Sample each bank's accumulator in index order, one lock at a time.
    pub fn bank_accumulators(&self) -> BankSample<LIMBS> {
        self.banks.iter().map(|bank| lock(bank).accumulator()).collect()
    }

    /// Merge-tree reduction of all banks, without the initial state.
    pub fn merged(&self) -> DeltaWord<LIMBS> {
        merge_tree(&self.bank_accumulators())
    }

    /// READ: current state.
    pub fn read(&self) -> DeltaWord<LIMBS> {
        self.metrics.record_read();
        self.reconstructor.reconstruct(&self.initial_state, &self.merged())
    }

    /// No net change relative to the initial state.
    ///
    /// Needs the full merge: two nonzero banks can cancel each other.
    pub fn is_zero(&self) -> bool {
        self.merged().is_zero()
    }

    /// STATUS.
    #[inline]
    pub fn status(&self) -> bool {
        self.is_zero()
    }

    fn lock_all(&self) -> BankGuards<'_, LIMBS> {
        // Always index order, so concurrent all-bank operations cannot deadlock.
        self.banks.iter().map(|bank| lock(bank)).collect()
    }

    /// ROLLBACK: undo up to `count` deltas, most recent globally first.
    /// Returns how many were undone.
    pub fn rollback(&self, count: usize) -> usize {
        let mut undone = 0;
        if count > 0 {
            let mut guards = self.lock_all();
            while undone < count {
                let Some(bank) = self.order.pop_latest() else {
                    break;
                };
                let reverted = guards
                    .get_mut(bank as usize)
                    .and_then(|guard| guard.undo_latest());
                if reverted.is_none() {
                    // Evicted from its bank. Anything older would break global order.
                    self.order.seal();
                    break;
                }
                undone += 1;
            }
        }

        self.metrics.record_rollback(count, undone);
        if undone < count {
            tracing::debug!(requested = count, undone, "rollback truncated by history capacity");
        }
        undone
    }

    /// ROLLBACK steps currently available.
    pub fn undo_depth(&self) -> usize {
        let guards = self.lock_all();
        reachable_depth(&guards, &self.order.entries())
    }

    /// Net deltas applied since LOAD, summed over banks.
    pub fn delta_count(&self) -> u64 {
        self.banks.iter().map(|bank| lock(bank).applied()).sum()
    }

    pub fn snapshot(&self) -> AccumulatorSnapshot<LIMBS> {
        let guards = self.lock_all();
        let banks: BankSample<LIMBS> = guards.iter().map(|bank| bank.accumulator()).collect();
        let merged = merge_tree(&banks);
        AccumulatorSnapshot {
            state: self.reconstructor.reconstruct(&self.initial_state, &merged),
            merged,
            accumulator_zero: merged.is_zero(),
            delta_count: guards.iter().map(|bank| bank.applied()).sum(),
            undo_depth: reachable_depth(&guards, &self.order.entries()),
            banks,
        }
    }

    /// Change the bank count. LOAD-equivalent: the current state becomes the
    /// new initial state and undo history is dropped.
    pub fn rebank(&mut self, banks: usize) -> Result<(), ConfigError> {
        let config = self.config.with_banks(banks);
        config.validate()?;

        let sample: BankSample<LIMBS> = self
            .banks
            .iter_mut()
            .map(|bank| bank.get_mut().unwrap_or_else(PoisonError::into_inner).accumulator())
            .collect();
        let state = self.reconstructor.reconstruct(&self.initial_state, &merge_tree(&sample));

        self.banks = build_banks(&config)?;
        self.order = OrderLog::new(config.order_capacity());
        *self.cursor.get_mut() = 0;
        self.initial_state = state;
        tracing::debug!(from = self.config.banks, to = banks, "rebank");
        self.config = config;
        self.metrics.record_rebank();
        Ok(())
    }

    /// Consistent cut of every bank and the reachable part of the order log.
    pub fn checkpoint(&self) -> Checkpoint<LIMBS> {
        let guards = self.lock_all();
        let order = self.order.entries();
        let depth = reachable_depth(&guards, &order);
        Checkpoint {
            initial_state: self.initial_state,
            distribution: self.config.distribution,
            history_capacity: self.config.history_capacity,
            banks: guards
                .iter()
                .map(|bank| BankRecord {
                    accumulator: bank.accumulator(),
                    history: bank.history().iter().copied().collect(),
                    applied: bank.applied(),
                })
                .collect(),
            order: order[order.len() - depth..].to_vec(),
        }
    }

    #[inline(always)]
    pub fn initial_state(&self) -> DeltaWord<LIMBS> {
        self.initial_state
    }

    #[inline(always)]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline(always)]
    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }

    pub fn reconstructor(&self) -> &R {
        &self.reconstructor
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.delta_count())
    }
}

impl<const LIMBS: usize, R> core::fmt::Debug for ParallelAccumulator<LIMBS, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ParallelAccumulator")
            .field("config", &self.config)
            .field("initial_state", &self.initial_state)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}
