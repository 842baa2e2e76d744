//! Global order log: a fixed ring of bank indices with an atomic tail.
//!
//! Accumulation is bank-local, but undo must run in global most-recent-first
//! order, so every accumulate also appends the index of the bank it landed in.
//! Appends race only on the tail counter. Pops happen with every bank locked.

use core::sync::atomic::{AtomicU64, Ordering};

/// Cache-line aligned wrapper to prevent false sharing.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct CachePadded<T>(pub T);

impl<T> CachePadded<T> {
    pub const fn new(val: T) -> Self {
        Self(val)
    }
}

impl<T> core::ops::Deref for CachePadded<T> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> core::ops::DerefMut for CachePadded<T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

const BANK_BITS: u32 = 8;
const BANK_MASK: u64 = (1 << BANK_BITS) - 1;

/// Slot layout: `sequence << 8 | bank`. The sequence tag catches a slot that
/// was lapped by a later append while its writer was still in flight.
#[inline(always)]
const fn pack(sequence: u64, bank: u32) -> u64 {
    (sequence << BANK_BITS) | (bank as u64 & BANK_MASK)
}

pub struct OrderLog {
    slots: Box<[AtomicU64]>,
    /// Sequence the next append receives.
    tail: CachePadded<AtomicU64>,
    /// Nothing below this sequence can be popped.
    floor: CachePadded<AtomicU64>,
}

impl OrderLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            tail: CachePadded::new(AtomicU64::new(0)),
            floor: CachePadded::new(AtomicU64::new(0)),
        }
    }

    #[inline(always)]
    fn slot(&self, sequence: u64) -> &AtomicU64 {
        &self.slots[(sequence % self.slots.len() as u64) as usize]
    }

    #[inline(always)]
    fn window_floor(&self, tail: u64) -> u64 {
        self.floor
            .load(Ordering::Acquire)
            .max(tail.saturating_sub(self.slots.len() as u64))
    }

    /// Append `bank`. Call with that bank's lock held so per-bank order
    /// matches log order.
    #[inline]
    pub fn record(&self, bank: u32) -> u64 {
        let sequence = self.tail.fetch_add(1, Ordering::AcqRel);
        self.slot(sequence).store(pack(sequence, bank), Ordering::Release);
        sequence
    }

    /// Pop the most recent bank index. Caller must hold every bank lock.
    ///
    /// `None` once the reachable window is exhausted, or if the newest slot
    /// was lapped, in which case the log is sealed.
    pub fn pop_latest(&self) -> Option<u32> {
        let tail = self.tail.load(Ordering::Acquire);
        let floor = self.window_floor(tail);
        if tail <= floor {
            self.floor.store(tail, Ordering::Release);
            return None;
        }

        let sequence = tail - 1;
        let entry = self.slot(sequence).load(Ordering::Acquire);
        self.tail.store(sequence, Ordering::Release);
        self.floor.store(floor, Ordering::Release);

        if entry >> BANK_BITS != sequence {
            tracing::warn!(sequence, found = entry >> BANK_BITS, "order log slot lapped, sealing");
            self.seal();
            return None;
        }
        Some((entry & BANK_MASK) as u32)
    }

    /// Make everything currently logged unreachable.
    #[inline]
    pub fn seal(&self) {
        let tail = self.tail.load(Ordering::Acquire);
        self.floor.store(tail, Ordering::Release);
    }

    /// Steps a rollback could currently take.
    #[inline]
    pub fn available(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        (tail - self.window_floor(tail)) as usize
    }

    /// Reachable bank indices, oldest first. Caller must hold every bank lock.
    pub fn entries(&self) -> Vec<u32> {
        let tail = self.tail.load(Ordering::Acquire);
        let floor = self.window_floor(tail);
        (floor..tail)
            .map(|seq| (self.slot(seq).load(Ordering::Acquire) & BANK_MASK) as u32)
            .collect()
    }

    pub fn clear(&mut self) {
        *self.tail.get_mut() = 0;
        *self.floor.get_mut() = 0;
    }

    /// Reload from persisted bank indices, oldest first. Keeps the newest
    /// `capacity` entries if given more.
    pub fn restore(&mut self, banks: &[u32]) {
        self.clear();
        let skip = banks.len().saturating_sub(self.slots.len());
        for (seq, &bank) in banks[skip..].iter().enumerate() {
            *self.slots[seq].get_mut() = pack(seq as u64, bank);
        }
        *self.tail.get_mut() = (banks.len() - skip) as u64;
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl core::fmt::Debug for OrderLog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderLog")
            .field("available", &self.available())
            .field("capacity", &self.slots.len())
            .finish()
    }
}
