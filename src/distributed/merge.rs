//! Coordinator-free merge of per-node accumulators.
//!
//! `merge_local` and `merge_remote` are the raw group operation. They assume
//! exactly-once delivery: folding the same value twice removes it, since
//! `a ^ a == 0`. `MergeSession` is the fold to use when the transport may
//! redeliver. It keeps the last value seen per node and replaces rather
//! than re-adds.

use std::collections::HashMap;

use crate::algebra::{merge_tree, DeltaWord};

use super::protocol::{Contribution, ContributionKind};

/// Combine same-node partial results. Any order, any grouping.
#[inline]
pub fn merge_local<const LIMBS: usize>(accumulators: &[DeltaWord<LIMBS>]) -> DeltaWord<LIMBS> {
    merge_tree(accumulators)
}

/// Compose a value received from a peer into the local one.
/// Not idempotent: call it once per contribution.
#[inline(always)]
pub fn merge_remote<const LIMBS: usize>(
    local: DeltaWord<LIMBS>,
    remote: DeltaWord<LIMBS>,
) -> DeltaWord<LIMBS> {
    local.compose(remote)
}

/// What `MergeSession::offer` did with a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First contribution from this node.
    Folded,
    /// Newer sequence replaced the node's previous value.
    Superseded { previous: u64 },
    /// Same node and sequence already folded. Ignored.
    Duplicate,
    /// Older than the node's folded sequence. Ignored.
    Stale { latest: u64 },
    /// Contribution kind differs from the session's. Ignored.
    KindMismatch,
}

impl MergeOutcome {
    /// Whether the session's result changed.
    #[inline]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Folded | Self::Superseded { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeEntry<const LIMBS: usize> {
    sequence: u64,
    value: DeltaWord<LIMBS>,
}

/// De-duplicating fold over node contributions.
///
/// Holds `base ^ (latest value of every node)`. Redelivery and reordering
/// leave the result unchanged.
///
/// A `State` session folds each node's initial state along with its deltas,
/// so it is only the global state for zero-initialized disjoint partitions.
/// With a shared initial state, fold `Accumulator` values over `with_base`.
#[derive(Debug, Clone)]
pub struct MergeSession<const LIMBS: usize> {
    kind: ContributionKind,
    base: DeltaWord<LIMBS>,
    folded: DeltaWord<LIMBS>,
    nodes: HashMap<u64, NodeEntry<LIMBS>>,
}

impl<const LIMBS: usize> MergeSession<LIMBS> {
    pub fn new(kind: ContributionKind) -> Self {
        Self::with_base(kind, DeltaWord::ZERO)
    }

    /// Session whose result starts at `base`, e.g. a shared initial state.
    pub fn with_base(kind: ContributionKind, base: DeltaWord<LIMBS>) -> Self {
        Self {
            kind,
            base,
            folded: DeltaWord::ZERO,
            nodes: HashMap::new(),
        }
    }

    pub fn offer(&mut self, contribution: &Contribution<LIMBS>) -> MergeOutcome {
        let outcome = self.fold(contribution);
        match outcome {
            MergeOutcome::Folded | MergeOutcome::Superseded { .. } => {
                tracing::trace!(
                    node = contribution.node,
                    sequence = contribution.sequence,
                    ?outcome,
                    "folded contribution"
                );
            }
            MergeOutcome::Duplicate | MergeOutcome::Stale { .. } => {
                tracing::warn!(
                    node = contribution.node,
                    sequence = contribution.sequence,
                    ?outcome,
                    "ignoring redelivered contribution"
                );
            }
            MergeOutcome::KindMismatch => {
                tracing::warn!(
                    node = contribution.node,
                    expected = ?self.kind,
                    found = ?contribution.kind,
                    "ignoring contribution of the wrong kind"
                );
            }
        }
        outcome
    }

    fn fold(&mut self, contribution: &Contribution<LIMBS>) -> MergeOutcome {
        if contribution.kind != self.kind {
            return MergeOutcome::KindMismatch;
        }
        let incoming = NodeEntry {
            sequence: contribution.sequence,
            value: contribution.value,
        };
        match self.nodes.get_mut(&contribution.node) {
            None => {
                self.folded ^= incoming.value;
                self.nodes.insert(contribution.node, incoming);
                MergeOutcome::Folded
            }
            Some(entry) if incoming.sequence > entry.sequence => {
                // Cancel the old value, add the new one.
                self.folded ^= entry.value ^ incoming.value;
                let previous = entry.sequence;
                *entry = incoming;
                MergeOutcome::Superseded { previous }
            }
            Some(entry) if incoming.sequence == entry.sequence => MergeOutcome::Duplicate,
            Some(entry) => MergeOutcome::Stale {
                latest: entry.sequence,
            },
        }
    }

    /// Offer every contribution; returns how many changed the result.
    pub fn offer_all<'a, I>(&mut self, contributions: I) -> usize
    where
        I: IntoIterator<Item = &'a Contribution<LIMBS>>,
    {
        contributions
            .into_iter()
            .filter(|c| self.offer(c).is_applied())
            .count()
    }

    /// Merge another session's node values into this one, e.g. a subtree
    /// aggregator reporting to its parent. Nodes present in both keep the
    /// newer sequence. `other`'s base is not folded in.
    /// Returns how many node values changed the result.
    pub fn absorb(&mut self, other: &MergeSession<LIMBS>) -> usize {
        if other.kind != self.kind {
            tracing::warn!(
                expected = ?self.kind,
                found = ?other.kind,
                "cannot absorb session of another kind"
            );
            return 0;
        }
        let mut applied = 0;
        for (&node, entry) in &other.nodes {
            let contribution = Contribution {
                node,
                sequence: entry.sequence,
                kind: other.kind,
                value: entry.value,
            };
            // Overlap between aggregators is expected, so no warning here.
            if self.fold(&contribution).is_applied() {
                applied += 1;
            }
        }
        applied
    }

    /// `base` composed with the latest value of every node.
    #[inline]
    pub fn result(&self) -> DeltaWord<LIMBS> {
        merge_remote(self.base, self.folded)
    }

    /// Node values only, without `base`.
    #[inline]
    pub fn folded(&self) -> DeltaWord<LIMBS> {
        self.folded
    }

    pub fn kind(&self) -> ContributionKind {
        self.kind
    }

    pub fn contributors(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: u64) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Sequence of the value currently folded for `node`.
    pub fn sequence_of(&self, node: u64) -> Option<u64> {
        self.nodes.get(&node).map(|entry| entry.sequence)
    }

    /// Contributions currently folded, one per node, in node order.
    pub fn contributions(&self) -> Vec<Contribution<LIMBS>> {
        let mut out: Vec<_> = self
            .nodes
            .iter()
            .map(|(&node, entry)| Contribution {
                node,
                sequence: entry.sequence,
                kind: self.kind,
                value: entry.value,
            })
            .collect();
        out.sort_unstable_by_key(|c| c.node);
        out
    }
}
