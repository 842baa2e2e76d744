//! Proof witnesses. Runtime-checkable evidence that the group laws hold.

use super::merge_tree::{fold_compose, merge_tree};
use super::word::DeltaWord;

/// The five laws for one triple (a, b, c).
#[derive(Debug, Clone, Copy)]
pub struct GroupLawWitness<const LIMBS: usize> {
    pub a: DeltaWord<LIMBS>,
    pub b: DeltaWord<LIMBS>,
    pub c: DeltaWord<LIMBS>,
    pub closure: bool,
    pub associative: bool,
    pub commutative: bool,
    pub identity: bool,
    pub self_inverse: bool,
}

impl<const LIMBS: usize> GroupLawWitness<LIMBS> {
    pub fn verify(a: DeltaWord<LIMBS>, b: DeltaWord<LIMBS>, c: DeltaWord<LIMBS>) -> Self {
        let ab = a.compose(b);
        // Fixed-width XOR cannot leave the type; round-tripping the bytes is the check.
        let closure = {
            let mut buf = Vec::with_capacity(DeltaWord::<LIMBS>::BYTES);
            ab.extend_le(&mut buf);
            DeltaWord::<LIMBS>::from_le_slice(&buf) == Some(ab)
        };

        Self {
            a,
            b,
            c,
            closure,
            associative: ab.compose(c) == a.compose(b.compose(c)),
            commutative: ab == b.compose(a),
            identity: a.compose(DeltaWord::ZERO) == a && DeltaWord::ZERO.compose(a) == a,
            self_inverse: a.compose(a) == DeltaWord::ZERO,
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.closure && self.associative && self.commutative && self.identity && self.self_inverse
    }
}

/// Same deltas, several schedules, one final state.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceWitness<const LIMBS: usize> {
    pub initial_state: DeltaWord<LIMBS>,
    pub final_state: DeltaWord<LIMBS>,
    pub orderings_tested: u32,
    pub converged: bool,
}

impl<const LIMBS: usize> ConvergenceWitness<LIMBS> {
    /// Compares an in-order fold, a reversed fold, and a round-robin spread
    /// over `banks` partial accumulators reduced by the merge tree.
    pub fn verify(
        initial: DeltaWord<LIMBS>,
        deltas: &[DeltaWord<LIMBS>],
        banks: usize,
    ) -> Self {
        let reference = initial.compose(fold_compose(deltas));
        let reversed = initial.compose(fold_compose(deltas.iter().rev()));

        let banks = banks.max(1);
        let mut partials = vec![DeltaWord::ZERO; banks];
        for (i, delta) in deltas.iter().enumerate() {
            partials[i % banks] ^= *delta;
        }
        let banked = initial.compose(merge_tree(&partials));

        Self {
            initial_state: initial,
            final_state: reference,
            orderings_tested: 3,
            converged: reference == reversed && reference == banked,
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::word::{Word128, Word64};

    #[test]
    fn test_group_law_witness() {
        let witness = GroupLawWitness::verify(
            Word128::from_limbs([0xDEAD, 0xBEEF]),
            Word128::from_limbs([u64::MAX, 0]),
            Word128::from_limbs([1, 2]),
        );
        assert!(witness.closure);
        assert!(witness.associative);
        assert!(witness.commutative);
        assert!(witness.identity);
        assert!(witness.self_inverse);
        assert!(witness.is_valid());
    }

    #[test]
    fn test_convergence_witness() {
        let deltas: Vec<Word64> = (1..=100u64)
            .map(|i| Word64::from_u64(i.wrapping_mul(0x9E37)))
            .collect();
        for banks in [1, 2, 3, 16, 64] {
            let witness = ConvergenceWitness::verify(Word64::from_u64(0xFEED), &deltas, banks);
            assert!(witness.is_valid(), "banks = {banks}");
            assert_eq!(witness.orderings_tested, 3);
        }
    }

    #[test]
    fn test_convergence_empty() {
        let initial = Word64::from_u64(42);
        let witness = ConvergenceWitness::verify(initial, &[], 4);
        assert!(witness.is_valid());
        assert_eq!(witness.final_state, initial);
    }
}
