//! State reconstruction: current state = initial state composed with the merged accumulator.
//! Never stored. Always recomputed from bank contents, so it cannot drift.

use crate::algebra::DeltaWord;

/// Seam between the merge tree and the value READ returns.
pub trait StateReconstructor<const LIMBS: usize> {
    fn reconstruct(
        &self,
        initial: &DeltaWord<LIMBS>,
        merged: &DeltaWord<LIMBS>,
    ) -> DeltaWord<LIMBS>;
}

/// The plain reconstruction: `initial ^ merged`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct XorReconstructor;

impl<const LIMBS: usize> StateReconstructor<LIMBS> for XorReconstructor {
    #[inline(always)]
    fn reconstruct(
        &self,
        initial: &DeltaWord<LIMBS>,
        merged: &DeltaWord<LIMBS>,
    ) -> DeltaWord<LIMBS> {
        reconstruct(*initial, *merged)
    }
}

#[inline(always)]
pub fn reconstruct<const LIMBS: usize>(
    initial: DeltaWord<LIMBS>,
    merged: DeltaWord<LIMBS>,
) -> DeltaWord<LIMBS> {
    initial.compose(merged)
}
