//! Property-based tests for the DeltaWord group laws and the merge tree.

use proptest::prelude::*;

use deltabank::algebra::{
    fold_compose, merge_tree, tree_depth, ConvergenceWitness, DeltaWord, GroupLawWitness,
    Word256, Word64,
};

fn word64() -> impl Strategy<Value = Word64> {
    any::<u64>().prop_map(Word64::from_u64)
}

fn word256() -> impl Strategy<Value = Word256> {
    any::<[u64; 4]>().prop_map(Word256::from_limbs)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn group_laws_hold_64(a in word64(), b in word64(), c in word64()) {
        prop_assert_eq!(a.compose(b).compose(c), a.compose(b.compose(c)));
        prop_assert_eq!(a.compose(b), b.compose(a));
        prop_assert_eq!(a.compose(Word64::ZERO), a);
        prop_assert_eq!(a.compose(a), Word64::ZERO);
    }

    #[test]
    fn group_laws_hold_256(a in word256(), b in word256(), c in word256()) {
        let witness = GroupLawWitness::verify(a, b, c);
        prop_assert!(witness.is_valid(), "{:?}", witness);
    }

    #[test]
    fn transition_moves_between_states(from in word256(), to in word256()) {
        let delta = DeltaWord::transition(from, to);
        prop_assert_eq!(from.compose(delta), to);
        prop_assert_eq!(to.compose(delta), from);
    }

    #[test]
    fn merge_tree_matches_any_permutation(
        (banks, shuffled) in prop::collection::vec(word256(), 1..64)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        prop_assert_eq!(merge_tree(&banks), fold_compose(&banks));
        prop_assert_eq!(merge_tree(&banks), merge_tree(&shuffled));
    }

    #[test]
    fn convergence_over_bank_counts(
        initial in word64(),
        deltas in prop::collection::vec(word64(), 0..200),
        banks in 1usize..=64,
    ) {
        let witness = ConvergenceWitness::verify(initial, &deltas, banks);
        prop_assert!(witness.converged);
        prop_assert_eq!(witness.final_state, initial.compose(fold_compose(&deltas)));
    }
}

#[test]
fn test_zero_is_unique_identity() {
    let a = Word256::from_limbs([1, 0, 0, 0]);
    assert_ne!(a.compose(a), a);
    assert!(Word256::ZERO.is_zero());
    assert!(!a.is_zero());
}

#[test]
fn test_tree_depth() {
    assert_eq!(tree_depth(1), 0);
    assert_eq!(tree_depth(2), 1);
    assert_eq!(tree_depth(16), 4);
    assert_eq!(tree_depth(17), 5);
    assert_eq!(tree_depth(64), 6);
}

#[test]
fn test_merge_tree_empty_is_zero() {
    assert_eq!(merge_tree::<4>(&[]), Word256::ZERO);
}
