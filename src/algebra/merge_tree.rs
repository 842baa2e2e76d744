//! Balanced binary merge tree. Depth ceil(log2 N), no allocation.
//!
//! Associativity and commutativity make every pairing identical to a left fold.
//! The tree shape only exists so independent halves can be reduced in parallel.

use super::word::DeltaWord;

/// Reduce `words` pairwise. Empty input reduces to `ZERO`.
#[inline]
pub fn merge_tree<const LIMBS: usize>(words: &[DeltaWord<LIMBS>]) -> DeltaWord<LIMBS> {
    match words.len() {
        0 => DeltaWord::ZERO,
        1 => words[0],
        2 => words[0].compose(words[1]),
        n => {
            let (left, right) = words.split_at(n.div_ceil(2));
            merge_tree(left).compose(merge_tree(right))
        }
    }
}

/// Levels of pairwise composition needed for `n` leaves.
#[inline(always)]
pub const fn tree_depth(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

/// Sequential left fold. Reference reduction for the tree.
#[inline]
pub fn fold_compose<'a, const LIMBS: usize, I>(words: I) -> DeltaWord<LIMBS>
where
    I: IntoIterator<Item = &'a DeltaWord<LIMBS>>,
{
    words
        .into_iter()
        .fold(DeltaWord::ZERO, |acc, word| acc.compose(*word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::word::{Word256, Word64};

    #[test]
    fn test_empty_and_single() {
        assert_eq!(merge_tree::<1>(&[]), Word64::ZERO);
        let w = Word64::from_u64(0xABCD);
        assert_eq!(merge_tree(&[w]), w);
    }

    #[test]
    fn test_tree_matches_fold() {
        for n in 0..40u64 {
            let words: Vec<Word256> = (0..n)
                .map(|i| Word256::from_limbs([i * 3 + 1, i << 7, !i, i.rotate_left(13)]))
                .collect();
            assert_eq!(merge_tree(&words), fold_compose(&words), "n = {n}");
        }
    }

    #[test]
    fn test_tree_depth() {
        assert_eq!(tree_depth(0), 0);
        assert_eq!(tree_depth(1), 0);
        assert_eq!(tree_depth(2), 1);
        assert_eq!(tree_depth(3), 2);
        assert_eq!(tree_depth(4), 2);
        assert_eq!(tree_depth(5), 3);
        assert_eq!(tree_depth(16), 4);
        assert_eq!(tree_depth(64), 6);
    }
}
