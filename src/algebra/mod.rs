//! Delta algebra. XOR over fixed-width words: closed, associative,
//! commutative, identity ZERO, every element its own inverse.

pub mod merge_tree;
pub mod proofs;
pub mod word;

pub use merge_tree::{fold_compose, merge_tree, tree_depth};
pub use proofs::{ConvergenceWitness, GroupLawWitness};
pub use word::{DeltaWord, Word128, Word256, Word512, Word64};
