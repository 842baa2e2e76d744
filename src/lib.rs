#![deny(unsafe_op_in_unsafe_fn)]

pub mod algebra;
pub mod core;
pub mod distributed;

/// Prelude for convenient imports of primary API types.
pub mod prelude {
    pub use crate::algebra::{DeltaWord, Word128, Word256, Word512, Word64};
    pub use crate::core::{
        Checkpoint, CheckpointManager, Distribution, EngineConfig, ParallelAccumulator,
        StateReconstructor,
    };
    pub use crate::distributed::{merge_local, merge_remote, Contribution, MergeSession};
}

// Re-export primary types at crate root for convenience.
pub use crate::algebra::{DeltaWord, Word128, Word256, Word512, Word64};
pub use crate::core::{
    AccumulatorSnapshot, Checkpoint, CheckpointError, CheckpointManager, ConfigError,
    Distribution, EngineConfig, MetricsSnapshot, ParallelAccumulator, StateReconstructor,
    XorReconstructor,
};
pub use crate::distributed::{
    merge_local, merge_remote, Contribution, ContributionKind, MergeOutcome, MergeSession,
    ProtocolError,
};
