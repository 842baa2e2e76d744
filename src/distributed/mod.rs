//! Multi-node merge. Any topology, any arrival order; correctness rests on
//! the group laws plus one contribution per node.

pub mod merge;
pub mod protocol;

pub use merge::{merge_local, merge_remote, MergeOutcome, MergeSession};
pub use protocol::{decode_stream, Contribution, ContributionKind, ProtocolError, WireHeader};
