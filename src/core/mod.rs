//! The engine. Banks, undo history, the accumulator, persistence.

pub mod accumulator;
pub mod bank;
pub mod checkpoint;
pub mod config;
pub mod history;
pub mod metrics;
pub mod ring;
pub mod state;

pub use accumulator::{AccumulatorSnapshot, BankSample, ParallelAccumulator};
pub use bank::Bank;
pub use checkpoint::{BankRecord, Checkpoint, CheckpointError, CheckpointManager};
pub use config::{ConfigError, Distribution, EngineConfig, MAX_BANKS, MAX_HISTORY_CAPACITY};
pub use history::RollbackHistory;
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use ring::{CachePadded, OrderLog};
pub use state::{reconstruct, StateReconstructor, XorReconstructor};
