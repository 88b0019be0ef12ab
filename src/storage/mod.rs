//! Durable local state: the harvest checkpoint and the partitioned record
//! store. Both write atomically (temp file + rename) and assume a single
//! writer per path.

pub mod checkpoint;
pub mod partition;

pub use checkpoint::CheckpointStore;
pub use partition::PartitionStore;
