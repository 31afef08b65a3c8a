//! In-process hot-tier adapters.
//!
//! These play the volatile-counter role (hourly metrics, unique-user
//! sketches, short-TTL idempotency, per-key locks) behind the same
//! ports a networked cache would implement. Losing this tier never
//! loses a committed draw: the executor re-validates everything that
//! matters inside the relational transaction.

pub mod hll;
pub mod memory_asset;
pub mod memory_idempotency;
pub mod memory_lock;
pub mod memory_metrics;

pub use hll::HyperLogLog;
pub use memory_asset::MemoryAssetService;
pub use memory_idempotency::MemoryIdempotencyStore;
pub use memory_lock::MemoryLockService;
pub use memory_metrics::MemoryMetricsSink;
