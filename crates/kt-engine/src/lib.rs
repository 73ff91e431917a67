//! Keystroke aggregation engine.
//!
//! [`Engine`] owns a serialized worker that turns a stream of [`KeyEvent`]s
//! into per-minute buckets and answers queries against the store. The
//! [`stats`] module holds the stateless read side and can be used directly
//! against a [`Database`](kt_db::Database) by short-lived readers.
//!
//! [`KeyEvent`]: kt_core::KeyEvent

pub mod engine;
pub mod stats;

pub use engine::{Engine, EngineConfig, EngineError, EventSender, MIN_TICK_DELAY};
pub use stats::{
    SnapshotOptions, StoreStatus, bucket_rows, compute_statistics, range_total,
    sorted_key_frequencies, store_status,
};
