//! CLI subcommand implementations.

pub mod export;
pub mod ingest;
pub mod keys;
pub mod stats;
pub mod status;
pub mod total;
pub mod util;
