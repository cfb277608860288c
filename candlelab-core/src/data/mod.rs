//! Data access: the datastore abstraction, the production client, the
//! in-memory source used by tests, and the streaming lookback buffer.

pub mod buffer;
pub mod db;
pub mod export;
pub mod memory;
pub mod source;

pub use buffer::{CandleBuffer, InsufficientLookback, PREFETCH_FACTOR};
pub use db::{CandleDb, DbConfig};
pub use memory::MemorySource;
pub use source::{CandleSource, DataError};
