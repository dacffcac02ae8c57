//! Data layer — the adapter contract the core consumes, and the failover
//! selector that makes the price feed resilient.
//!
//! Adapter *implementations* that talk to real providers live outside this
//! crate; the in-tree adapters (CSV files, in-memory fixtures) exist so the
//! selector and engine can be exercised offline.

pub mod adapter;
pub mod csv_adapter;
pub mod memory;
pub mod selector;

pub use adapter::{Adjust, AdapterError, DataAdapter, DEFAULT_FETCH_TIMEOUT};
pub use csv_adapter::CsvBarAdapter;
pub use memory::MemoryAdapter;
pub use selector::{
    AdapterHealth, AdapterSelector, AdapterSession, AdapterSnapshot, ProbeHandle, SelectorError,
};
