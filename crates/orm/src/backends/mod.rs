//! Storage backends
//!
//! Both backends implement every repository trait plus `DatabaseBackend`.

pub mod memory;
pub mod postgres;
pub mod schema;

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;
