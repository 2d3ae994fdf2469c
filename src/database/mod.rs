// Database module
// Dual store: PostgreSQL is the read-only source of truth, LanceDB holds
// the embedding documents

pub mod lancedb;
pub mod postgres;

pub use postgres::Database;
