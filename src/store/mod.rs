//! Persistence layer: one embedded SQLite database backing the relational,
//! document, and time-series stores named in SPEC_FULL.md §6.

pub mod db;
pub mod document;
pub mod relational;
pub mod schema;
pub mod timeseries;

pub use db::Db;
