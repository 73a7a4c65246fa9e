//! Minimal tabular store backing the schema core.
//!
//! The store knows nothing about object schemas: it deals in tables, typed
//! columns, rows, search indexes, and link columns. Everything above it
//! (naming conventions, metadata tables, schema derivation) lives in the
//! schema and migration layers.

mod file;
mod group;
mod table;
mod value;

pub use file::FileStore;
pub use group::Group;
pub use table::{Column, Table};
pub use value::{Cell, ColumnType, StoreError};
