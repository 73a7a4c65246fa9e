//! objdb core - schema management for an embedded object database.
//!
//! Given a declared target schema and the schema persisted in a file, this
//! crate computes the structural changes between them, classifies them, and
//! applies them atomically under one of the session's schema modes,
//! optionally running a user migration callback that can rewrite row data.

pub mod error;
pub mod migration;
pub mod schema;
pub mod session;
pub mod store;

pub use error::{Error, MismatchError};
pub use migration::{RenameError, SchemaChange, NOT_VERSIONED};
pub use schema::{ObjectSchema, Property, PropertyType, Schema, SchemaError};
pub use session::{Config, Migration, MigrationFunction, SchemaMode, Session, SharedSession};
pub use store::{Group, Table};
