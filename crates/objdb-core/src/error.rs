//! Core error types.

use crate::migration::RenameError;
use crate::schema::{PropertyType, SchemaError};
use crate::store::StoreError;
use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level errors of the schema core.
#[derive(Debug, Error)]
pub enum Error {
    /// The supplied schema version is incompatible with the stored one: a
    /// downgrade, or any change at all under ReadOnly.
    #[error("provided schema version {new} does not match last set version {old}")]
    InvalidSchemaVersion {
        /// Version currently stored in the file.
        old: u64,
        /// Version supplied by the caller.
        new: u64,
    },

    /// The target schema violates the global invariants.
    #[error("schema validation failed due to the following errors:{}", bulleted(.errors))]
    SchemaValidation {
        /// Every violation found, in walk order.
        errors: Vec<SchemaError>,
    },

    /// The active policy forbids a required schema change.
    #[error("migration is required due to the following errors:{}", bulleted(.errors))]
    SchemaMismatch {
        /// One entry per forbidden change.
        errors: Vec<MismatchError>,
    },

    /// A primary key column holds duplicate values after migration.
    #[error("primary key property '{object_type}.{property}' has duplicate values after migration")]
    DuplicatePrimaryKeyValue {
        /// Object type name.
        object_type: String,
        /// Primary key property name.
        property: String,
    },

    /// The named object type is not managed by this database.
    #[error("object type '{name}' is not managed by this database")]
    UnknownObjectType {
        /// The unresolved object type name.
        name: String,
    },

    /// A property rename was refused.
    #[error(transparent)]
    PropertyRename(#[from] RenameError),

    /// The store refused to index a column of this type.
    #[error("cannot index property '{object_type}.{property}': indexing properties of type '{ty}' is not supported")]
    IndexNotSupported {
        /// Object type name.
        object_type: String,
        /// Property name.
        property: String,
        /// The offending type.
        ty: PropertyType,
    },

    /// A cached session was opened with conflicting settings.
    #[error("a session at '{path}' is already open with different options")]
    MismatchedConfig {
        /// Path of the cached session.
        path: PathBuf,
    },

    /// The encryption key has the wrong length.
    #[error("encryption key must be 64 bytes")]
    InvalidEncryptionKey,

    /// Manual schema mode is declared but not implemented.
    #[error("manual schema mode is not implemented")]
    ManualModeUnsupported,

    /// A write operation was attempted outside a write transaction.
    #[error("cannot modify the schema outside a write transaction")]
    NotInWriteTransaction,

    /// A write transaction was started while one is already open.
    #[error("a write transaction is already in progress")]
    AlreadyInWriteTransaction,

    /// Error from the underlying tabular store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// One schema change forbidden by the active policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MismatchError {
    /// A property would have to be added to an existing table.
    #[error("property '{object}.{property}' has been added")]
    PropertyAdded {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
    },

    /// A property would have to be removed.
    #[error("property '{object}.{property}' has been removed")]
    PropertyRemoved {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
    },

    /// A property's type would have to change.
    #[error("property '{object}.{property}' has been changed from '{from}' to '{to}'")]
    PropertyTypeChanged {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
        /// Current type.
        from: PropertyType,
        /// Requested type.
        to: PropertyType,
    },

    /// A required property would have to become nullable.
    #[error("property '{object}.{property}' has been made optional")]
    PropertyMadeNullable {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
    },

    /// A nullable property would have to become required.
    #[error("property '{object}.{property}' has been made required")]
    PropertyMadeRequired {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
    },

    /// The primary key binding would have to change.
    #[error("{}", primary_key_changed_message(.object, .property))]
    PrimaryKeyChanged {
        /// Object type name.
        object: String,
        /// New primary key property, if any.
        property: Option<String>,
    },
}

fn primary_key_changed_message(object: &str, property: &Option<String>) -> String {
    match property {
        Some(p) => format!("primary key for class '{object}' has been changed to '{p}'"),
        None => format!("primary key for class '{object}' has been removed"),
    }
}

/// Render an error list as the indented bullet block used by the aggregate
/// error messages.
fn bulleted(errors: &[impl Display]) -> String {
    let mut out = String::new();
    for error in errors {
        out.push_str("\n- ");
        out.push_str(&error.to_string());
    }
    out
}
