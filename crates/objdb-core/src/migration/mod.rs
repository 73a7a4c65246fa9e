//! Schema evolution: diffing, policy-driven application, and rename hints.
//!
//! The flow is always diff-then-apply: `diff::compare` turns a pair of
//! schemas into a typed change list, and `applier::apply_schema_changes`
//! realizes it on the store under the session's schema mode, deferring
//! property removals across the user migration callback.

pub mod applier;
pub mod diff;
pub mod rename;

pub use applier::{
    apply_schema_changes, create_metadata_tables, delete_data_for_object, get_schema_version,
    is_empty, object_schema_from_table, object_type_for_table_name, primary_key_for_object,
    schema_from_group, set_schema_columns, table_for_object_type, table_name_for_object_type,
    verify_no_migration_required, MigrationHook, NOT_VERSIONED,
};
pub use diff::{compare, needs_migration, SchemaChange};
pub use rename::{rename_property, RenameError};
