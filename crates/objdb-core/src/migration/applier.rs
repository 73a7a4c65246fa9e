//! Applying schema change lists to the store under a policy.
//!
//! Everything here operates on a `Group` inside a write transaction owned by
//! the caller; on error the caller cancels the transaction, which restores
//! the on-disk state.

use super::diff::{self, SchemaChange};
use super::rename::RenameError;
use crate::error::{Error, MismatchError};
use crate::schema::{ObjectSchema, Property, PropertyType, Schema};
use crate::session::SchemaMode;
use crate::store::{ColumnType, Group, StoreError, Table};
use tracing::{debug, info};

/// Schema version marking an uninitialized file.
pub const NOT_VERSIONED: u64 = u64::MAX;

const METADATA_TABLE: &str = "metadata";
const VERSION_COLUMN: &str = "version";
const VERSION_COLUMN_INDEX: usize = 0;

const PK_TABLE: &str = "pk";
const PK_OBJECT_COLUMN: &str = "pk_table";
const PK_OBJECT_COLUMN_INDEX: usize = 0;
const PK_PROPERTY_COLUMN: &str = "pk_property";
const PK_PROPERTY_COLUMN_INDEX: usize = 1;

const ZERO_ROW: u64 = 0;

/// Prefix distinguishing user object tables from internal tables.
const OBJECT_TABLE_PREFIX: &str = "class_";

/// User migration callback as seen by the applier: the group under
/// migration, the pre-migration schema, and the (target-shaped) schema the
/// session currently exposes.
pub type MigrationHook<'a> =
    &'a mut dyn FnMut(&mut Group, &Schema, &mut Schema) -> Result<(), Error>;

/// Store table name for an object type.
pub fn table_name_for_object_type(object_type: &str) -> String {
    format!("{OBJECT_TABLE_PREFIX}{object_type}")
}

/// Object type for a store table name; `None` for internal tables.
pub fn object_type_for_table_name(table_name: &str) -> Option<&str> {
    table_name.strip_prefix(OBJECT_TABLE_PREFIX)
}

/// The table backing an object type, if present.
pub fn table_for_object_type<'a>(group: &'a Group, object_type: &str) -> Option<&'a Table> {
    group.get_table(&table_name_for_object_type(object_type))
}

pub(crate) fn table_for_object_type_mut<'a>(
    group: &'a mut Group,
    object_type: &str,
) -> Result<&'a mut Table, StoreError> {
    let name = table_name_for_object_type(object_type);
    group
        .get_table_mut(&name)
        .ok_or(StoreError::TableNotFound(name))
}

/// Read the schema version stored in the file.
pub fn get_schema_version(group: &Group) -> u64 {
    let Some(table) = group.get_table(METADATA_TABLE) else {
        return NOT_VERSIONED;
    };
    if table.column_count() == 0 || table.is_empty() {
        return NOT_VERSIONED;
    }
    table
        .get_int(VERSION_COLUMN_INDEX, ZERO_ROW)
        .map(|v| v as u64)
        .unwrap_or(NOT_VERSIONED)
}

fn set_schema_version(group: &mut Group, version: u64) -> Result<(), Error> {
    let table = group
        .get_table_mut(METADATA_TABLE)
        .ok_or_else(|| StoreError::TableNotFound(METADATA_TABLE.into()))?;
    table.set_int(VERSION_COLUMN_INDEX, ZERO_ROW, version as i64)?;
    Ok(())
}

/// Create the internal metadata tables if they do not exist yet.
pub fn create_metadata_tables(group: &mut Group) -> Result<(), Error> {
    let table = group.get_or_add_table(PK_TABLE);
    if table.column_count() == 0 {
        table.insert_column(PK_OBJECT_COLUMN_INDEX, ColumnType::String, PK_OBJECT_COLUMN, false)?;
        table.insert_column(
            PK_PROPERTY_COLUMN_INDEX,
            ColumnType::String,
            PK_PROPERTY_COLUMN,
            false,
        )?;
    }

    let table = group.get_or_add_table(METADATA_TABLE);
    if table.column_count() == 0 {
        table.insert_column(VERSION_COLUMN_INDEX, ColumnType::Int, VERSION_COLUMN, false)?;
        table.add_empty_row();
        table.set_int(VERSION_COLUMN_INDEX, ZERO_ROW, NOT_VERSIONED as i64)?;
    }
    Ok(())
}

/// Primary key property name recorded for an object type.
pub fn primary_key_for_object(group: &Group, object_type: &str) -> Option<String> {
    let table = group.get_table(PK_TABLE)?;
    let row = table
        .find_first_string(PK_OBJECT_COLUMN_INDEX, object_type)
        .ok()??;
    table.get_string(PK_PROPERTY_COLUMN_INDEX, row).ok()
}

/// Record, replace, or (for `None`) delete the primary key binding of an
/// object type.
pub(crate) fn set_primary_key_for_object(
    group: &mut Group,
    object_type: &str,
    primary_key: Option<&str>,
) -> Result<(), Error> {
    let table = group
        .get_table_mut(PK_TABLE)
        .ok_or_else(|| StoreError::TableNotFound(PK_TABLE.into()))?;
    let row = table.find_first_string(PK_OBJECT_COLUMN_INDEX, object_type)?;

    match (row, primary_key) {
        (Some(row), Some(pk)) => table.set_string(PK_PROPERTY_COLUMN_INDEX, row, pk)?,
        (None, Some(pk)) => {
            let row = table.add_empty_row();
            table.set_string(PK_OBJECT_COLUMN_INDEX, row, object_type)?;
            table.set_string(PK_PROPERTY_COLUMN_INDEX, row, pk)?;
        }
        (Some(row), None) => table.remove_row(row)?,
        (None, None) => {}
    }
    Ok(())
}

/// Derive the object schema of one object type from its table.
pub fn object_schema_from_table(group: &Group, object_type: &str) -> Result<ObjectSchema, Error> {
    let table = table_for_object_type(group, object_type).ok_or_else(|| {
        Error::UnknownObjectType {
            name: object_type.to_string(),
        }
    })?;

    let mut properties = Vec::with_capacity(table.column_count());
    for col in 0..table.column_count() {
        let ty = PropertyType::from(table.column_type(col)?);
        let object_type_name = if ty.is_link_kind() {
            let target = table.link_target(col)?;
            object_type_for_table_name(target).map(String::from)
        } else {
            None
        };
        properties.push(Property {
            name: table.column_name(col)?.to_string(),
            ty,
            object_type: object_type_name,
            link_origin_property_name: None,
            is_primary: false,
            is_indexed: table.has_search_index(col)?,
            is_nullable: table.is_nullable(col)? || ty == PropertyType::Object,
            column_index: col,
        });
    }

    let mut object_schema = ObjectSchema {
        name: object_type.to_string(),
        persisted_properties: properties,
        computed_properties: Vec::new(),
        primary_key: primary_key_for_object(group, object_type),
    };
    object_schema.set_primary_key_property();
    Ok(object_schema)
}

/// Derive the full schema persisted in the store.
pub fn schema_from_group(group: &Group) -> Result<Schema, Error> {
    let mut objects = Vec::new();
    for i in 0..group.len() {
        if let Some(object_type) = object_type_for_table_name(group.table_name(i)?) {
            let object_type = object_type.to_string();
            objects.push(object_schema_from_table(group, &object_type)?);
        }
    }
    Ok(Schema::new(objects))
}

/// Refresh the column indices of every persisted property from the store.
///
/// Column positions shift whenever columns are inserted or removed, so they
/// are re-read by name after every apply.
pub fn set_schema_columns(group: &Group, schema: &mut Schema) {
    for object_schema in schema.iter_mut() {
        let Some(table) = table_for_object_type(group, &object_schema.name) else {
            continue;
        };
        for prop in &mut object_schema.persisted_properties {
            if let Some(col) = table.column_index(&prop.name) {
                prop.column_index = col;
            }
        }
    }
}

/// Whether the file contains no rows in any user object table.
pub fn is_empty(group: &Group) -> bool {
    group
        .tables()
        .filter(|t| object_type_for_table_name(t.name()).is_some())
        .all(Table::is_empty)
}

/// Drop the table for an object type along with its primary key binding.
pub fn delete_data_for_object(group: &mut Group, object_type: &str) -> Result<(), Error> {
    let name = table_name_for_object_type(object_type);
    if let Some(index) = group.table_index(&name) {
        group.remove_table(index)?;
        set_primary_key_for_object(group, object_type, None)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Column primitives
// ---------------------------------------------------------------------------

fn index_error(object_type: &str, prop: &Property, error: StoreError) -> Error {
    match error {
        StoreError::IndexNotSupported(_) => Error::IndexNotSupported {
            object_type: object_type.to_string(),
            property: prop.name.clone(),
            ty: prop.ty,
        },
        other => Error::Store(other),
    }
}

/// Insert the column for a property at a fixed position.
///
/// Link properties materialize their target table first; scalar properties
/// get their search index attached when required.
fn insert_property_column(
    group: &mut Group,
    object_type: &str,
    prop: &Property,
    index: usize,
) -> Result<(), Error> {
    let table_name = table_name_for_object_type(object_type);
    match prop.ty {
        PropertyType::Object | PropertyType::Array => {
            let target_type = prop.object_type.as_deref().ok_or_else(|| {
                Error::UnknownObjectType {
                    name: prop.name.clone(),
                }
            })?;
            let target_table = table_name_for_object_type(target_type);
            group.get_or_add_table(&target_table);
            let column_type = if prop.ty == PropertyType::Object {
                ColumnType::Link
            } else {
                ColumnType::LinkList
            };
            let table = group
                .get_table_mut(&table_name)
                .ok_or(StoreError::TableNotFound(table_name))?;
            table.insert_column_link(index, column_type, &prop.name, target_table)?;
        }
        PropertyType::LinkingObjects => {
            // Computed property; no backing column.
        }
        _ => {
            let Ok(column_type) = ColumnType::try_from(prop.ty) else {
                return Ok(());
            };
            let table = group
                .get_table_mut(&table_name)
                .ok_or(StoreError::TableNotFound(table_name))?;
            table.insert_column(index, column_type, &prop.name, prop.is_nullable)?;
            if prop.requires_index() {
                table
                    .add_search_index(index)
                    .map_err(|e| index_error(object_type, prop, e))?;
            }
        }
    }
    Ok(())
}

/// Append the column for a property.
fn add_property_column(group: &mut Group, object_type: &str, prop: &Property) -> Result<(), Error> {
    let index = table_for_object_type(group, object_type)
        .map(Table::column_count)
        .unwrap_or(0);
    insert_property_column(group, object_type, prop, index)
}

fn column_for_property(table: &Table, prop: &Property) -> Result<usize, StoreError> {
    table
        .column_index(&prop.name)
        .ok_or_else(|| StoreError::ColumnNotFound(prop.name.clone()))
}

/// Replace a column destructively: insert the new shape at the old
/// position, then drop the old column.
fn replace_property_column(
    group: &mut Group,
    object_type: &str,
    old_prop: &Property,
    new_prop: &Property,
) -> Result<(), Error> {
    let table = table_for_object_type_mut(group, object_type)?;
    let index = column_for_property(table, old_prop)?;
    insert_property_column(group, object_type, new_prop, index)?;
    table_for_object_type_mut(group, object_type)?.remove_column(index + 1)?;
    Ok(())
}

/// Copy values from column `from` to column `to`, dispatching on the
/// property type. Only scalar types carry values across column rebuilds.
fn copy_property_values(
    table: &mut Table,
    ty: PropertyType,
    to: usize,
    from: usize,
) -> Result<(), StoreError> {
    macro_rules! copy {
        ($get:ident, $set:ident) => {
            for row in 0..table.size() {
                let value = table.$get(from, row)?;
                table.$set(to, row, value)?;
            }
        };
    }
    match ty {
        PropertyType::Int => copy!(get_int, set_int),
        PropertyType::Bool => copy!(get_bool, set_bool),
        PropertyType::Float => copy!(get_float, set_float),
        PropertyType::Double => copy!(get_double, set_double),
        PropertyType::String => copy!(get_string, set_string),
        PropertyType::Data => copy!(get_data, set_data),
        PropertyType::Date => copy!(get_date, set_date),
        _ => {}
    }
    Ok(())
}

/// Rebuild a column as nullable, preserving its values.
pub(crate) fn make_property_optional(
    group: &mut Group,
    object_type: &str,
    prop: &Property,
) -> Result<(), Error> {
    let mut prop = prop.clone();
    prop.is_nullable = true;

    let table = table_for_object_type_mut(group, object_type)?;
    let index = column_for_property(table, &prop)?;
    insert_property_column(group, object_type, &prop, index)?;

    let table = table_for_object_type_mut(group, object_type)?;
    copy_property_values(table, prop.ty, index, index + 1)?;
    table.remove_column(index + 1)?;
    Ok(())
}

/// Rebuild a column as required; existing values are discarded and rows
/// read back as the type default.
fn make_property_required(
    group: &mut Group,
    object_type: &str,
    prop: &Property,
) -> Result<(), Error> {
    let mut prop = prop.clone();
    prop.is_nullable = false;

    let table = table_for_object_type_mut(group, object_type)?;
    let index = column_for_property(table, &prop)?;
    insert_property_column(group, object_type, &prop, index)?;
    table_for_object_type_mut(group, object_type)?.remove_column(index + 1)?;
    Ok(())
}

fn add_index(group: &mut Group, object: &ObjectSchema, prop: &Property) -> Result<(), Error> {
    let table = table_for_object_type_mut(group, &object.name)?;
    let index = column_for_property(table, prop)?;
    table
        .add_search_index(index)
        .map_err(|e| index_error(&object.name, prop, e))
}

fn remove_index(group: &mut Group, object: &ObjectSchema, prop: &Property) -> Result<(), Error> {
    let table = table_for_object_type_mut(group, &object.name)?;
    let index = column_for_property(table, prop)?;
    table.remove_search_index(index)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Policy appliers
// ---------------------------------------------------------------------------

fn mismatch_for(change: SchemaChange<'_>) -> Option<MismatchError> {
    match change {
        SchemaChange::AddProperty { object, property } => Some(MismatchError::PropertyAdded {
            object: object.name.clone(),
            property: property.name.clone(),
        }),
        SchemaChange::RemoveProperty { object, property } => Some(MismatchError::PropertyRemoved {
            object: object.name.clone(),
            property: property.name.clone(),
        }),
        SchemaChange::ChangePropertyType {
            object,
            old_property,
            new_property,
        } => Some(MismatchError::PropertyTypeChanged {
            object: object.name.clone(),
            property: new_property.name.clone(),
            from: old_property.ty,
            to: new_property.ty,
        }),
        SchemaChange::MakePropertyNullable { object, property } => {
            Some(MismatchError::PropertyMadeNullable {
                object: object.name.clone(),
                property: property.name.clone(),
            })
        }
        SchemaChange::MakePropertyRequired { object, property } => {
            Some(MismatchError::PropertyMadeRequired {
                object: object.name.clone(),
                property: property.name.clone(),
            })
        }
        SchemaChange::ChangePrimaryKey { object, property } => {
            Some(MismatchError::PrimaryKeyChanged {
                object: object.name.clone(),
                property: property.map(|p| p.name.clone()),
            })
        }
        SchemaChange::AddTable { .. }
        | SchemaChange::AddIndex { .. }
        | SchemaChange::RemoveIndex { .. } => None,
    }
}

/// Check that a change list contains only changes applicable without a
/// migration: new tables with their properties, and index toggles.
/// Everything else, primary key bindings included, is collected into a
/// `SchemaMismatch`.
pub fn verify_no_migration_required(changes: &[SchemaChange<'_>]) -> Result<(), Error> {
    let mut errors = Vec::new();
    let mut added_table: Option<&str> = None;

    for change in changes {
        match *change {
            SchemaChange::AddTable { object } => added_table = Some(&object.name),
            SchemaChange::AddIndex { .. } | SchemaChange::RemoveIndex { .. } => {}
            SchemaChange::AddProperty { object, .. }
                if added_table == Some(object.name.as_str()) => {}
            other => {
                if let Some(error) = mismatch_for(other) {
                    errors.push(error);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaMismatch { errors })
    }
}

/// Apply the restricted change set permitted without a version bump.
fn apply_non_migration_changes(group: &mut Group, changes: &[SchemaChange<'_>]) -> Result<(), Error> {
    let mut errors = Vec::new();
    let mut added_table: Option<&str> = None;

    for change in changes {
        match *change {
            SchemaChange::AddTable { object } => {
                added_table = Some(&object.name);
                group.get_or_add_table(&table_name_for_object_type(&object.name));
            }
            SchemaChange::AddProperty { object, property }
                if added_table == Some(object.name.as_str()) =>
            {
                add_property_column(group, &object.name, property)?;
            }
            SchemaChange::AddIndex { object, property } => add_index(group, object, property)?,
            SchemaChange::RemoveIndex { object, property } => {
                remove_index(group, object, property)?;
            }
            other => {
                if let Some(error) = mismatch_for(other) {
                    errors.push(error);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaMismatch { errors })
    }
}

/// Apply a full change list against a fresh (or reset) file. Purely
/// additive in practice, but tolerant of every variant so re-running over a
/// partially shaped file converges.
fn create_initial_tables(group: &mut Group, changes: &[SchemaChange<'_>]) -> Result<(), Error> {
    for change in changes {
        match *change {
            SchemaChange::AddTable { object } => {
                group.get_or_add_table(&table_name_for_object_type(&object.name));
            }
            SchemaChange::AddProperty { object, property } => {
                add_property_column(group, &object.name, property)?;
            }
            SchemaChange::RemoveProperty { object, property } => {
                let table = table_for_object_type_mut(group, &object.name)?;
                let index = column_for_property(table, property)?;
                table.remove_column(index)?;
            }
            SchemaChange::ChangePropertyType {
                object,
                old_property,
                new_property,
            } => replace_property_column(group, &object.name, old_property, new_property)?,
            SchemaChange::MakePropertyNullable { object, property } => {
                make_property_optional(group, &object.name, property)?;
            }
            SchemaChange::MakePropertyRequired { object, property } => {
                make_property_required(group, &object.name, property)?;
            }
            SchemaChange::ChangePrimaryKey { object, property } => {
                set_primary_key_for_object(group, &object.name, property.map(|p| p.name.as_str()))?;
            }
            SchemaChange::AddIndex { object, property } => add_index(group, object, property)?,
            SchemaChange::RemoveIndex { object, property } => {
                remove_index(group, object, property)?;
            }
        }
    }
    Ok(())
}

/// Apply every change except property removals, which are deferred until
/// after the user migration callback so it can still read (and copy from)
/// the doomed columns.
fn apply_pre_migration_changes(group: &mut Group, changes: &[SchemaChange<'_>]) -> Result<(), Error> {
    for change in changes {
        match *change {
            SchemaChange::AddTable { object } => {
                group.get_or_add_table(&table_name_for_object_type(&object.name));
            }
            SchemaChange::AddProperty { object, property } => {
                add_property_column(group, &object.name, property)?;
            }
            SchemaChange::RemoveProperty { .. } => {
                // Deferred until after the migration callback.
            }
            SchemaChange::ChangePropertyType {
                object,
                old_property,
                new_property,
            } => replace_property_column(group, &object.name, old_property, new_property)?,
            SchemaChange::MakePropertyNullable { object, property } => {
                make_property_optional(group, &object.name, property)?;
            }
            SchemaChange::MakePropertyRequired { object, property } => {
                make_property_required(group, &object.name, property)?;
            }
            SchemaChange::ChangePrimaryKey { object, property } => {
                set_primary_key_for_object(group, &object.name, property.map(|p| p.name.as_str()))?;
            }
            SchemaChange::AddIndex { object, property } => add_index(group, object, property)?,
            SchemaChange::RemoveIndex { object, property } => {
                remove_index(group, object, property)?;
            }
        }
    }
    Ok(())
}

/// Apply the deferred removals and primary key uniqueness checks after the
/// migration callback ran.
///
/// When `initial_schema` is given, a property removal must refer to a
/// column that existed before the migration; otherwise the callback renamed
/// something into a property that never existed.
fn apply_post_migration_changes(
    group: &mut Group,
    changes: &[SchemaChange<'_>],
    initial_schema: Option<&Schema>,
) -> Result<(), Error> {
    for change in changes {
        match *change {
            SchemaChange::RemoveProperty { object, property } => {
                if let Some(initial) = initial_schema {
                    if let Some(initial_object) = initial.find(&object.name) {
                        if initial_object.property_for_name(&property.name).is_none() {
                            return Err(RenameError::RenamedPropertyMissing {
                                object: object.name.clone(),
                                property: property.name.clone(),
                            }
                            .into());
                        }
                    }
                }
                let table = table_for_object_type_mut(group, &object.name)?;
                let index = column_for_property(table, property)?;
                table.remove_column(index)?;
            }
            SchemaChange::ChangePrimaryKey {
                object,
                property: Some(property),
            } => {
                let table = table_for_object_type_mut(group, &object.name)?;
                let index = column_for_property(table, property)?;
                if table.distinct_count(index)? != table.size() {
                    return Err(Error::DuplicatePrimaryKeyValue {
                        object_type: object.name.clone(),
                        property: property.name.clone(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Verify uniqueness of every recorded primary key column.
fn validate_primary_column_uniqueness(group: &Group) -> Result<(), Error> {
    let Some(pk_table) = group.get_table(PK_TABLE) else {
        return Ok(());
    };
    for row in 0..pk_table.size() {
        let object_type = pk_table.get_string(PK_OBJECT_COLUMN_INDEX, row)?;
        let property = pk_table.get_string(PK_PROPERTY_COLUMN_INDEX, row)?;

        let table =
            table_for_object_type(group, &object_type).ok_or_else(|| Error::UnknownObjectType {
                name: object_type.clone(),
            })?;
        let index = table
            .column_index(&property)
            .ok_or_else(|| StoreError::ColumnNotFound(property.clone()))?;
        if table.distinct_count(index)? != table.size() {
            return Err(Error::DuplicatePrimaryKeyValue {
                object_type,
                property,
            });
        }
    }
    Ok(())
}

/// Additive-policy applier: new tables and properties apply anywhere; index
/// toggles apply only when `update_indexes` is set; everything else is a
/// mismatch.
fn apply_additive_changes(
    group: &mut Group,
    changes: &[SchemaChange<'_>],
    update_indexes: bool,
) -> Result<(), Error> {
    let mut errors = Vec::new();
    let mut added_table: Option<&str> = None;

    for change in changes {
        match *change {
            SchemaChange::AddTable { object } => {
                added_table = Some(&object.name);
                group.get_or_add_table(&table_name_for_object_type(&object.name));
            }
            SchemaChange::AddProperty { object, property } => {
                add_property_column(group, &object.name, property)?;
            }
            SchemaChange::ChangePrimaryKey { object, property }
                if added_table == Some(object.name.as_str()) =>
            {
                set_primary_key_for_object(group, &object.name, property.map(|p| p.name.as_str()))?;
            }
            SchemaChange::AddIndex { object, property } => {
                if update_indexes {
                    add_index(group, object, property)?;
                }
            }
            SchemaChange::RemoveIndex { object, property } => {
                if update_indexes {
                    remove_index(group, object, property)?;
                }
            }
            other => {
                if let Some(error) = mismatch_for(other) {
                    errors.push(error);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaMismatch { errors })
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Bring the store to `target_schema` at `target_version` under the given
/// policy, updating the in-memory `schema` and `schema_version` on success
/// and restoring them on failure.
///
/// Must run inside a write transaction owned by the caller; the caller
/// cancels the transaction when this returns an error.
pub fn apply_schema_changes(
    group: &mut Group,
    schema: &mut Schema,
    schema_version: &mut u64,
    target_schema: &Schema,
    target_version: u64,
    mode: SchemaMode,
    migration: Option<MigrationHook<'_>>,
) -> Result<(), Error> {
    let version = get_schema_version(group);
    if version > target_version && version != NOT_VERSIONED && mode != SchemaMode::Additive {
        return Err(Error::InvalidSchemaVersion {
            old: version,
            new: target_version,
        });
    }

    let current = schema_from_group(group)?;
    let changes = diff::compare(&current, target_schema);
    debug!(
        mode = ?mode,
        changes = changes.len(),
        from_version = version,
        to_version = target_version,
        "applying schema changes"
    );

    match mode {
        SchemaMode::Automatic => apply_automatic(
            group,
            schema,
            schema_version,
            target_schema,
            target_version,
            version,
            &changes,
            migration,
        ),
        SchemaMode::ReadOnly => {
            if version != NOT_VERSIONED && version != target_version {
                return Err(Error::InvalidSchemaVersion {
                    old: version,
                    new: target_version,
                });
            }
            verify_no_migration_required(&changes)?;
            *schema_version = version;
            *schema = target_schema.clone();
            set_schema_columns(group, schema);
            Ok(())
        }
        SchemaMode::ResetFile => {
            let breaking = verify_no_migration_required(&changes).is_err();
            if breaking || (version != NOT_VERSIONED && target_version > version) {
                info!(to_version = target_version, "resetting file for new schema");
                group.clear();
                create_metadata_tables(group)?;
                let empty = Schema::empty();
                let initial = diff::compare(&empty, target_schema);
                create_initial_tables(group, &initial)?;
            } else {
                create_metadata_tables(group)?;
                apply_non_migration_changes(group, &changes)?;
            }
            set_schema_version(group, target_version)?;
            *schema_version = target_version;
            *schema = target_schema.clone();
            set_schema_columns(group, schema);
            Ok(())
        }
        SchemaMode::Additive => {
            create_metadata_tables(group)?;
            let update_indexes = version == NOT_VERSIONED || target_version > version;
            apply_additive_changes(group, &changes, update_indexes)?;

            // The stored version never decreases under Additive.
            let new_version = if version == NOT_VERSIONED {
                target_version
            } else {
                version.max(target_version)
            };
            set_schema_version(group, new_version)?;
            *schema_version = new_version;
            *schema = target_schema.clone();
            set_schema_columns(group, schema);
            Ok(())
        }
        SchemaMode::Manual => Err(Error::ManualModeUnsupported),
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_automatic(
    group: &mut Group,
    schema: &mut Schema,
    schema_version: &mut u64,
    target_schema: &Schema,
    target_version: u64,
    version: u64,
    changes: &[SchemaChange<'_>],
    migration: Option<MigrationHook<'_>>,
) -> Result<(), Error> {
    create_metadata_tables(group)?;

    if version == target_version {
        apply_non_migration_changes(group, changes)?;
        *schema = target_schema.clone();
        set_schema_columns(group, schema);
        return Ok(());
    }

    if version == NOT_VERSIONED {
        create_initial_tables(group, changes)?;
        set_schema_version(group, target_version)?;
        *schema_version = target_version;
        *schema = target_schema.clone();
        set_schema_columns(group, schema);
        info!(version = target_version, "created initial schema");
        return Ok(());
    }

    apply_pre_migration_changes(group, changes)?;

    if let Some(migration) = migration {
        // The callback must see the new-shape schema, with the columns of
        // soon-to-be-removed properties still present underneath.
        let old_schema = schema.clone();
        let old_version = *schema_version;
        *schema = target_schema.clone();
        set_schema_columns(group, schema);
        *schema_version = target_version;

        let result = (|| {
            migration(group, &old_schema, schema)?;

            // The callback may have renamed or dropped columns; re-derive
            // before the deferred removals.
            let rederived = schema_from_group(group)?;
            let post_changes = diff::compare(&rederived, target_schema);
            apply_post_migration_changes(group, &post_changes, Some(&old_schema))?;
            validate_primary_column_uniqueness(group)
        })();

        if let Err(error) = result {
            *schema = old_schema;
            *schema_version = old_version;
            return Err(error);
        }
    } else {
        apply_post_migration_changes(group, changes, None)?;
    }

    set_schema_version(group, target_version)?;
    *schema_version = target_version;
    *schema = target_schema.clone();
    set_schema_columns(group, schema);
    info!(from_version = version, to_version = target_version, "migrated schema");
    Ok(())
}
