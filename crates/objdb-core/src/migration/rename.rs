//! Explicit property rename hints.
//!
//! Renames are only reachable from inside a migration callback, where the
//! old column is still present under the new-shape schema. A rename moves
//! the stored values by renaming the old column and dropping the freshly
//! created one.

use super::applier;
use crate::error::Error;
use crate::schema::{PropertyType, Schema};
use crate::store::Group;

/// Reasons a property rename is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenameError {
    /// The source property has no column in the file.
    #[error("cannot rename property '{object}.{property}' because it does not exist")]
    MissingSourceProperty {
        /// Object type name.
        object: String,
        /// The missing source property.
        property: String,
    },

    /// Renaming would change the property type or link target.
    #[error("cannot rename property '{object}.{old_name}' to '{new_name}' because it would change from type '{from}' to '{to}'")]
    TypeMismatch {
        /// Object type name.
        object: String,
        /// Source property name.
        old_name: String,
        /// Destination property name.
        new_name: String,
        /// Source property type.
        from: PropertyType,
        /// Destination property type.
        to: PropertyType,
    },

    /// The source property still exists in the target schema.
    #[error("cannot rename property '{object}.{property}' because it is still present in the target schema")]
    SourceStillPresent {
        /// Object type name.
        object: String,
        /// Source property name.
        property: String,
    },

    /// Renaming would turn a nullable property into a required one.
    #[error("cannot rename property '{object}.{old_name}' to '{new_name}' because it would change from nullable to required")]
    MakesPropertyRequired {
        /// Object type name.
        object: String,
        /// Source property name.
        old_name: String,
        /// Destination property name.
        new_name: String,
    },

    /// A deferred removal refers to a property that never existed before
    /// the migration.
    #[error("renamed property '{object}.{property}' does not exist")]
    RenamedPropertyMissing {
        /// Object type name.
        object: String,
        /// The phantom property name.
        property: String,
    },
}

/// Rename `object_type.old_name` to `new_name`, moving the stored values.
///
/// `schema` is the new-shape schema the session exposes during migration;
/// its column indices are refreshed after the underlying column removal.
pub fn rename_property(
    group: &mut Group,
    schema: &mut Schema,
    object_type: &str,
    old_name: &str,
    new_name: &str,
) -> Result<(), Error> {
    if applier::table_for_object_type(group, object_type).is_none()
        || !schema.contains(object_type)
    {
        return Err(Error::UnknownObjectType {
            name: object_type.to_string(),
        });
    }

    let stored = applier::object_schema_from_table(group, object_type)?;
    let Some(old_property) = stored.property_for_name(old_name) else {
        return Err(RenameError::MissingSourceProperty {
            object: object_type.to_string(),
            property: old_name.to_string(),
        }
        .into());
    };

    let Some(new_property) = stored.property_for_name(new_name) else {
        // The new name has no column yet, so this is a rename to an
        // intermediate name in a multi-version migration. Schema validation
        // of the final target catches stray names.
        let table = applier::table_for_object_type_mut(group, object_type)?;
        table.rename_column(old_property.column_index, new_name)?;
        applier::set_schema_columns(group, schema);
        return Ok(());
    };

    if old_property.ty != new_property.ty || old_property.object_type != new_property.object_type {
        return Err(RenameError::TypeMismatch {
            object: object_type.to_string(),
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            from: old_property.ty,
            to: new_property.ty,
        }
        .into());
    }

    if schema
        .find(object_type)
        .and_then(|o| o.property_for_name(old_name))
        .is_some()
    {
        return Err(RenameError::SourceStillPresent {
            object: object_type.to_string(),
            property: old_name.to_string(),
        }
        .into());
    }

    if old_property.is_nullable && !new_property.is_nullable {
        return Err(RenameError::MakesPropertyRequired {
            object: object_type.to_string(),
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        }
        .into());
    }

    let widen = new_property.is_nullable && !old_property.is_nullable;
    let widened_property = new_property.clone();
    let column_to_remove = new_property.column_index;

    let table = applier::table_for_object_type_mut(group, object_type)?;
    table.rename_column(old_property.column_index, new_name)?;
    table.remove_column(column_to_remove)?;

    // Column positions may have shifted underneath the schema.
    applier::set_schema_columns(group, schema);

    if widen {
        applier::make_property_optional(group, object_type, &widened_property)?;
        applier::set_schema_columns(group, schema);
    }

    Ok(())
}
