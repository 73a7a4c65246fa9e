//! Schema diffing: turning `(current, target)` into typed change operations.

use crate::schema::{ObjectSchema, Property, Schema};

/// One structural change between two schemas.
///
/// Changes borrow the property descriptors they refer to, so a change list
/// never outlives the schemas it was computed from.
#[derive(Debug, Clone, Copy)]
pub enum SchemaChange<'a> {
    /// A table for this object schema must be created.
    AddTable {
        /// The object schema being added.
        object: &'a ObjectSchema,
    },
    /// A column for this property must be added.
    AddProperty {
        /// Owning object schema.
        object: &'a ObjectSchema,
        /// The property being added.
        property: &'a Property,
    },
    /// The column for this property must be removed.
    RemoveProperty {
        /// Owning object schema.
        object: &'a ObjectSchema,
        /// The property being removed.
        property: &'a Property,
    },
    /// The column must be rebuilt with a different type or link target.
    ChangePropertyType {
        /// Owning object schema.
        object: &'a ObjectSchema,
        /// The property as currently stored.
        old_property: &'a Property,
        /// The property as requested.
        new_property: &'a Property,
    },
    /// A required column must become nullable, preserving values.
    MakePropertyNullable {
        /// Owning object schema.
        object: &'a ObjectSchema,
        /// The property as requested.
        property: &'a Property,
    },
    /// A nullable column must become required, discarding values.
    MakePropertyRequired {
        /// Owning object schema.
        object: &'a ObjectSchema,
        /// The property as requested.
        property: &'a Property,
    },
    /// A search index must be added.
    AddIndex {
        /// Owning object schema.
        object: &'a ObjectSchema,
        /// The property gaining an index.
        property: &'a Property,
    },
    /// A search index must be removed.
    RemoveIndex {
        /// Owning object schema.
        object: &'a ObjectSchema,
        /// The property losing its index.
        property: &'a Property,
    },
    /// The primary key binding changes to the given property, or to none.
    ChangePrimaryKey {
        /// Owning object schema.
        object: &'a ObjectSchema,
        /// The new primary key property, if any.
        property: Option<&'a Property>,
    },
}

/// Compute the ordered change list turning `current` into `target`.
///
/// Object schemas present only in `current` are not emitted as removals;
/// each policy decides what to do about tables it does not know.
pub fn compare<'a>(current: &'a Schema, target: &'a Schema) -> Vec<SchemaChange<'a>> {
    let mut changes = Vec::new();

    for object in target.iter() {
        match current.find(&object.name) {
            None => {
                changes.push(SchemaChange::AddTable { object });
                for property in &object.persisted_properties {
                    changes.push(SchemaChange::AddProperty { object, property });
                }
                if object.primary_key.is_some() {
                    changes.push(SchemaChange::ChangePrimaryKey {
                        object,
                        property: object.primary_key_property(),
                    });
                }
            }
            Some(existing) => {
                diff_object(existing, object, &mut changes);
            }
        }
    }

    changes
}

fn diff_object<'a>(
    current: &'a ObjectSchema,
    target: &'a ObjectSchema,
    changes: &mut Vec<SchemaChange<'a>>,
) {
    // Pair by name: walk the current side first, then pick up additions in
    // target declaration order.
    for current_prop in &current.persisted_properties {
        let Some(target_prop) = target
            .persisted_properties
            .iter()
            .find(|p| p.name == current_prop.name)
        else {
            changes.push(SchemaChange::RemoveProperty {
                object: target,
                property: current_prop,
            });
            continue;
        };

        if current_prop.ty != target_prop.ty
            || (target_prop.ty.is_link_kind()
                && current_prop.object_type != target_prop.object_type)
        {
            changes.push(SchemaChange::ChangePropertyType {
                object: target,
                old_property: current_prop,
                new_property: target_prop,
            });
            continue;
        }

        if !current_prop.is_nullable && target_prop.is_nullable {
            changes.push(SchemaChange::MakePropertyNullable {
                object: target,
                property: target_prop,
            });
        } else if current_prop.is_nullable && !target_prop.is_nullable {
            changes.push(SchemaChange::MakePropertyRequired {
                object: target,
                property: target_prop,
            });
        }

        // The store carries one index bit per column; primary keys always
        // have one, so the comparison is on requires_index, not the flag.
        if !current_prop.requires_index() && target_prop.requires_index() {
            changes.push(SchemaChange::AddIndex {
                object: target,
                property: target_prop,
            });
        } else if current_prop.requires_index() && !target_prop.requires_index() {
            changes.push(SchemaChange::RemoveIndex {
                object: target,
                property: current_prop,
            });
        }
    }

    for target_prop in &target.persisted_properties {
        if current
            .persisted_properties
            .iter()
            .all(|p| p.name != target_prop.name)
        {
            changes.push(SchemaChange::AddProperty {
                object: target,
                property: target_prop,
            });
        }
    }

    if current.primary_key != target.primary_key {
        changes.push(SchemaChange::ChangePrimaryKey {
            object: target,
            property: target.primary_key_property(),
        });
    }
}

/// Whether applying the change list requires a migration (a version bump
/// and, usually, a user callback).
///
/// True iff any change other than `AddTable`, `AddIndex`, or `RemoveIndex`
/// is present.
pub fn needs_migration(changes: &[SchemaChange<'_>]) -> bool {
    changes.iter().any(|change| {
        !matches!(
            change,
            SchemaChange::AddTable { .. }
                | SchemaChange::AddIndex { .. }
                | SchemaChange::RemoveIndex { .. }
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Property, PropertyType};

    fn object_with(props: Vec<Property>) -> ObjectSchema {
        ObjectSchema::new("object", props)
    }

    fn int_value() -> Property {
        Property::new("value", PropertyType::Int)
    }

    #[test]
    fn test_add_table_emits_properties_in_order() {
        let current = Schema::empty();
        let target = Schema::new([ObjectSchema::new(
            "object",
            vec![int_value(), Property::new("name", PropertyType::String)],
        )]);

        let changes = compare(&current, &target);
        assert_eq!(changes.len(), 3);
        assert!(matches!(changes[0], SchemaChange::AddTable { .. }));
        assert!(
            matches!(changes[1], SchemaChange::AddProperty { property, .. } if property.name == "value")
        );
        assert!(
            matches!(changes[2], SchemaChange::AddProperty { property, .. } if property.name == "name")
        );
        assert!(needs_migration(&changes));
    }

    #[test]
    fn test_add_table_with_primary_key_binds_it() {
        let current = Schema::empty();
        let target = Schema::new([object_with(vec![int_value().primary()])]);

        let changes = compare(&current, &target);
        assert!(matches!(
            changes.last(),
            Some(SchemaChange::ChangePrimaryKey {
                property: Some(p),
                ..
            }) if p.name == "value"
        ));
        assert!(needs_migration(&changes));
    }

    #[test]
    fn test_add_and_remove_property() {
        let current = Schema::new([object_with(vec![int_value()])]);
        let target = Schema::new([object_with(vec![
            int_value(),
            Property::new("extra", PropertyType::Int),
        ])]);

        let changes = compare(&current, &target);
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], SchemaChange::AddProperty { .. }));
        assert!(needs_migration(&changes));

        let changes = compare(&target, &current);
        assert_eq!(changes.len(), 1);
        assert!(
            matches!(changes[0], SchemaChange::RemoveProperty { property, .. } if property.name == "extra")
        );
        assert!(needs_migration(&changes));
    }

    #[test]
    fn test_type_change() {
        let current = Schema::new([object_with(vec![int_value()])]);
        let target = Schema::new([object_with(vec![Property::new(
            "value",
            PropertyType::Float,
        )])]);

        let changes = compare(&current, &target);
        assert_eq!(changes.len(), 1);
        assert!(matches!(
            changes[0],
            SchemaChange::ChangePropertyType { old_property, new_property, .. }
                if old_property.ty == PropertyType::Int && new_property.ty == PropertyType::Float
        ));
        assert!(needs_migration(&changes));
    }

    #[test]
    fn test_link_target_change_is_a_type_change() {
        let target_a = ObjectSchema::new("a", vec![int_value()]);
        let target_b = ObjectSchema::new("b", vec![int_value()]);
        let current = Schema::new([
            target_a.clone(),
            target_b.clone(),
            ObjectSchema::new("origin", vec![Property::object("link", "a")]),
        ]);
        let target = Schema::new([
            target_a,
            target_b,
            ObjectSchema::new("origin", vec![Property::object("link", "b")]),
        ]);

        let changes = compare(&current, &target);
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], SchemaChange::ChangePropertyType { .. }));
    }

    #[test]
    fn test_nullability_changes() {
        let required = Schema::new([object_with(vec![int_value()])]);
        let nullable = Schema::new([object_with(vec![Property::nullable(
            "value",
            PropertyType::Int,
        )])]);

        let widen = compare(&required, &nullable);
        assert!(matches!(widen[0], SchemaChange::MakePropertyNullable { .. }));
        assert!(needs_migration(&widen));

        let narrow = compare(&nullable, &required);
        assert!(matches!(narrow[0], SchemaChange::MakePropertyRequired { .. }));
        assert!(needs_migration(&narrow));
    }

    #[test]
    fn test_index_toggles_do_not_need_migration() {
        let plain = Schema::new([object_with(vec![int_value()])]);
        let indexed = Schema::new([object_with(vec![int_value().indexed()])]);

        let add = compare(&plain, &indexed);
        assert_eq!(add.len(), 1);
        assert!(matches!(add[0], SchemaChange::AddIndex { .. }));
        assert!(!needs_migration(&add));

        let remove = compare(&indexed, &plain);
        assert_eq!(remove.len(), 1);
        assert!(matches!(remove[0], SchemaChange::RemoveIndex { .. }));
        assert!(!needs_migration(&remove));
    }

    #[test]
    fn test_primary_key_column_needs_no_index_toggle() {
        // A primary key column always has a search index in the store; the
        // derived schema reports it as indexed. Explicit is_indexed on the
        // target must not produce an index change.
        let mut derived_prop = int_value().primary();
        derived_prop.is_indexed = true;
        let derived = Schema::new([object_with(vec![derived_prop])]);
        let target = Schema::new([object_with(vec![int_value().primary()])]);

        assert!(compare(&derived, &target).is_empty());
    }

    #[test]
    fn test_primary_key_add_and_remove() {
        let plain = Schema::new([object_with(vec![int_value()])]);
        let keyed = Schema::new([object_with(vec![int_value().primary()])]);

        let add = compare(&plain, &keyed);
        // Adding a pk also adds its backing index.
        assert!(add
            .iter()
            .any(|c| matches!(c, SchemaChange::ChangePrimaryKey { property: Some(_), .. })));
        assert!(needs_migration(&add));

        let remove = compare(&keyed, &plain);
        assert!(remove
            .iter()
            .any(|c| matches!(c, SchemaChange::ChangePrimaryKey { property: None, .. })));
        assert!(needs_migration(&remove));
    }

    #[test]
    fn test_property_reordering_is_not_a_change() {
        let forward = Schema::new([object_with(vec![
            Property::new("col1", PropertyType::Int),
            Property::new("col2", PropertyType::Int),
        ])]);
        let backward = Schema::new([object_with(vec![
            Property::new("col2", PropertyType::Int),
            Property::new("col1", PropertyType::Int),
        ])]);

        assert!(compare(&forward, &backward).is_empty());
    }

    #[test]
    fn test_removed_object_schemas_are_not_emitted() {
        let current = Schema::new([
            object_with(vec![int_value()]),
            ObjectSchema::new("other", vec![int_value()]),
        ]);
        let target = Schema::new([object_with(vec![int_value()])]);

        assert!(compare(&current, &target).is_empty());
    }

    #[test]
    fn test_identical_schemas_produce_no_changes() {
        let schema = Schema::new([object_with(vec![int_value().indexed()])]);
        assert!(compare(&schema, &schema).is_empty());
        assert!(!needs_migration(&compare(&schema, &schema)));
    }
}
