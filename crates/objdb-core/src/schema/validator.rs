//! Schema validation: pure checks of a schema against the global invariants.

use super::object_schema::ObjectSchema;
use super::property::{Property, PropertyType};
use super::schema::Schema;
use thiserror::Error;

/// A single schema invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A property of a non-nullable type was declared nullable.
    #[error("property '{object}.{property}' of type '{ty}' cannot be nullable")]
    InvalidNullability {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
        /// The offending type.
        ty: PropertyType,
    },

    /// A to-one link was declared required.
    #[error("property '{object}.{property}' of type 'object' must be nullable")]
    RequiredLink {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
    },

    /// The primary key property has a non-key type.
    #[error("property '{object}.{property}' of type '{ty}' cannot be made the primary key")]
    InvalidPrimaryKeyType {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
        /// The offending type.
        ty: PropertyType,
    },

    /// More than one property is marked as the primary key.
    #[error("properties '{first}' and '{second}' are both marked as the primary key of '{object}'")]
    DuplicatePrimaryKeys {
        /// Object type name.
        object: String,
        /// First property marked primary.
        first: String,
        /// Second property marked primary.
        second: String,
    },

    /// An index was requested on a non-indexable type.
    #[error("property '{object}.{property}' of type '{ty}' cannot be indexed")]
    NotIndexable {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
        /// The offending type.
        ty: PropertyType,
    },

    /// A non-inverse property carries an origin property name.
    #[error("property '{object}.{property}' of type '{ty}' cannot have an origin property name")]
    UnexpectedLinkOrigin {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
        /// The offending type.
        ty: PropertyType,
    },

    /// An inverse property is missing its origin property name.
    #[error("property '{object}.{property}' of type '{ty}' must have an origin property name")]
    MissingLinkOrigin {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
        /// The offending type.
        ty: PropertyType,
    },

    /// A non-link property carries an object type.
    #[error("property '{object}.{property}' of type '{ty}' cannot have an object type")]
    UnexpectedObjectType {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
        /// The offending type.
        ty: PropertyType,
    },

    /// A link property is missing its object type.
    #[error("property '{object}.{property}' of type '{ty}' must have an object type")]
    MissingObjectType {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
        /// The offending type.
        ty: PropertyType,
    },

    /// A link property targets an object type not in the schema.
    #[error("property '{object}.{property}' has unknown object type '{target}'")]
    UnknownLinkTarget {
        /// Object type name.
        object: String,
        /// Property name.
        property: String,
        /// The unresolved target name.
        target: String,
    },

    /// The origin property of an inverse link does not exist on the target.
    #[error("property '{target}.{origin}' declared as origin of linking objects property '{object}.{property}' does not exist")]
    LinkOriginMissing {
        /// Object type name of the inverse property.
        object: String,
        /// Inverse property name.
        property: String,
        /// Target object type name.
        target: String,
        /// Declared origin property name.
        origin: String,
    },

    /// The origin property of an inverse link is not a link.
    #[error("property '{target}.{origin}' declared as origin of linking objects property '{object}.{property}' is not a link")]
    LinkOriginNotALink {
        /// Object type name of the inverse property.
        object: String,
        /// Inverse property name.
        property: String,
        /// Target object type name.
        target: String,
        /// Declared origin property name.
        origin: String,
    },

    /// The origin property links to some other object type.
    #[error("property '{target}.{origin}' declared as origin of linking objects property '{object}.{property}' links to type '{actual}'")]
    LinkOriginWrongTarget {
        /// Object type name of the inverse property.
        object: String,
        /// Inverse property name.
        property: String,
        /// Target object type name.
        target: String,
        /// Declared origin property name.
        origin: String,
        /// The type the origin property actually links to.
        actual: String,
    },

    /// The declared primary key names no existing property.
    #[error("specified primary key '{object}.{property}' does not exist")]
    MissingPrimaryKeyProperty {
        /// Object type name.
        object: String,
        /// Declared primary key name.
        property: String,
    },
}

/// Validate a whole schema, returning every violation in walk order,
/// deduplicated. An empty result means the schema is valid.
pub fn validate(schema: &Schema) -> Vec<SchemaError> {
    let mut errors = Vec::new();

    for object in schema.iter() {
        let mut primary: Option<&Property> = None;
        for prop in object
            .persisted_properties
            .iter()
            .chain(object.computed_properties.iter())
        {
            validate_property(schema, object, prop, &mut primary, &mut errors);
        }

        if let Some(pk) = object.primary_key.as_deref() {
            if object.property_for_name(pk).is_none() {
                push(
                    &mut errors,
                    SchemaError::MissingPrimaryKeyProperty {
                        object: object.name.clone(),
                        property: pk.to_string(),
                    },
                );
            }
        }
    }

    errors
}

fn validate_property<'a>(
    schema: &Schema,
    object: &ObjectSchema,
    prop: &'a Property,
    primary: &mut Option<&'a Property>,
    errors: &mut Vec<SchemaError>,
) {
    // Nullability coherence.
    if prop.is_nullable && !prop.type_is_nullable() {
        push(
            errors,
            SchemaError::InvalidNullability {
                object: object.name.clone(),
                property: prop.name.clone(),
                ty: prop.ty,
            },
        );
    } else if prop.ty == PropertyType::Object && !prop.is_nullable {
        push(
            errors,
            SchemaError::RequiredLink {
                object: object.name.clone(),
                property: prop.name.clone(),
            },
        );
    }

    // Primary key coherence.
    if prop.is_primary {
        if !matches!(prop.ty, PropertyType::Int | PropertyType::String) {
            push(
                errors,
                SchemaError::InvalidPrimaryKeyType {
                    object: object.name.clone(),
                    property: prop.name.clone(),
                    ty: prop.ty,
                },
            );
        }
        if let Some(first) = primary {
            push(
                errors,
                SchemaError::DuplicatePrimaryKeys {
                    object: object.name.clone(),
                    first: first.name.clone(),
                    second: prop.name.clone(),
                },
            );
        }
        *primary = Some(prop);
    }

    // Index eligibility.
    if prop.is_indexed && !prop.is_indexable() {
        push(
            errors,
            SchemaError::NotIndexable {
                object: object.name.clone(),
                property: prop.name.clone(),
                ty: prop.ty,
            },
        );
    }

    // Origin property names belong to inverse links only.
    if prop.ty != PropertyType::LinkingObjects && prop.link_origin_property_name.is_some() {
        push(
            errors,
            SchemaError::UnexpectedLinkOrigin {
                object: object.name.clone(),
                property: prop.name.clone(),
                ty: prop.ty,
            },
        );
    } else if prop.ty == PropertyType::LinkingObjects && prop.link_origin_property_name.is_none() {
        push(
            errors,
            SchemaError::MissingLinkOrigin {
                object: object.name.clone(),
                property: prop.name.clone(),
                ty: prop.ty,
            },
        );
    }

    // Object types belong to link kinds only.
    if !prop.ty.is_link_kind() {
        if prop.object_type.is_some() {
            push(
                errors,
                SchemaError::UnexpectedObjectType {
                    object: object.name.clone(),
                    property: prop.name.clone(),
                    ty: prop.ty,
                },
            );
        }
        return;
    }

    let Some(target_name) = prop.object_type.as_deref() else {
        push(
            errors,
            SchemaError::MissingObjectType {
                object: object.name.clone(),
                property: prop.name.clone(),
                ty: prop.ty,
            },
        );
        return;
    };

    let Some(target) = schema.find(target_name) else {
        push(
            errors,
            SchemaError::UnknownLinkTarget {
                object: object.name.clone(),
                property: prop.name.clone(),
                target: target_name.to_string(),
            },
        );
        return;
    };

    if prop.ty != PropertyType::LinkingObjects {
        return;
    }
    let Some(origin_name) = prop.link_origin_property_name.as_deref() else {
        return;
    };

    match target.property_for_name(origin_name) {
        None => push(
            errors,
            SchemaError::LinkOriginMissing {
                object: object.name.clone(),
                property: prop.name.clone(),
                target: target_name.to_string(),
                origin: origin_name.to_string(),
            },
        ),
        Some(origin) if !matches!(origin.ty, PropertyType::Object | PropertyType::Array) => push(
            errors,
            SchemaError::LinkOriginNotALink {
                object: object.name.clone(),
                property: prop.name.clone(),
                target: target_name.to_string(),
                origin: origin_name.to_string(),
            },
        ),
        Some(origin) if origin.object_type.as_deref() != Some(object.name.as_str()) => push(
            errors,
            SchemaError::LinkOriginWrongTarget {
                object: object.name.clone(),
                property: prop.name.clone(),
                target: target_name.to_string(),
                origin: origin_name.to_string(),
                actual: origin.object_type.clone().unwrap_or_default(),
            },
        ),
        Some(_) => {}
    }
}

fn push(errors: &mut Vec<SchemaError>, error: SchemaError) {
    if !errors.contains(&error) {
        errors.push(error);
    }
}
