//! Object schemas: the declared shape of one object type.

use super::property::{Property, PropertyType};

/// The schema of a single object type; becomes one store table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSchema {
    /// Object type name.
    pub name: String,
    /// Properties backed by a column, in declaration order.
    pub persisted_properties: Vec<Property>,
    /// Computed properties (`LinkingObjects` only).
    pub computed_properties: Vec<Property>,
    /// Name of the primary key property, if any.
    pub primary_key: Option<String>,
}

impl ObjectSchema {
    /// Create an object schema from a property list.
    ///
    /// `LinkingObjects` properties are routed into the computed set; the
    /// primary key binding is derived from any property marked primary.
    pub fn new(name: impl Into<String>, properties: Vec<Property>) -> Self {
        let mut persisted = Vec::with_capacity(properties.len());
        let mut computed = Vec::new();
        let mut primary_key = None;

        for prop in properties {
            if prop.is_primary {
                primary_key = Some(prop.name.clone());
            }
            if prop.ty == PropertyType::LinkingObjects {
                computed.push(prop);
            } else {
                persisted.push(prop);
            }
        }

        Self {
            name: name.into(),
            persisted_properties: persisted,
            computed_properties: computed,
            primary_key,
        }
    }

    /// Look up a property by name, persisted first, then computed.
    pub fn property_for_name(&self, name: &str) -> Option<&Property> {
        self.persisted_properties
            .iter()
            .chain(self.computed_properties.iter())
            .find(|p| p.name == name)
    }

    /// Mutable lookup over persisted properties.
    pub fn persisted_property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.persisted_properties.iter_mut().find(|p| p.name == name)
    }

    /// The persisted property bound as the primary key, if any.
    pub fn primary_key_property(&self) -> Option<&Property> {
        let pk = self.primary_key.as_deref()?;
        self.persisted_properties.iter().find(|p| p.name == pk)
    }

    /// Mark the property named by `primary_key` as primary.
    ///
    /// Used after deriving a schema from the store, where the binding comes
    /// from the metadata table rather than the property flags.
    pub(crate) fn set_primary_key_property(&mut self) {
        if let Some(pk) = self.primary_key.clone() {
            if let Some(prop) = self.persisted_property_mut(&pk) {
                prop.is_primary = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_splits_computed_properties() {
        let schema = ObjectSchema::new(
            "person",
            vec![
                Property::new("name", PropertyType::String),
                Property::object("dog", "dog"),
                Property::linking_objects("owners", "dog", "owner"),
            ],
        );

        assert_eq!(schema.persisted_properties.len(), 2);
        assert_eq!(schema.computed_properties.len(), 1);
        assert_eq!(schema.computed_properties[0].name, "owners");
    }

    #[test]
    fn test_primary_key_derived_from_flag() {
        let schema = ObjectSchema::new(
            "person",
            vec![
                Property::new("id", PropertyType::Int).primary(),
                Property::new("name", PropertyType::String),
            ],
        );

        assert_eq!(schema.primary_key.as_deref(), Some("id"));
        assert_eq!(schema.primary_key_property().unwrap().name, "id");
    }

    #[test]
    fn test_property_for_name_covers_both_sets() {
        let schema = ObjectSchema::new(
            "person",
            vec![
                Property::new("name", PropertyType::String),
                Property::linking_objects("owners", "dog", "owner"),
            ],
        );

        assert!(schema.property_for_name("name").is_some());
        assert!(schema.property_for_name("owners").is_some());
        assert!(schema.property_for_name("missing").is_none());
    }
}
