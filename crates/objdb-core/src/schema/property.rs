//! Property descriptors: one typed attribute of an object schema.

use crate::store::ColumnType;

/// Property types supported by the object model.
///
/// The discriminant values match the store's native column tags
/// (`store::ColumnType`) so a property type converts to a column tag
/// directly. `LinkingObjects` is computed from inverse links and has no
/// column counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PropertyType {
    /// 64-bit signed integer.
    Int = 0,
    /// Boolean.
    Bool = 1,
    /// UTF-8 string.
    String = 2,
    /// Binary data.
    Data = 4,
    /// Dynamically typed value.
    Any = 6,
    /// Timestamp.
    Date = 8,
    /// 32-bit floating point.
    Float = 9,
    /// 64-bit floating point.
    Double = 10,
    /// To-one link to another object type.
    Object = 12,
    /// To-many link to another object type.
    Array = 13,
    /// Inverse-link view: the objects linking to this one.
    LinkingObjects = 14,
}

impl PropertyType {
    /// Whether properties of this type may be declared nullable.
    ///
    /// All scalar types can hold null; to-one links are inherently
    /// optional. Arrays and inverse links cannot be null.
    pub fn is_nullable(self) -> bool {
        !matches!(self, PropertyType::Array | PropertyType::LinkingObjects)
    }

    /// Whether a search index can be attached to this type.
    pub fn is_indexable(self) -> bool {
        matches!(
            self,
            PropertyType::Int | PropertyType::Bool | PropertyType::String | PropertyType::Date
        )
    }

    /// Whether this type references another object type.
    pub fn is_link_kind(self) -> bool {
        matches!(
            self,
            PropertyType::Object | PropertyType::Array | PropertyType::LinkingObjects
        )
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PropertyType::Int => "int",
            PropertyType::Bool => "bool",
            PropertyType::String => "string",
            PropertyType::Data => "data",
            PropertyType::Any => "any",
            PropertyType::Date => "date",
            PropertyType::Float => "float",
            PropertyType::Double => "double",
            PropertyType::Object => "object",
            PropertyType::Array => "array",
            PropertyType::LinkingObjects => "linking objects",
        };
        f.write_str(name)
    }
}

impl TryFrom<PropertyType> for ColumnType {
    type Error = PropertyType;

    fn try_from(ty: PropertyType) -> Result<ColumnType, PropertyType> {
        Ok(match ty {
            PropertyType::Int => ColumnType::Int,
            PropertyType::Bool => ColumnType::Bool,
            PropertyType::String => ColumnType::String,
            PropertyType::Data => ColumnType::Data,
            PropertyType::Any => ColumnType::Any,
            PropertyType::Date => ColumnType::Date,
            PropertyType::Float => ColumnType::Float,
            PropertyType::Double => ColumnType::Double,
            PropertyType::Object => ColumnType::Link,
            PropertyType::Array => ColumnType::LinkList,
            PropertyType::LinkingObjects => return Err(ty),
        })
    }
}

impl From<ColumnType> for PropertyType {
    fn from(ty: ColumnType) -> PropertyType {
        match ty {
            ColumnType::Int => PropertyType::Int,
            ColumnType::Bool => PropertyType::Bool,
            ColumnType::String => PropertyType::String,
            ColumnType::Data => PropertyType::Data,
            ColumnType::Any => PropertyType::Any,
            ColumnType::Date => PropertyType::Date,
            ColumnType::Float => PropertyType::Float,
            ColumnType::Double => PropertyType::Double,
            ColumnType::Link => PropertyType::Object,
            ColumnType::LinkList => PropertyType::Array,
        }
    }
}

/// One property of an object schema.
#[derive(Debug, Clone)]
pub struct Property {
    /// Property name (unique within the object schema).
    pub name: String,
    /// Property type.
    pub ty: PropertyType,
    /// Target object type name; set iff `ty` is a link kind.
    pub object_type: Option<String>,
    /// Origin property on the target; set iff `ty` is `LinkingObjects`.
    pub link_origin_property_name: Option<String>,
    /// Whether this property is the object's primary key.
    pub is_primary: bool,
    /// Whether a search index is requested.
    pub is_indexed: bool,
    /// Whether cells may be null.
    pub is_nullable: bool,
    /// Store-assigned column position; refreshed after every apply.
    pub column_index: usize,
}

impl Property {
    /// A required scalar property.
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            object_type: None,
            link_origin_property_name: None,
            is_primary: false,
            is_indexed: false,
            is_nullable: false,
            column_index: 0,
        }
    }

    /// A nullable scalar property.
    pub fn nullable(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            is_nullable: true,
            ..Self::new(name, ty)
        }
    }

    /// A to-one link property. To-one links are always nullable.
    pub fn object(name: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            object_type: Some(object_type.into()),
            is_nullable: true,
            ..Self::new(name, PropertyType::Object)
        }
    }

    /// A to-many link property.
    pub fn array(name: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            object_type: Some(object_type.into()),
            ..Self::new(name, PropertyType::Array)
        }
    }

    /// An inverse-link computed property.
    pub fn linking_objects(
        name: impl Into<String>,
        object_type: impl Into<String>,
        origin_property: impl Into<String>,
    ) -> Self {
        Self {
            object_type: Some(object_type.into()),
            link_origin_property_name: Some(origin_property.into()),
            ..Self::new(name, PropertyType::LinkingObjects)
        }
    }

    /// Mark as indexed.
    pub fn indexed(mut self) -> Self {
        self.is_indexed = true;
        self
    }

    /// Mark as the primary key.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Whether this property's type admits null values at all.
    pub fn type_is_nullable(&self) -> bool {
        self.ty.is_nullable()
    }

    /// Whether this property's type can carry a search index.
    pub fn is_indexable(&self) -> bool {
        self.ty.is_indexable()
    }

    /// Whether the backing column needs a search index.
    pub fn requires_index(&self) -> bool {
        self.is_indexed || self.is_primary
    }
}

// column_index is assigned by the store and excluded from equality so a
// schema derived from a file compares equal to the declared one.
impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.ty == other.ty
            && self.object_type == other.object_type
            && self.link_origin_property_name == other.link_origin_property_name
            && self.is_primary == other.is_primary
            && self.is_indexed == other.is_indexed
            && self.is_nullable == other.is_nullable
    }
}

impl Eq for Property {}
