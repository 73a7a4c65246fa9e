//! The schema data model: properties, object schemas, the schema container,
//! and the invariant validator.

mod object_schema;
mod property;
mod schema;
pub mod validator;

pub use object_schema::ObjectSchema;
pub use property::{Property, PropertyType};
pub use schema::Schema;
pub use validator::SchemaError;
