//! The session surface: configuration, the per-path session cache, and
//! write transactions around schema updates.

mod config;
mod session;

pub use config::{Config, SchemaMode};
pub use session::{Migration, MigrationFunction, Session, SharedSession};
