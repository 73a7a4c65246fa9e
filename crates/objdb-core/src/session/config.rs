//! Session configuration.

use super::session::MigrationFunction;
use crate::error::Error;
use crate::schema::Schema;
use std::path::PathBuf;

/// How `update_schema` treats a file already initialized with a different
/// schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    /// If the schema version has increased, apply all changes and run the
    /// migration callback. If the version is unchanged, only new tables and
    /// index toggles are allowed. Tables missing from the target schema are
    /// left alone, so different processes can share a file with different
    /// class subsets.
    Automatic,

    /// Never mutate the store. The schema version must match the file, and
    /// every table present in the file must match the target exactly,
    /// except for indexes. Tables may be missing from the file.
    ReadOnly,

    /// If the only changes are new tables and index toggles, apply them in
    /// place. Otherwise delete everything and recreate the file from
    /// scratch. The migration callback is not used.
    ResetFile,

    /// Only new tables, new columns, and index toggles are allowed; extra
    /// tables in the file are ignored. Indexes are only updated when the
    /// supplied version is greater than the stored one, and the supplied
    /// version may be lower without error (the stored version never
    /// decreases). The migration callback is not used.
    Additive,

    /// Verify that the version increased, run the migration callback, and
    /// verify the schema matches afterwards. Not yet implemented.
    Manual,
}

/// Options for opening a session.
#[derive(Clone)]
pub struct Config {
    /// Path of the database file.
    pub path: PathBuf,
    /// User-supplied encryption key; must be exactly 64 bytes when present.
    pub encryption_key: Option<Vec<u8>>,
    /// Keep the store purely in memory; nothing is persisted.
    pub in_memory: bool,
    /// Policy for applying schema changes.
    pub schema_mode: SchemaMode,
    /// Schema to apply when the session is first opened.
    pub schema: Option<Schema>,
    /// Version accompanying `schema`.
    pub schema_version: u64,
    /// Migration callback used by `update_schema` when none is passed.
    pub migration_function: Option<MigrationFunction>,
    /// Whether the session is shared through the per-path cache.
    pub cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            encryption_key: None,
            in_memory: false,
            schema_mode: SchemaMode::Automatic,
            schema: None,
            schema_version: 0,
            migration_function: None,
            cache: true,
        }
    }
}

impl Config {
    /// Configuration for a file-backed session at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Configuration for an in-memory session.
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            cache: false,
            ..Default::default()
        }
    }

    /// Set the schema and version applied on open.
    pub fn with_schema(mut self, schema: Schema, version: u64) -> Self {
        self.schema = Some(schema);
        self.schema_version = version;
        self
    }

    /// Set the schema mode.
    pub fn with_schema_mode(mut self, mode: SchemaMode) -> Self {
        self.schema_mode = mode;
        self
    }

    /// Set the encryption key.
    pub fn with_encryption_key(mut self, key: Vec<u8>) -> Self {
        self.encryption_key = Some(key);
        self
    }

    /// Set the default migration callback.
    pub fn with_migration_function(mut self, f: MigrationFunction) -> Self {
        self.migration_function = Some(f);
        self
    }

    /// Bypass the per-path session cache.
    pub fn without_cache(mut self) -> Self {
        self.cache = false;
        self
    }

    /// Whether this configuration opens the file read-only.
    pub fn read_only(&self) -> bool {
        self.schema_mode == SchemaMode::ReadOnly
    }

    /// Check option coherence before opening.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if let Some(key) = &self.encryption_key {
            if key.len() != 64 {
                return Err(Error::InvalidEncryptionKey);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("in_memory", &self.in_memory)
            .field("schema_mode", &self.schema_mode)
            .field("schema_version", &self.schema_version)
            .field("has_schema", &self.schema.is_some())
            .field("has_migration_function", &self.migration_function.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("/tmp/db");
        assert_eq!(config.schema_mode, SchemaMode::Automatic);
        assert!(config.cache);
        assert!(!config.in_memory);
        assert!(!config.read_only());
    }

    #[test]
    fn test_encryption_key_length() {
        let config = Config::new("/tmp/db").with_encryption_key(vec![0; 63]);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidEncryptionKey)
        ));

        let config = Config::new("/tmp/db").with_encryption_key(vec![0; 64]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_read_only_helper() {
        let config = Config::new("/tmp/db").with_schema_mode(SchemaMode::ReadOnly);
        assert!(config.read_only());
    }
}
