//! Sessions: one handle onto a database file, its schema, and transactions.

use super::config::{Config, SchemaMode};
use crate::error::Error;
use crate::migration::applier::{self, MigrationHook};
use crate::migration::rename;
use crate::schema::Schema;
use crate::store::{FileStore, Group, Table};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, Weak};
use tracing::instrument;

/// A session shared through the per-path cache.
pub type SharedSession = Arc<Mutex<Session>>;

/// User migration callback. Runs between the pre- and post-migration
/// phases and may rewrite row data through the [`Migration`] context.
pub type MigrationFunction = Arc<dyn Fn(&mut Migration<'_>) -> Result<(), Error> + Send + Sync>;

/// The window a migration callback operates in.
///
/// The exposed schema already has the target shape, but columns of removed
/// properties are still present underneath; this is what makes copying data
/// out of a renamed column possible.
pub struct Migration<'a> {
    group: &'a mut Group,
    old_schema: &'a Schema,
    schema: &'a mut Schema,
}

impl Migration<'_> {
    /// The schema as it was before this migration started.
    pub fn old_schema(&self) -> &Schema {
        self.old_schema
    }

    /// The new-shape schema the migration is moving to.
    pub fn schema(&self) -> &Schema {
        self.schema
    }

    /// The table backing an object type, for row-level rewrites.
    pub fn table(&mut self, object_type: &str) -> Result<&mut Table, Error> {
        Ok(applier::table_for_object_type_mut(self.group, object_type)?)
    }

    /// Rename a property, moving its column and stored values.
    pub fn rename_property(
        &mut self,
        object_type: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), Error> {
        rename::rename_property(self.group, self.schema, object_type, old_name, new_name)
    }

    /// Drop an object type's table and primary key binding.
    pub fn delete_data_for_object(&mut self, object_type: &str) -> Result<(), Error> {
        applier::delete_data_for_object(self.group, object_type)
    }
}

fn session_cache() -> &'static DashMap<PathBuf, Weak<Mutex<Session>>> {
    static CACHE: OnceLock<DashMap<PathBuf, Weak<Mutex<Session>>>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// One handle onto a database: the loaded group, the current schema and
/// version, and the write-transaction state.
pub struct Session {
    config: Config,
    file: Option<FileStore>,
    group: Group,
    snapshot: Option<Group>,
    schema: Schema,
    schema_version: u64,
}

impl Session {
    /// Open a session without going through the cache.
    pub fn open(config: Config) -> Result<Self, Error> {
        config.validate()?;

        let file = if config.in_memory {
            None
        } else {
            Some(FileStore::open(&config.path)?)
        };
        let group = match &file {
            Some(file) => file.load()?.unwrap_or_default(),
            None => Group::new(),
        };

        let schema_version = applier::get_schema_version(&group);
        let schema = applier::schema_from_group(&group)?;

        let mut session = Self {
            config,
            file,
            group,
            snapshot: None,
            schema,
            schema_version,
        };

        if let Some(target) = session.config.schema.clone() {
            let version = session.config.schema_version;
            let migration = session.config.migration_function.clone();
            session.update_schema(target, version, migration)?;
        }

        Ok(session)
    }

    /// Get a cached session for the config's path, opening one if needed.
    ///
    /// A cache hit with conflicting `in_memory` or read-only settings fails
    /// rather than handing out a mismatched handle.
    pub fn get_shared(config: Config) -> Result<SharedSession, Error> {
        config.validate()?;
        if !config.cache || config.path.as_os_str().is_empty() {
            return Ok(Arc::new(Mutex::new(Self::open(config)?)));
        }

        let path = config.path.clone();
        if let Some(entry) = session_cache().get(&path) {
            if let Some(session) = entry.value().upgrade() {
                {
                    let guard = session.lock();
                    if guard.config.in_memory != config.in_memory
                        || guard.config.read_only() != config.read_only()
                    {
                        return Err(Error::MismatchedConfig { path });
                    }
                }
                return Ok(session);
            }
        }

        let session = Arc::new(Mutex::new(Self::open(config)?));
        session_cache().insert(path, Arc::downgrade(&session));
        Ok(session)
    }

    /// Read the schema version recorded in the file named by `config`, or
    /// `NOT_VERSIONED` if the file was never initialized.
    pub fn get_schema_version(config: &Config) -> Result<u64, Error> {
        config.validate()?;
        if config.in_memory {
            return Ok(applier::NOT_VERSIONED);
        }
        let file = FileStore::open(&config.path)?;
        Ok(match file.load()? {
            Some(group) => applier::get_schema_version(&group),
            None => applier::NOT_VERSIONED,
        })
    }

    /// The session configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The current schema version; `NOT_VERSIONED` before initialization.
    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    /// The underlying table group, read-only.
    pub fn read_group(&self) -> &Group {
        &self.group
    }

    /// The table backing an object type, read-only.
    pub fn table(&self, object_type: &str) -> Option<&Table> {
        applier::table_for_object_type(&self.group, object_type)
    }

    /// The table backing an object type, for writes inside a transaction.
    pub fn table_mut(&mut self, object_type: &str) -> Result<&mut Table, Error> {
        if !self.is_in_transaction() {
            return Err(Error::NotInWriteTransaction);
        }
        Ok(applier::table_for_object_type_mut(&mut self.group, object_type)?)
    }

    /// Whether a write transaction is open.
    pub fn is_in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Begin a write transaction, snapshotting the group for rollback.
    pub fn begin_transaction(&mut self) -> Result<(), Error> {
        if self.is_in_transaction() {
            return Err(Error::AlreadyInWriteTransaction);
        }
        self.snapshot = Some(self.group.clone());
        Ok(())
    }

    /// Commit the open write transaction, persisting file-backed sessions.
    pub fn commit_transaction(&mut self) -> Result<(), Error> {
        if !self.is_in_transaction() {
            return Err(Error::NotInWriteTransaction);
        }
        if let Some(file) = &self.file {
            file.save(&self.group)?;
        }
        self.snapshot = None;
        Ok(())
    }

    /// Abort the open write transaction, restoring the snapshot.
    pub fn cancel_transaction(&mut self) -> Result<(), Error> {
        match self.snapshot.take() {
            Some(snapshot) => {
                self.group = snapshot;
                Ok(())
            }
            None => Err(Error::NotInWriteTransaction),
        }
    }

    /// Bring the session to `target` at `version` under the configured
    /// schema mode, running `migration` (or the config's callback) if an
    /// Automatic upgrade requires one.
    ///
    /// Wraps the applier in a write transaction unless the caller already
    /// opened one; on failure both the store and the in-memory schema are
    /// rolled back before the error surfaces.
    #[instrument(skip(self, target, migration), fields(version = version))]
    pub fn update_schema(
        &mut self,
        target: Schema,
        version: u64,
        migration: Option<MigrationFunction>,
    ) -> Result<(), Error> {
        target.validate()?;

        let mode = self.config.schema_mode;
        let migration = migration.or_else(|| self.config.migration_function.clone());

        let owns_transaction = !self.is_in_transaction() && mode != SchemaMode::ReadOnly;
        if owns_transaction {
            self.begin_transaction()?;
        }

        let mut hook = migration.map(|f| {
            move |group: &mut Group, old_schema: &Schema, schema: &mut Schema| {
                let mut migration = Migration {
                    group,
                    old_schema,
                    schema,
                };
                f(&mut migration)
            }
        });

        let result = applier::apply_schema_changes(
            &mut self.group,
            &mut self.schema,
            &mut self.schema_version,
            &target,
            version,
            mode,
            hook.as_mut().map(|h| h as MigrationHook<'_>),
        );

        match result {
            Ok(()) => {
                if owns_transaction {
                    self.commit_transaction()?;
                }
                Ok(())
            }
            Err(error) => {
                if owns_transaction {
                    self.cancel_transaction()?;
                }
                Err(error)
            }
        }
    }
}
