//! Sled-backed persistence for a table group.

use super::group::Group;
use super::value::StoreError;
use sled::Tree;
use std::path::Path;

/// Tree holding the serialized group.
const GROUP_TREE: &str = "objdb:group";

/// Key under which the group is stored.
const GROUP_KEY: &[u8] = b"group";

/// On-disk store: one sled database holding the rkyv-encoded group.
pub struct FileStore {
    db: sled::Db,
    tree: Tree,
}

impl FileStore {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::Config::new().path(path.as_ref()).open()?;
        let tree = db.open_tree(GROUP_TREE)?;
        Ok(Self { db, tree })
    }

    /// Load the persisted group, if one was ever saved.
    pub fn load(&self) -> Result<Option<Group>, StoreError> {
        match self.tree.get(GROUP_KEY)? {
            Some(bytes) => {
                let group = rkyv::from_bytes::<Group, rkyv::rancor::Error>(&bytes)
                    .map_err(|e| StoreError::Deserialization(e.to_string()))?;
                Ok(Some(group))
            }
            None => Ok(None),
        }
    }

    /// Persist the group, replacing any previous snapshot.
    pub fn save(&self, group: &Group) -> Result<(), StoreError> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(group)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.tree.insert(GROUP_KEY, bytes.as_slice())?;
        self.db.flush()?;
        Ok(())
    }
}
