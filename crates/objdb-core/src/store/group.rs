//! A group: the ordered collection of tables backing one database file.

use super::table::Table;
use super::value::StoreError;
use rkyv::{Archive, Deserialize, Serialize};

/// All tables of a database file, in creation order.
///
/// Cloning a group snapshots the entire store; the session layer uses this
/// for write-transaction rollback.
#[derive(Debug, Clone, Default, Archive, Serialize, Deserialize)]
pub struct Group {
    tables: Vec<Table>,
}

impl Group {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the group has no tables at all.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table name at `index`.
    pub fn table_name(&self, index: usize) -> Result<&str, StoreError> {
        self.tables
            .get(index)
            .map(Table::name)
            .ok_or_else(|| StoreError::TableNotFound(index.to_string()))
    }

    /// Look up a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Look up a table by name, mutably.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name() == name)
    }

    /// Table at `index`.
    pub fn table_at(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    /// Position of the table with the given name.
    pub fn table_index(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name() == name)
    }

    /// Get the table with the given name, creating it empty if absent.
    pub fn get_or_add_table(&mut self, name: &str) -> &mut Table {
        let index = match self.table_index(name) {
            Some(index) => index,
            None => {
                self.tables.push(Table::new(name));
                self.tables.len() - 1
            }
        };
        &mut self.tables[index]
    }

    /// Remove the table at `index`.
    pub fn remove_table(&mut self, index: usize) -> Result<(), StoreError> {
        if index >= self.tables.len() {
            return Err(StoreError::TableNotFound(index.to_string()));
        }
        self.tables.remove(index);
        Ok(())
    }

    /// Drop every table.
    pub fn clear(&mut self) {
        self.tables.clear();
    }

    /// Iterate over all tables.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ColumnType;

    #[test]
    fn test_get_or_add_table() {
        let mut group = Group::new();
        assert!(group.get_table("class_object").is_none());

        group.get_or_add_table("class_object");
        assert_eq!(group.len(), 1);
        assert!(group.get_table("class_object").is_some());

        // Idempotent: does not create a second table.
        group.get_or_add_table("class_object");
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_remove_table_by_index() {
        let mut group = Group::new();
        group.get_or_add_table("a");
        group.get_or_add_table("b");

        let index = group.table_index("a").unwrap();
        group.remove_table(index).unwrap();

        assert!(group.get_table("a").is_none());
        assert!(group.get_table("b").is_some());
    }

    #[test]
    fn test_clone_is_a_snapshot() {
        let mut group = Group::new();
        let table = group.get_or_add_table("class_object");
        table.insert_column(0, ColumnType::Int, "value", false).unwrap();
        table.add_empty_row();

        let snapshot = group.clone();
        group.get_table_mut("class_object").unwrap().add_empty_row();

        assert_eq!(group.get_table("class_object").unwrap().size(), 2);
        assert_eq!(snapshot.get_table("class_object").unwrap().size(), 1);
    }
}
