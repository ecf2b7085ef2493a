use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::column::Column;
use crate::error::{Result, StoreError};
use crate::table::Table;

/// Named collection of tables.
///
/// Tables are handed out as [Arc] so callers can keep working with a table
/// after releasing the schema lock. Dropping a table only unregisters it;
/// outstanding handles stay usable.
#[derive(Debug, Default)]
pub struct Schema {
    name: String,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Schema {
    /// Creates a new, empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a new table in the schema.
    ///
    /// # Errors
    /// Returns an error if a table with the same name already exists or the
    /// column list is invalid.
    pub fn create_table(&self, name: &str, columns: Vec<Column>) -> Result<Arc<Table>> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(StoreError::TableAlreadyExists(name.to_string()));
        }
        let table = Arc::new(Table::new(name, columns)?);
        tables.insert(name.to_string(), Arc::clone(&table));
        debug!(schema = %self.name, table = name, "created table");
        Ok(table)
    }

    /// Removes a table from the schema by its name.
    ///
    /// # Errors
    /// Returns an error if the table does not exist.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        match self.tables.write().remove(name) {
            Some(_) => {
                debug!(schema = %self.name, table = name, "dropped table");
                Ok(())
            }
            None => Err(StoreError::TableNotFound(name.to_string())),
        }
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().get(name).cloned()
    }

    /// Like [Schema::get_table], but a missing table is an error.
    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.get_table(name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn table_count(&self) -> usize {
        self.tables.read().len()
    }
}
