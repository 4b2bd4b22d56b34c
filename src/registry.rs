//! Table registry
//!
//! Maps table names to their type-erased definitions. The registry is built
//! explicitly by [`build_registry`] and owned by the caller; nothing here is
//! a global.

use crate::error::{Error, Result};
use crate::table::TableSpec;
use crate::tables;
use std::collections::HashMap;
use std::sync::Arc;

/// All tables the plugin serves, keyed by table name
pub struct Registry {
    tables: HashMap<&'static str, Arc<dyn TableSpec>>,
}

/// Build the registry with every table definition registered
pub fn build_registry() -> Registry {
    let mut registry = Registry {
        tables: HashMap::new(),
    };
    registry.register(Arc::new(tables::iam_user::table()));
    registry.register(Arc::new(tables::ssm_maintenance_window::table()));
    registry.register(Arc::new(tables::sqs_queue::table()));
    registry
}

impl Registry {
    fn register(&mut self, table: Arc<dyn TableSpec>) {
        let name = table.name();
        let previous = self.tables.insert(name, table);
        debug_assert!(previous.is_none(), "duplicate table name: {name}");
    }

    /// Look up a table definition by name
    pub fn table(&self, name: &str) -> Result<Arc<dyn TableSpec>> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// All registered table names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tables.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
