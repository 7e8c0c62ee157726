// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

// Process-wide registry of object tables

use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::config::{TableConfig, TableVariant};
use crate::error::{OffheapError, OffheapResult};
use crate::header::{HeavyHeader, LightHeader, LivenessGate};
use crate::key::{KeyType, TableKey};
use crate::table::ObjectTable;

/// What the driver remembers about a table it created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub id: i64,
    pub name: String,
    pub key_type: KeyType,
    pub variant: TableVariant,
    pub object_size: usize,
    pub objects_limit: Option<usize>,
    pub shard_count: usize,
}

/// Hands out table ids and keeps table names unique
///
/// Tables are owned by the caller; the driver only records their metadata.
#[derive(Debug, Default)]
pub struct OffheapDriver {
    max_table_id: AtomicI64,
    tables: RwLock<Vec<TableInfo>>,
}

impl OffheapDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next table id, starting at 1
    pub fn alloc_table_id(&self) -> i64 {
        self.max_table_id.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Build and register a table
    ///
    /// # Returns
    /// * `OffheapResult<ObjectTable<K, G>>` - The table, `TableExists` when the
    ///   name is taken, or any error from table construction
    pub fn create_table<K, G>(&self, config: &TableConfig) -> OffheapResult<ObjectTable<K, G>>
    where
        K: TableKey,
        G: LivenessGate,
    {
        let mut tables = self.tables.write();
        if tables.iter().any(|info| info.name == config.name) {
            return Err(OffheapError::TableExists(config.name.clone()));
        }

        let table = ObjectTable::new(config)?;
        let info = TableInfo {
            id: self.alloc_table_id(),
            name: config.name.clone(),
            key_type: config.key_type,
            variant: config.variant,
            object_size: config.object_size,
            objects_limit: config.objects_limit,
            shard_count: config.shard_count,
        };
        info!(id = info.id, table = %info.name, "table registered");
        tables.push(info);
        Ok(table)
    }

    pub fn create_heavy_table<K: TableKey>(&self, config: &TableConfig) -> OffheapResult<ObjectTable<K, HeavyHeader>> {
        self.create_table(config)
    }

    pub fn create_light_table<K: TableKey>(&self, config: &TableConfig) -> OffheapResult<ObjectTable<K, LightHeader>> {
        self.create_table(config)
    }

    /// Forget a table so its name can be reused
    pub fn unregister(&self, name: &str) -> Option<TableInfo> {
        let mut tables = self.tables.write();
        let index = tables.iter().position(|info| info.name == name)?;
        Some(tables.remove(index))
    }

    pub fn tables(&self) -> Vec<TableInfo> {
        self.tables.read().clone()
    }

    pub fn table_info(&self, id: i64) -> Option<TableInfo> {
        self.tables.read().iter().find(|info| info.id == id).cloned()
    }

    pub fn table_by_name(&self, name: &str) -> Option<TableInfo> {
        self.tables.read().iter().find(|info| info.name == name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Bytes64;

    #[test]
    fn test_alloc_table_id_is_monotonic() {
        let driver = OffheapDriver::new();
        assert_eq!(driver.alloc_table_id(), 1);
        assert_eq!(driver.alloc_table_id(), 2);
    }

    #[test]
    fn test_create_and_lookup() {
        let driver = OffheapDriver::new();
        let _files = driver.create_heavy_table::<Bytes64>(&TableConfig::heavy("files", 512, KeyType::Bytes(64))).unwrap();
        let _nodes = driver.create_light_table::<u64>(&TableConfig::light("nodes", 64, KeyType::Uint64)).unwrap();

        let tables = driver.tables();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].id, 1);
        assert_eq!(tables[1].variant, TableVariant::Light);
        assert_eq!(driver.table_by_name("files").unwrap().object_size, 512);
        assert_eq!(driver.table_info(2).unwrap().name, "nodes");
        assert!(driver.table_info(3).is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let driver = OffheapDriver::new();
        let config = TableConfig::light("dup", 8, KeyType::Int32);
        let _first = driver.create_light_table::<i32>(&config).unwrap();
        assert!(matches!(driver.create_light_table::<i32>(&config), Err(OffheapError::TableExists(_))));

        assert!(driver.unregister("dup").is_some());
        assert!(driver.create_light_table::<i32>(&config).is_ok());
    }

    #[test]
    fn test_failed_creation_not_registered() {
        let driver = OffheapDriver::new();
        let config = TableConfig::light("typed", 8, KeyType::Int32);
        assert!(driver.create_heavy_table::<i32>(&config).is_err());
        assert!(driver.tables().is_empty());
        assert_eq!(driver.alloc_table_id(), 1);
    }
}
