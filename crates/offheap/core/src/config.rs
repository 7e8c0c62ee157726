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

// Table configuration and JSON loading

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OffheapResult, invalid_config};
use crate::key::KeyType;

/// Which shared object header a table stores in front of each payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableVariant {
    /// Status-tracked header with an exclusive read/write gate
    Heavy,
    /// Bare atomic accessor count
    Light,
}

impl fmt::Display for TableVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableVariant::Heavy => write!(f, "heavy"),
            TableVariant::Light => write!(f, "light"),
        }
    }
}

/// What a light table does when the last handle on an entry is released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleasePolicy {
    /// Keep idle entries cached for future lookups
    #[default]
    Cache,
    /// Remove the entry and recycle its slot as soon as it becomes idle
    Eager,
}

/// Construction parameters of one object table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Table name, unique within a driver
    pub name: String,
    /// Payload size of each object in bytes
    pub object_size: usize,
    /// Maximum number of live objects, `None` for unbounded
    pub objects_limit: Option<usize>,
    /// Number of independently locked shards
    pub shard_count: usize,
    /// Key kind stored in the table
    pub key_type: KeyType,
    /// Header variant
    pub variant: TableVariant,
    /// Idle-entry policy, heavy tables only accept `Cache`
    pub release_policy: ReleasePolicy,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            object_size: 64,
            objects_limit: None,
            shard_count: 32,
            key_type: KeyType::String,
            variant: TableVariant::Heavy,
            release_policy: ReleasePolicy::Cache,
        }
    }
}

impl TableConfig {
    /// Configuration for a heavy table
    pub fn heavy(name: impl Into<String>, object_size: usize, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            object_size,
            key_type,
            variant: TableVariant::Heavy,
            ..Self::default()
        }
    }

    /// Configuration for a light table
    pub fn light(name: impl Into<String>, object_size: usize, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            object_size,
            key_type,
            variant: TableVariant::Light,
            ..Self::default()
        }
    }

    pub fn with_objects_limit(mut self, limit: usize) -> Self {
        self.objects_limit = Some(limit);
        self
    }

    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }

    /// Check the parameters a table cannot be built from
    pub fn validate(&self) -> OffheapResult<()> {
        if self.name.is_empty() {
            return Err(invalid_config("table name must not be empty"));
        }
        if self.object_size == 0 {
            return Err(invalid_config(format!("table {}: object_size must be positive", self.name)));
        }
        if self.shard_count == 0 {
            return Err(invalid_config(format!("table {}: shard_count must be positive", self.name)));
        }
        if self.objects_limit == Some(0) {
            return Err(invalid_config(format!("table {}: objects_limit must be positive when set", self.name)));
        }
        if self.variant == TableVariant::Heavy && self.release_policy == ReleasePolicy::Eager {
            return Err(invalid_config(format!("table {}: eager release applies to light tables only", self.name)));
        }
        Ok(())
    }
}

/// A set of table definitions, usually loaded from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OffheapConfig {
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

impl OffheapConfig {
    pub fn from_json_str(json: &str) -> OffheapResult<Self> {
        let config: OffheapConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> OffheapResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validate every table and reject duplicate names
    pub fn validate(&self) -> OffheapResult<()> {
        let mut names = HashSet::new();
        for table in &self.tables {
            table.validate()?;
            if !names.insert(table.name.as_str()) {
                return Err(invalid_config(format!("duplicate table name {}", table.name)));
            }
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|table| table.name == name)
    }
}
