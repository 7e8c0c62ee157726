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

//! Offheap CLI Tool
//!
//! Inspects table configurations, drives concurrent load against object
//! tables and exercises chunk-mask merging from the command line.

use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use offheap_core::{
    ChunkMask, HeavyHeader, KeyType, LightHeader, LivenessGate, OffheapConfig, OffheapDriver, ObjectTable, TableConfig, TableKey, TableSnapshot,
    TableVariant,
};
use rand::Rng;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "offheapctl")]
#[command(about = "Offheap - object table inspection and load CLI")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every table of a configuration file and print its registry entry
    Tables {
        /// JSON configuration file
        #[arg(long, short = 'c')]
        config: PathBuf,
    },
    /// Run a mixed get/create/delete workload against one table
    Stress {
        /// JSON configuration file
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Table name within the configuration
        #[arg(long, short = 't')]
        table: String,
        /// Worker threads
        #[arg(long, default_value_t = 4)]
        threads: usize,
        /// Operations per worker
        #[arg(long, default_value_t = 100_000)]
        ops: usize,
        /// Size of the key space
        #[arg(long, default_value_t = 10_000)]
        keys: u64,
    },
    /// Merge byte ranges into a chunk mask and print the resulting intervals
    Mask {
        /// Inclusive range as OFFSET:END, repeatable
        #[arg(long = "range", short = 'r', value_parser = parse_range, required = true)]
        ranges: Vec<(i64, i64)>,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Tables { config } => handle_tables(&config),
        Commands::Stress {
            config,
            table,
            threads,
            ops,
            keys,
        } => handle_stress(&config, &table, StressArgs { threads, ops, keys }),
        Commands::Mask { ranges } => handle_mask(&ranges),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

fn load_config(path: &Path) -> anyhow::Result<OffheapConfig> {
    OffheapConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn handle_tables(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let driver = OffheapDriver::new();

    for table in &config.tables {
        // Building the table checks that its key type and variant are usable.
        match table.variant {
            TableVariant::Heavy => with_key_type::<HeavyHeader>(&driver, table)?,
            TableVariant::Light => with_key_type::<LightHeader>(&driver, table)?,
        }
    }

    let tables = driver.tables();
    println!("{}", serde_json::to_string_pretty(&tables)?);
    info!("Listed {} tables from {}", tables.len(), path.display());
    Ok(())
}

fn with_key_type<G: LivenessGate>(driver: &OffheapDriver, config: &TableConfig) -> anyhow::Result<()> {
    match config.key_type {
        KeyType::String => drop(driver.create_table::<String, G>(config)?),
        KeyType::Int32 => drop(driver.create_table::<i32, G>(config)?),
        KeyType::Int64 => drop(driver.create_table::<i64, G>(config)?),
        KeyType::Uint64 => drop(driver.create_table::<u64, G>(config)?),
        KeyType::Bytes(12) => drop(driver.create_table::<[u8; 12], G>(config)?),
        KeyType::Bytes(64) => drop(driver.create_table::<[u8; 64], G>(config)?),
        KeyType::Bytes(68) => drop(driver.create_table::<[u8; 68], G>(config)?),
        KeyType::Bytes(len) => bail!("table {}: no key type for {len}-byte keys", config.name),
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct StressArgs {
    threads: usize,
    ops: usize,
    keys: u64,
}

fn handle_stress(path: &Path, name: &str, args: StressArgs) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let table = config.table(name).ok_or_else(|| anyhow!("no table named {name} in {}", path.display()))?;
    if args.threads == 0 || args.keys == 0 {
        bail!("threads and keys must be positive");
    }

    let snapshot = match table.variant {
        TableVariant::Heavy => stress_key_type::<HeavyHeader>(table, args)?,
        TableVariant::Light => stress_key_type::<LightHeader>(table, args)?,
    };

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    info!(
        "Stressed table {} with {} threads x {} ops, hit ratio {:.3}",
        name, args.threads, args.ops, snapshot.hit_ratio
    );
    Ok(())
}

fn stress_key_type<G: LivenessGate>(config: &TableConfig, args: StressArgs) -> anyhow::Result<TableSnapshot> {
    match config.key_type {
        KeyType::String => run_stress::<String, G>(config, args),
        KeyType::Int32 => run_stress::<i32, G>(config, args),
        KeyType::Int64 => run_stress::<i64, G>(config, args),
        KeyType::Uint64 => run_stress::<u64, G>(config, args),
        KeyType::Bytes(12) => run_stress::<[u8; 12], G>(config, args),
        KeyType::Bytes(64) => run_stress::<[u8; 64], G>(config, args),
        KeyType::Bytes(68) => run_stress::<[u8; 68], G>(config, args),
        KeyType::Bytes(len) => bail!("table {}: no key type for {len}-byte keys", config.name),
    }
}

/// Keys derived from a position in the stress key space
trait KeyGen: TableKey {
    fn from_index(index: u64) -> Self;
}

impl KeyGen for String {
    fn from_index(index: u64) -> Self {
        format!("key-{index}")
    }
}

impl KeyGen for i32 {
    fn from_index(index: u64) -> Self {
        // Alternate signs so negative keys are exercised too
        let value = (index / 2) as i32;
        if index % 2 == 0 { value } else { -value - 1 }
    }
}

impl KeyGen for i64 {
    fn from_index(index: u64) -> Self {
        let value = (index / 2) as i64;
        if index % 2 == 0 { value } else { -value - 1 }
    }
}

impl KeyGen for u64 {
    fn from_index(index: u64) -> Self {
        index
    }
}

impl<const N: usize> KeyGen for [u8; N]
where
    [u8; N]: TableKey,
{
    fn from_index(index: u64) -> Self {
        let mut key = [0u8; N];
        for (dst, src) in key.iter_mut().zip(index.to_le_bytes()) {
            *dst = src;
        }
        key
    }
}

fn run_stress<K: KeyGen, G: LivenessGate>(config: &TableConfig, args: StressArgs) -> anyhow::Result<TableSnapshot> {
    let table: ObjectTable<K, G> = OffheapDriver::new().create_table(config)?;
    let object_size = table.object_size();
    let table = table.with_prepare_new_object(move |_, payload| payload[..object_size.min(8)].fill(0));

    thread::scope(|scope| {
        let workers: Vec<_> = (0..args.threads).map(|_| scope.spawn(|| stress_worker(&table, args))).collect();
        workers
            .into_iter()
            .try_for_each(|worker| worker.join().map_err(|_| anyhow!("stress worker panicked"))?)
    })?;

    Ok(table.stats())
}

/// One worker's share of the load: mostly get-or-create, some lookups and deletes
fn stress_worker<K: KeyGen, G: LivenessGate>(table: &ObjectTable<K, G>, args: StressArgs) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    for _ in 0..args.ops {
        let key = K::from_index(rng.gen_range(0..args.keys));
        match rng.gen_range(0..10) {
            0..=6 => {
                let (handle, _) = table.must_get_object(&key)?;
                handle.release()?;
            }
            7 | 8 => {
                if let Some(handle) = table.try_get_object(&key)? {
                    handle.release()?;
                }
            }
            _ => {
                table.delete_object(&key)?;
            }
        }
    }
    Ok(())
}

fn handle_mask(ranges: &[(i64, i64)]) -> anyhow::Result<()> {
    let mut mask = ChunkMask::new();
    for &(offset, end) in ranges {
        mask.try_merge(offset, end)?;
    }

    println!("{}", serde_json::to_string_pretty(mask.entries())?);
    info!("Merged {} ranges into {} intervals", ranges.len(), mask.len());
    Ok(())
}

fn parse_range(value: &str) -> Result<(i64, i64), String> {
    let (offset, end) = value.split_once(':').ok_or_else(|| format!("expected OFFSET:END, got {value}"))?;
    let offset: i64 = offset.trim().parse().map_err(|e| format!("bad offset {offset}: {e}"))?;
    let end: i64 = end.trim().parse().map_err(|e| format!("bad end {end}: {e}"))?;
    if end < offset {
        return Err(format!("range end {end} is before offset {offset}"));
    }
    Ok((offset, end))
}
