//! MTD device registry.
//!
//! Parses the kernel's MTD table (normally /proc/mtd), one device per
//! line: `mtd<N>: <hex size> <hex erase size> "<name>"`. Used both to
//! locate the target flash partition and to find the mtdram scratch
//! device after the driver is loaded.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{Result, UpdateError};

/// One row of the MTD table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtdEntry {
    pub index: u32,
    /// Partition size in bytes.
    pub size: u32,
    /// Erase block size in bytes.
    pub erase_size: u32,
    pub name: String,
}

impl MtdEntry {
    /// Character device node, e.g. `/dev/mtd3`.
    pub fn char_device(&self, dev_dir: &Path) -> PathBuf {
        dev_dir.join(format!("mtd{}", self.index))
    }

    /// Block device node, e.g. `/dev/mtdblock3`.
    pub fn block_device(&self, dev_dir: &Path) -> PathBuf {
        dev_dir.join(format!("mtdblock{}", self.index))
    }
}

fn table_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^mtd(\d+):\s+([0-9a-fA-F]+)\s+([0-9a-fA-F]+)\s+"(.*)""#)
            .expect("static regex")
    })
}

/// Read and parse the MTD table. Lines that don't look like device rows
/// (the header, trailing noise) are skipped.
pub fn read_table(proc_mtd: &Path) -> Result<Vec<MtdEntry>> {
    let content = fs::read_to_string(proc_mtd)?;
    let re = table_line_re();

    let mut entries = Vec::new();
    for line in content.lines() {
        let Some(caps) = re.captures(line.trim()) else {
            continue;
        };
        let Ok(index) = caps[1].parse::<u32>() else {
            continue;
        };
        let size = u32::from_str_radix(&caps[2], 16).unwrap_or(0);
        let erase_size = u32::from_str_radix(&caps[3], 16).unwrap_or(0);
        entries.push(MtdEntry {
            index,
            size,
            erase_size,
            name: caps[4].to_string(),
        });
    }
    Ok(entries)
}

/// Find the first entry whose name contains `needle`.
pub fn find_by_name<'a>(entries: &'a [MtdEntry], needle: &str) -> Option<&'a MtdEntry> {
    entries.iter().find(|e| e.name.contains(needle))
}

/// Locate the target flash partition by name.
pub fn find_system_partition<'a>(
    entries: &'a [MtdEntry],
    name: &str,
) -> Result<&'a MtdEntry> {
    find_by_name(entries, name)
        .ok_or_else(|| UpdateError::SystemPartitionNotFound(name.to_string()))
}
