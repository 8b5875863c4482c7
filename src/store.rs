// src/store.rs
//! Append-only, deduplicated persistence of enriched tweets, one JSON file
//! per processing day. Single-writer: only the engine worker mutates
//! partitions; the HTTP layer reads.

use anyhow::{Context, Result};
use metrics::counter;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::EnrichedRecord;

pub struct RecordStore {
    data_dir: PathBuf,
}

impl RecordStore {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        let data_dir = data_dir.into();
        let _ = fs::create_dir_all(&data_dir); // best-effort
        Self { data_dir }
    }

    fn partition_path(&self, date: &str) -> PathBuf {
        self.data_dir.join(format!("tweets_{date}.json"))
    }

    /// Append one record to its day partition unless its id is already
    /// present there. Returns `Ok(false)` for a skipped duplicate. Read-side
    /// corruption is tolerated (treated as an empty partition); write
    /// failures propagate — they signal a real I/O problem.
    pub fn append(&self, record: &EnrichedRecord) -> Result<bool> {
        let path = self.partition_path(&record.processed_date);
        let mut records = read_partition_file(&path);

        if records.iter().any(|r| r.id == record.id) {
            tracing::info!(id = %record.id, author = %record.author, "skipping duplicate tweet");
            counter!("monitor_tweets_dedup_total").increment(1);
            return Ok(false);
        }

        records.push(record.clone());
        write_partition_file(&path, &records)
            .with_context(|| format!("writing partition {}", path.display()))?;
        tracing::info!(id = %record.id, author = %record.author, "saved new tweet");
        Ok(true)
    }

    /// Records for one calendar day. Missing or corrupt partitions read as
    /// empty.
    pub fn load_partition(&self, date: &str) -> Vec<EnrichedRecord> {
        read_partition_file(&self.partition_path(date))
    }

    /// The whole corpus, most recently processed first. Corrupt partition
    /// files are skipped so one bad day never hides the rest.
    pub fn load_all(&self) -> Vec<EnrichedRecord> {
        let mut all = Vec::new();
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(e) => e,
            Err(_) => return all,
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("tweets_") && name.ends_with(".json") {
                all.extend(read_partition_file(&entry.path()));
            }
        }
        // RFC3339 UTC timestamps sort correctly as strings.
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn read_partition_file(path: &Path) -> Vec<EnrichedRecord> {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!(error = ?e, path = %path.display(), "skipping corrupt partition");
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}

/// Whole-file rewrite through a temp file + rename so readers never observe
/// a half-written partition.
fn write_partition_file(path: &Path, records: &[EnrichedRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("serializing partition")?;
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(&tmp, path)?;
    Ok(())
}
