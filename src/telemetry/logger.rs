//! # Telemetry Logger
//!
//! Appends received variable samples to JSON Lines files.
//!
//! Files are named `telemetry_<YYYYmmdd_HHMMSS>_<seq>.jsonl`, so sorting by
//! name sorts by age. A new file is started after `max_records_per_file`
//! records, and only the newest `max_files_to_keep` files are retained.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::protocol::{VariableHash, VariableSample};

const FILE_PREFIX: &str = "telemetry_";
const FILE_EXTENSION: &str = "jsonl";

/// One line of a telemetry file
#[derive(Debug, Serialize)]
struct TelemetryRecord {
    timestamp: String,
    hash: VariableHash,
    value: f32,
}

/// Rotating JSONL writer for variable samples
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    run_stamp: String,
    file_seq: u32,
    records_in_file: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
}

impl TelemetryLogger {
    /// Create a logger writing into `config.log_dir`
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        Self::with_limits(&config.log_dir, config.max_records_per_file, config.max_files_to_keep)
    }

    pub fn with_limits<P: AsRef<Path>>(
        dir: P,
        max_records_per_file: usize,
        max_files_to_keep: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("Recording telemetry to {}", dir.display());

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            run_stamp: Local::now().format("%Y%m%d_%H%M%S").to_string(),
            file_seq: 0,
            records_in_file: 0,
            writer: None,
            current_path: None,
        })
    }

    /// Append one sample, timestamped now
    pub fn record(&mut self, sample: &VariableSample) -> Result<()> {
        self.record_at(sample, Utc::now())
    }

    /// Append one sample with an explicit timestamp
    pub fn record_at(&mut self, sample: &VariableSample, timestamp: DateTime<Utc>) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let record = TelemetryRecord {
            timestamp: timestamp.to_rfc3339(),
            hash: sample.hash,
            value: sample.value,
        };

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, &record)?;
            writer.write_all(b"\n")?;
            self.records_in_file += 1;
        }
        Ok(())
    }

    /// Flush buffered records to disk
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// File currently being written, if any record has been logged
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        self.file_seq += 1;
        let name = format!("{}{}_{:04}.{}", FILE_PREFIX, self.run_stamp, self.file_seq, FILE_EXTENSION);
        let path = self.dir.join(name);

        let file = File::create(&path)?;
        debug!("Opened telemetry file {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune();
        Ok(())
    }

    /// Delete the oldest telemetry files beyond the retention limit
    fn prune(&self) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", self.dir.display(), e);
                return;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_telemetry_file(path))
            .collect();

        if files.len() <= self.max_files_to_keep {
            return;
        }

        files.sort_by_cached_key(|path| file_order(path));
        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed old telemetry file {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for TelemetryLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush telemetry on close: {}", e);
        }
    }
}

/// Sort key for telemetry files: run stamp, then numeric sequence
///
/// The sequence is compared as a number so a run past 9999 files still
/// prunes its oldest file first.
fn file_order(path: &Path) -> (String, u64) {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    match stem.rsplit_once('_') {
        Some((run, seq)) => (run.to_string(), seq.parse().unwrap_or(0)),
        None => (stem.to_string(), 0),
    }
}

fn is_telemetry_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(FILE_PREFIX));
    let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION);
    name_ok && ext_ok
}
