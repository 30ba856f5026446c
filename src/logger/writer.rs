//! Blocking log sink: format encoders, rotation, and export.
//!
//! Every function here does synchronous file I/O and is called from
//! `spawn_blocking` by the logger.
//!
//! | Format | Flush strategy |
//! |--------|----------------|
//! | `jsonl` | Append one object per line |
//! | `json` | Rewrite the array through a temp file, then rename |
//! | `csv` | Append rows; header only when the file is empty |

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result};
use crate::events::Event;

// ============================================================================
// Constants
// ============================================================================

/// Fixed leading CSV columns.
pub const CSV_BASE_COLUMNS: [&str; 4] = ["event_type", "timestamp", "page_url", "session_id"];

// ============================================================================
// LogWriter
// ============================================================================

/// File sink for one output path.
#[derive(Debug, Clone)]
pub(crate) struct LogWriter {
    path: PathBuf,
    format: LogFormat,
    rotate_logs: bool,
    max_file_size: u64,
}

impl LogWriter {
    pub(crate) fn new(config: &LoggingConfig) -> Self {
        Self {
            path: config.output_path.clone(),
            format: config.format,
            rotate_logs: config.rotate_logs,
            max_file_size: config.max_file_size,
        }
    }

    #[inline]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Creates parent directories and the log file if missing.
    pub(crate) fn open(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }

    /// Writes one batch, rotating first when the batch would push the file
    /// past `max_file_size`.
    pub(crate) fn write_batch(&self, events: &[Arc<Event>]) -> Result<()> {
        let records = events
            .iter()
            .map(|event| serde_json::to_value(event.as_ref()))
            .collect::<std::result::Result<Vec<Value>, _>>()?;

        if self.rotate_logs && self.needs_rotation(&records) {
            self.rotate();
        }

        match self.format {
            LogFormat::Jsonl => append_jsonl(&self.path, &records),
            LogFormat::Json => rewrite_json(&self.path, records),
            LogFormat::Csv => append_csv(&self.path, &records),
        }
    }

    fn needs_rotation(&self, records: &[Value]) -> bool {
        let current = fs::metadata(&self.path).map_or(0, |m| m.len());
        if current >= self.max_file_size {
            return true;
        }

        let pending: u64 = records
            .iter()
            .map(|record| record.to_string().len() as u64 + 1)
            .sum();
        current + pending >= self.max_file_size
    }

    /// Renames the live file to `{stem}.{unix_seconds}{suffix}`.
    ///
    /// Skipped when the rotated name is taken or the rename fails; the
    /// batch is then appended to the live file.
    fn rotate(&self) -> bool {
        if !self.path.exists() {
            return false;
        }

        let rotated = rotated_path(&self.path, unix_seconds());
        if rotated.exists() {
            warn!(path = %rotated.display(), "Rotated log already exists, skipping rotation");
            return false;
        }

        match fs::rename(&self.path, &rotated) {
            Ok(()) => {
                debug!(from = %self.path.display(), to = %rotated.display(), "Rotated log file");
                true
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Log rotation failed");
                false
            }
        }
    }
}

// ============================================================================
// Encoders
// ============================================================================

fn append_jsonl(path: &Path, records: &[Value]) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut out = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn rewrite_json(path: &Path, records: Vec<Value>) -> Result<()> {
    let mut all = read_json_array(path)?;
    all.extend(records);
    write_json_atomic(path, &all)
}

fn append_csv(path: &Path, records: &[Value]) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let write_header = file.metadata()?.len() == 0;
    write_csv(file, records, write_header)
}

fn write_csv(file: File, records: &[Value], write_header: bool) -> Result<()> {
    let headers = csv_headers(records);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));

    if write_header {
        writer.write_record(&headers)?;
    }

    let empty = Map::new();
    for record in records {
        let metadata = record
            .get("metadata")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let row = headers.iter().enumerate().map(|(index, column)| {
            let value = if index < CSV_BASE_COLUMNS.len() {
                record.get(column.as_str())
            } else {
                metadata.get(column.as_str())
            };
            csv_cell(value)
        });
        writer.write_record(row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Base columns followed by the sorted union of metadata keys.
pub(crate) fn csv_headers(records: &[Value]) -> Vec<String> {
    let metadata_keys: BTreeSet<&str> = records
        .iter()
        .filter_map(|record| record.get("metadata").and_then(Value::as_object))
        .flat_map(|metadata| metadata.keys().map(String::as_str))
        .collect();

    CSV_BASE_COLUMNS
        .iter()
        .copied()
        .chain(metadata_keys)
        .map(str::to_string)
        .collect()
}

fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// JSON helpers
// ============================================================================

fn read_json_array(path: &Path) -> Result<Vec<Value>> {
    let non_empty = fs::metadata(path).is_ok_and(|m| m.len() > 0);
    if !non_empty {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    match serde_json::from_reader::<_, Value>(reader)? {
        Value::Array(items) => Ok(items),
        other => Ok(vec![other]),
    }
}

fn write_json_atomic(path: &Path, records: &[Value]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut out, records)?;
        out.flush()?;
    }
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn read_jsonl(path: &Path) -> Result<Vec<Value>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        records.push(serde_json::from_str(line)?);
    }
    Ok(records)
}

// ============================================================================
// Export
// ============================================================================

/// Converts the log at `source` (written as `source_format`) into
/// `target_format` at `target`.
///
/// Same-format exports are byte copies. CSV logs cannot be converted.
pub(crate) fn export(
    source: &Path,
    source_format: LogFormat,
    target: &Path,
    target_format: LogFormat,
) -> Result<()> {
    if !source.exists() {
        return Err(Error::logging_format(
            format!("No log file at {}", source.display()),
            target_format.as_str(),
        ));
    }

    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    if source_format == target_format {
        fs::copy(source, target)?;
        return Ok(());
    }

    let records = match source_format {
        LogFormat::Jsonl => read_jsonl(source)?,
        LogFormat::Json => read_json_array(source)?,
        LogFormat::Csv => {
            return Err(Error::logging_format(
                "Cannot convert a csv log to another format",
                target_format.as_str(),
            ));
        }
    };

    match target_format {
        LogFormat::Jsonl => {
            let mut out = BufWriter::new(File::create(target)?);
            for record in &records {
                serde_json::to_writer(&mut out, record)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
            Ok(())
        }
        LogFormat::Json => write_json_atomic(target, &records),
        LogFormat::Csv => write_csv(File::create(target)?, &records, true),
    }
}

// ============================================================================
// Rotation helpers
// ============================================================================

pub(crate) fn rotated_path(path: &Path, seconds: u64) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{stem}.{seconds}{suffix}"))
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBase, InteractionAction, InteractionEvent, NavigationEvent, NavigationMethod};

    fn click(selector: &str, session: &str) -> Arc<Event> {
        let base = EventBase::new("https://example.com", session)
            .unwrap()
            .with_metadata("button", "left");
        Arc::new(
            InteractionEvent::new(base, InteractionAction::Click, selector)
                .unwrap()
                .into(),
        )
    }

    fn navigation() -> Arc<Event> {
        let base = EventBase::new("https://example.com", "session-1")
            .unwrap()
            .with_metadata("wait_until", "load")
            .with_metadata("timeout", 30.0);
        Arc::new(
            NavigationEvent::new(
                base,
                "https://example.com",
                "https://example.com/next",
                NavigationMethod::Navigate,
            )
            .unwrap()
            .into(),
        )
    }

    fn writer(dir: &Path, file: &str, format: LogFormat) -> LogWriter {
        let config = LoggingConfig::default()
            .with_format(format)
            .with_output_path(dir.join(file));
        LogWriter::new(&config)
    }

    #[test]
    fn test_rotated_path_naming() {
        assert_eq!(
            rotated_path(Path::new("logs/session.jsonl"), 1_700_000_000),
            PathBuf::from("logs/session.1700000000.jsonl")
        );
        assert_eq!(
            rotated_path(Path::new("events"), 42),
            PathBuf::from("events.42")
        );
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(&dir.path().join("a/b"), "log.jsonl", LogFormat::Jsonl);

        writer.open().unwrap();

        assert!(writer.path().exists());
    }

    #[test]
    fn test_jsonl_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path(), "log.jsonl", LogFormat::Jsonl);

        writer.write_batch(&[click("#a", "s1")]).unwrap();
        writer.write_batch(&[click("#b", "s1"), navigation()]).unwrap();

        let records = read_jsonl(writer.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["event_type"], "interaction");
        assert_eq!(records[0]["selector"], "#a");
        assert_eq!(records[0]["metadata"]["button"], "left");
        assert_eq!(records[2]["event_type"], "navigation");
    }

    #[test]
    fn test_json_stays_a_valid_array() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path(), "log.json", LogFormat::Json);

        writer.write_batch(&[click("#a", "s1")]).unwrap();
        writer.write_batch(&[click("#b", "s1")]).unwrap();

        let text = fs::read_to_string(writer.path()).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["selector"], "#b");
    }

    #[test]
    fn test_csv_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path(), "log.csv", LogFormat::Csv);

        writer.write_batch(&[click("#a", "s1"), navigation()]).unwrap();
        writer.write_batch(&[click("#b", "s2")]).unwrap();

        let text = fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "event_type,timestamp,page_url,session_id,button,timeout,wait_until"
        );
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("interaction,"));
        assert!(lines[1].ends_with(",s1,left,,"));
        assert!(lines[2].ends_with(",session-1,,30.0,load"));
        assert!(lines[3].ends_with(",s2,left"));
        assert_eq!(text.matches("event_type").count(), 1);
    }

    #[test]
    fn test_rotation_creates_rotated_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer(dir.path(), "log.jsonl", LogFormat::Jsonl);
        writer.max_file_size = 512;

        let batch: Vec<_> = (0..4).map(|i| click(&format!("#item-{i}"), "s1")).collect();
        writer.write_batch(&batch).unwrap();
        writer.write_batch(&batch).unwrap();

        let rotated: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "log.jsonl")
            .collect();
        assert!(!rotated.is_empty());
        assert!(rotated.iter().all(|name| name.starts_with("log.") && name.ends_with(".jsonl")));
        assert_eq!(read_jsonl(writer.path()).unwrap().len(), 4);
    }

    #[test]
    fn test_rotation_skipped_when_name_taken() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer(dir.path(), "log.jsonl", LogFormat::Jsonl);
        writer.max_file_size = 1;

        writer.write_batch(&[click("#a", "s1")]).unwrap();
        let taken = rotated_path(writer.path(), unix_seconds());
        fs::write(&taken, "keep").unwrap();
        let next = rotated_path(writer.path(), unix_seconds() + 1);
        fs::write(&next, "keep").unwrap();

        writer.write_batch(&[click("#b", "s1")]).unwrap();

        assert_eq!(fs::read_to_string(&taken).unwrap(), "keep");
        assert_eq!(fs::read_to_string(&next).unwrap(), "keep");
        assert_eq!(read_jsonl(writer.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_export_jsonl_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path(), "log.jsonl", LogFormat::Jsonl);
        writer.write_batch(&[click("#a", "alpha"), click("#b", "beta")]).unwrap();

        let target = dir.path().join("out/export.csv");
        export(writer.path(), LogFormat::Jsonl, &target, LogFormat::Csv).unwrap();

        let mut reader = csv::Reader::from_path(&target).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert!(headers.iter().any(|h| h == "event_type"));
        let session_column = headers.iter().position(|h| h == "session_id").unwrap();
        let sessions: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[session_column].to_string())
            .collect();
        assert_eq!(sessions, ["alpha", "beta"]);
    }

    #[test]
    fn test_export_same_format_is_byte_copy() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path(), "log.jsonl", LogFormat::Jsonl);
        writer.write_batch(&[click("#a", "s1")]).unwrap();

        let target = dir.path().join("copy.jsonl");
        export(writer.path(), LogFormat::Jsonl, &target, LogFormat::Jsonl).unwrap();

        assert_eq!(fs::read(writer.path()).unwrap(), fs::read(&target).unwrap());
    }

    #[test]
    fn test_export_json_source_to_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path(), "log.json", LogFormat::Json);
        writer.write_batch(&[click("#a", "s1"), navigation()]).unwrap();

        let target = dir.path().join("lines.jsonl");
        export(writer.path(), LogFormat::Json, &target, LogFormat::Jsonl).unwrap();

        let records = read_jsonl(&target).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["event_type"], "navigation");
    }

    #[test]
    fn test_export_missing_source_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.jsonl");

        let err = export(&missing, LogFormat::Jsonl, &dir.path().join("x.csv"), LogFormat::Csv)
            .unwrap_err();

        assert!(matches!(err, Error::Logging { .. }));
        assert!(err.to_string().contains("missing.jsonl"));
    }
}
