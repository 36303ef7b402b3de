//! Bulk installation: fixtures, index files and durable artifacts.
//!
//! Fixtures are seed data and are always written through. Index files and
//! persistence scans describe records that are already durable, so they are
//! installed into the index only.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use hsdb_record::{document_from_json, Record};
use hsdb_types::{RecordId, Value};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{PersistError, StorageError, StorageResult};
use crate::persistence::split_path;
use crate::storage::StorageCore;

/// Seed records for one model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixtureSet {
    pub model: String,
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
}

impl FixtureSet {
    /// Seed `records` into `model`.
    pub fn new(model: impl Into<String>, records: Vec<serde_json::Value>) -> Self {
        Self {
            model: model.into(),
            records,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FixtureFile {
    Sets(Vec<FixtureSet>),
    Wrapped { fixtures: Vec<FixtureSet> },
}

/// One line of an index file: a durable record and where it lives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexFileEntry {
    pub path: String,
    pub record: serde_json::Value,
}

/// Outcome counts of an install run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub installed: usize,
    /// Ids that were already present.
    pub skipped: usize,
    pub failed: usize,
}

impl InstallReport {
    /// Add `other`'s counts to this report.
    pub fn merge(&mut self, other: InstallReport) {
        self.installed += other.installed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    /// Records seen, whatever their outcome.
    pub fn total(&self) -> usize {
        self.installed + self.skipped + self.failed
    }
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} installed, {} skipped, {} failed",
            self.installed, self.skipped, self.failed
        )
    }
}

enum Outcome {
    Installed,
    Skipped,
}

impl StorageCore {
    pub(crate) fn install_fixtures(&self, sets: Vec<FixtureSet>) -> InstallReport {
        let mut report = InstallReport::default();
        for set in sets {
            let mut part = InstallReport::default();
            for raw in set.records {
                match self.install_fixture(&set.model, raw) {
                    Ok(Outcome::Installed) => part.installed += 1,
                    Ok(Outcome::Skipped) => part.skipped += 1,
                    Err(e) => {
                        warn!(model = %set.model, error = %e, "fixture record not installed");
                        part.failed += 1;
                    }
                }
            }
            info!(model = %set.model, %part, "fixtures installed");
            report.merge(part);
        }
        report
    }

    fn install_fixture(&self, model: &str, raw: serde_json::Value) -> StorageResult<Outcome> {
        let schema = self.index.registry().require(model)?;
        let record = Record::restore(schema, document_from_json(raw)?)?;
        if self.index.contains(&record.id()) {
            return Ok(Outcome::Skipped);
        }
        self.insert_record(record, true)?;
        Ok(Outcome::Installed)
    }

    pub(crate) fn install_entries(&self, entries: Vec<IndexFileEntry>) -> InstallReport {
        let mut report = InstallReport::default();
        for entry in entries {
            match self.install_entry(&entry) {
                Ok(Outcome::Installed) => report.installed += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(path = %entry.path, error = %e, "durable record not installed");
                    report.failed += 1;
                }
            }
        }
        info!(%report, "durable records installed");
        report
    }

    fn install_entry(&self, entry: &IndexFileEntry) -> StorageResult<Outcome> {
        let invalid = |reason: String| StorageError::InvalidIndexEntry {
            path: entry.path.clone(),
            reason,
        };
        let (plural, id) = split_path(&entry.path).ok_or_else(|| invalid("malformed path".into()))?;
        let schema = self
            .index
            .registry()
            .by_plural(plural)
            .ok_or_else(|| invalid(format!("no model stored under {plural}")))?;
        let id = RecordId::parse(id).map_err(|e| invalid(e.to_string()))?;
        let mut document = document_from_json(entry.record.clone())?;
        match document.get(hsdb_schema::ID) {
            None | Some(Value::Null) => {
                document.insert(hsdb_schema::ID.to_string(), Value::String(id.to_string()));
            }
            Some(stored) if stored.as_str() != Some(id.to_string().as_str()) => {
                return Err(invalid(format!("record id {stored} does not match its path")));
            }
            Some(_) => {}
        }
        let record = Record::restore(schema, document)?;
        if self.index.contains(&record.id()) {
            return Ok(Outcome::Skipped);
        }
        self.insert_record(record, false)?;
        Ok(Outcome::Installed)
    }
}

fn fixture_error(path: &Path, reason: impl fmt::Display) -> StorageError {
    StorageError::Fixture {
        source_name: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a fixture file. `.toml` files use the `[[fixtures]]` form; anything
/// else is read as JSON, either a list of sets or `{ "fixtures": [...] }`.
pub fn read_fixture_file(path: &Path) -> StorageResult<Vec<FixtureSet>> {
    let text = fs::read_to_string(path).map_err(PersistError::from)?;
    let parsed: FixtureFile = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
        toml::from_str(&text).map_err(|e| fixture_error(path, e))?
    } else {
        serde_json::from_str(&text).map_err(|e| fixture_error(path, e))?
    };
    Ok(match parsed {
        FixtureFile::Sets(sets) | FixtureFile::Wrapped { fixtures: sets } => sets,
    })
}

/// Parse a JSON index file: a list of `{ "path", "record" }` entries.
pub fn read_index_file(path: &Path) -> StorageResult<Vec<IndexFileEntry>> {
    let bytes = fs::read(path).map_err(PersistError::from)?;
    serde_json::from_slice(&bytes).map_err(|e| fixture_error(path, e))
}

/// Write `entries` to `path` as pretty JSON, atomically.
pub fn write_index_file(path: &Path, entries: &[IndexFileEntry]) -> StorageResult<()> {
    let body = serde_json::to_vec_pretty(entries).map_err(|e| PersistError::Serialization(e.to_string()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(PersistError::from)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(PersistError::from)?;
    tmp.write_all(&body).map_err(PersistError::from)?;
    tmp.persist(path).map_err(|e| PersistError::Io(e.error))?;
    Ok(())
}
