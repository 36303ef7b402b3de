use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Startup configuration for [`Hsdb::open`](crate::Hsdb::open).
///
/// ```toml
/// data_dir = "var/hsdb"
/// schema_path = "schema.toml"
/// fixtures = ["seed/schools.json"]
/// load_from_disk = true
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HsdbConfig {
    /// Root of the file backend. `None` keeps artifacts in memory.
    pub data_dir: Option<PathBuf>,
    pub schema_path: Option<PathBuf>,
    /// Fixture files installed at startup, in order.
    pub fixtures: Vec<PathBuf>,
    /// Index file of already-durable records installed at startup.
    pub index_file: Option<PathBuf>,
    /// Install every artifact found under `data_dir` at startup.
    pub load_from_disk: bool,
    /// Log a summary of every executed query at `info` level.
    pub verbose_queries: bool,
}

impl Default for HsdbConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            schema_path: None,
            fixtures: Vec::new(),
            index_file: None,
            load_from_disk: true,
            verbose_queries: false,
        }
    }
}

impl HsdbConfig {
    /// Parse a TOML config document.
    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Load a TOML config file. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn from_path(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.rebase(base);
        }
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.data_dir.iter_mut().for_each(join);
        self.schema_path.iter_mut().for_each(join);
        self.index_file.iter_mut().for_each(join);
        self.fixtures.iter_mut().for_each(join);
    }

    /// Persist records as files under `dir`.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Load model definitions from `path`.
    pub fn with_schema(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    /// Also install the fixture file at `path` on open.
    pub fn with_fixture(mut self, path: impl Into<PathBuf>) -> Self {
        self.fixtures.push(path.into());
        self
    }
}
