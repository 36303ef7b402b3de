use hsdb_record::Record;

use crate::error::PersistResult;

/// Durable backend holding one artifact per record.
///
/// Artifacts are addressed by the record's storage path,
/// `{resource_name_plural}/{id}`. Implementations must guarantee that a
/// path returned by [`Persistence::create_entry`] exists, or fail.
pub trait Persistence: Send + Sync {
    /// Materialize `record` and return its artifact path.
    ///
    /// With `overwrite_path`, the artifact previously stored there is
    /// replaced.
    fn create_entry(&self, record: &Record, overwrite_path: Option<&str>) -> PersistResult<String>;

    /// Remove the artifact at `path`. Returns `true` if it existed.
    fn delete_entry(&self, path: &str) -> PersistResult<bool>;

    /// Whether an artifact is stored at `path`.
    fn exists(&self, path: &str) -> PersistResult<bool>;

    /// The stored document at `path`.
    fn read_entry(&self, path: &str) -> PersistResult<Option<serde_json::Value>>;

    /// Every stored artifact, sorted by path.
    ///
    /// An artifact that cannot be read or parsed is reported in its own
    /// entry; only a failure to enumerate the store fails the whole scan.
    fn scan(&self) -> PersistResult<Vec<ScannedArtifact>>;
}

/// One artifact found by [`Persistence::scan`].
#[derive(Debug)]
pub struct ScannedArtifact {
    pub path: String,
    pub document: PersistResult<serde_json::Value>,
}

/// Split a storage path into `(plural, id)`.
pub(crate) fn split_path(path: &str) -> Option<(&str, &str)> {
    let (plural, id) = path.split_once('/')?;
    let valid = |s: &str| {
        !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
    };
    (valid(plural) && valid(id)).then_some((plural, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plural_and_id() {
        assert_eq!(split_path("students/abc"), Some(("students", "abc")));
        assert_eq!(split_path("students"), None);
        assert_eq!(split_path("students/a/b"), None);
        assert_eq!(split_path("../etc"), None);
        assert_eq!(split_path("students/"), None);
    }
}
