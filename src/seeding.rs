//! Seeding lists: the placings of a previous tournament, reused to order the next one.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use tracing::{debug, instrument};

/// Persistence of seeding and placings lists, keyed by course and move budget.
pub trait SeedingStore {
    /// Placings stored for `course` under the move budget `timeout`, if any.
    fn get_seeding(&self, course: &str, timeout: Duration) -> anyhow::Result<Option<Vec<String>>>;

    /// Store `placings` for `course` under the move budget `timeout`.
    fn put_result(
        &self,
        placings: &[String],
        course: &str,
        timeout: Duration,
    ) -> anyhow::Result<()>;
}

/// A [`SeedingStore`] keeping one JSON array per key in a local directory.
///
/// Files are named `cse<course>_<seconds>sec.json`. The budget is keyed in whole seconds, so
/// budgets within the same second share a list: 300 ms and 500 ms both use `cse<course>_0sec.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Store in `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the lists.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, course: &str, timeout: Duration) -> PathBuf {
        self.dir.join(format!("cse{course}_{}sec.json", timeout.as_secs()))
    }
}

impl SeedingStore for JsonFileStore {
    #[instrument(skip(self))]
    fn get_seeding(&self, course: &str, timeout: Duration) -> anyhow::Result<Option<Vec<String>>> {
        let path = self.path(course, timeout);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no seeding at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e).with_context(|| format!("could not read {}", path.display())),
        };
        let list = serde_json::from_str(&json)
            .with_context(|| format!("invalid seeding list in {}", path.display()))?;
        Ok(Some(list))
    }

    #[instrument(skip(self, placings))]
    fn put_result(
        &self,
        placings: &[String],
        course: &str,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("could not create {}", self.dir.display()))?;
        let path = self.path(course, timeout);
        let json = serde_json::to_string_pretty(placings).context("Failed to serialize placings")?;
        fs::write(&path, json).with_context(|| format!("could not write {}", path.display()))?;
        debug!(entrants = placings.len(), "placings stored at {}", path.display());
        Ok(())
    }
}

/// Reorder `entrants` so that ids found in `seeding` come first, in seeding order, followed by
/// the others in their original order. Seeding ids that are not entrants are ignored.
pub fn seed_order<T>(mut entrants: Vec<(String, T)>, seeding: &[String]) -> Vec<(String, T)> {
    let mut ordered = Vec::with_capacity(entrants.len());
    for id in seeding {
        if let Some(pos) = entrants.iter().position(|(name, _)| name == id) {
            ordered.push(entrants.remove(pos));
        }
    }
    ordered.append(&mut entrants);
    ordered
}
