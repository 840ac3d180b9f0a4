use std::collections::BTreeMap;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::compare_markers;
use crate::error::MirrorError;
use crate::store::write_bytes_atomic;

/// Last-synchronized marker per dataset id.
///
/// Keys are kept sorted so that two saves of the same mapping are
/// byte-identical on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<String, String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self, dataset_id: &str) -> Option<&str> {
        self.entries.get(dataset_id).map(String::as_str)
    }

    /// True when a fetch is warranted: no marker recorded yet, or the
    /// candidate marker is strictly newer than the recorded one.
    pub fn is_stale(&self, dataset_id: &str, candidate: &str) -> bool {
        match self.marker(dataset_id) {
            Some(recorded) => compare_markers(recorded, candidate).is_lt(),
            None => true,
        }
    }

    pub fn record(&mut self, dataset_id: impl Into<String>, marker: impl Into<String>) {
        self.entries.insert(dataset_id.into(), marker.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(id, marker)| (id.as_str(), marker.as_str()))
    }
}

impl FromIterator<(String, String)> for Ledger {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// JSON file backing a [`Ledger`].
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: Utf8PathBuf,
}

impl LedgerStore {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the persisted ledger. A missing file is a first run and yields
    /// an empty ledger; anything present but unreadable is `CorruptState`.
    pub fn load(&self) -> Result<Ledger, MirrorError> {
        let content = match fs::read_to_string(self.path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Ledger::new()),
            Err(err) => {
                return Err(MirrorError::CorruptState {
                    path: self.path.clone(),
                    message: err.to_string(),
                });
            }
        };
        serde_json::from_str(&content).map_err(|err| MirrorError::CorruptState {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    pub fn save(&self, ledger: &Ledger) -> Result<(), MirrorError> {
        let mut content = serde_json::to_vec_pretty(ledger)
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        content.push(b'\n');
        write_bytes_atomic(&self.path, &content)
    }
}
