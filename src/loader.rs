use tracing::{info, warn};

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::{
    error::{Result, SalesError},
    readers::{default_readers, RecordReader},
    record::{self, RawRecord},
    registry::Registry,
};

/// Consolidates raw sales records from many files.
///
/// Each call to [`DataLoader::load`] appends to the records already held, so
/// loading `a` then `b` gives the same collection as loading `[a, b]`.
pub struct DataLoader {
    readers: Registry<dyn RecordReader>,
    records: Vec<RawRecord>,
    files_processed: usize,
}

/// What happened to each file in one call to [`DataLoader::load`].
#[derive(Debug, Default)]
pub struct LoadSummary {
    /// Files read successfully, with the number of records each contributed.
    pub loaded: Vec<(PathBuf, usize)>,
    /// Files that were skipped, with the reason.
    pub failed: Vec<(PathBuf, SalesError)>,
}

impl LoadSummary {
    #[must_use]
    pub fn records(&self) -> usize {
        self.loaded.iter().map(|(_, n)| n).sum()
    }
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::with_readers(default_readers())
    }
}

impl DataLoader {
    /// Creates an empty loader that understands `.csv` and `.json` files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_readers(readers: Registry<dyn RecordReader>) -> Self {
        Self {
            readers,
            records: Vec::new(),
            files_processed: 0,
        }
    }

    /// Adds (or replaces) the reader used for files ending in `.extension`.
    pub fn register_reader(&mut self, extension: &str, reader: Box<dyn RecordReader>) {
        self.readers.register(extension, reader);
    }

    /// Reads every file in `paths`, in order, appending their records.
    ///
    /// A file that cannot be read is logged and recorded in the returned
    /// summary; it never stops the remaining files from loading.
    pub fn load<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for path in paths {
            let path = path.as_ref();
            match self.read_file(path) {
                Ok(records) => {
                    info!("loaded {} records from {}", records.len(), path.display());
                    summary.loaded.push((path.to_path_buf(), records.len()));
                    self.records.extend(records);
                    self.files_processed += 1;
                }
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    summary.failed.push((path.to_path_buf(), e));
                }
            }
        }
        summary
    }

    fn read_file(&self, path: &Path) -> Result<Vec<RawRecord>> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        self.readers.get(extension)?.read(path)
    }

    #[must_use]
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of files successfully loaded so far.
    #[must_use]
    pub fn files_processed(&self) -> usize {
        self.files_processed
    }

    /// Returns the distinct normalized user ids, in the order first seen.
    #[must_use]
    pub fn user_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter_map(record::user_id)
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }
}
