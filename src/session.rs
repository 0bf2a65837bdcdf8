//! Working session over one folder of CSV files.
//!
//! A [`Session`] owns the loaded datasets, the column registry derived from
//! them, and the set of datasets modified since the last save. Every mutation
//! goes through `&mut Session`, so the registry and its datasets always change
//! together.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::{
    dataset::{Dataset, LoadOptions},
    error::{Result, StewardError},
    io_utils,
    registry::{ColumnRegistry, DatasetSet},
};

#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub file: String,
    pub message: String,
}

#[derive(Debug)]
pub struct SaveFailure {
    pub dataset: String,
    pub error: StewardError,
}

#[derive(Debug, Default)]
pub struct SaveOutcome {
    pub saved: Vec<String>,
    pub failures: Vec<SaveFailure>,
}

impl SaveOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct Session {
    folder: PathBuf,
    options: LoadOptions,
    datasets: DatasetSet,
    registry: ColumnRegistry,
    modified: BTreeSet<String>,
    load_failures: Vec<LoadFailure>,
}

impl Session {
    /// Loads every `.csv` file of `folder`. Files that fail to parse are
    /// recorded in [`Session::load_failures`] and skipped.
    pub fn open(folder: &Path, options: LoadOptions) -> Result<Self> {
        if !folder.is_dir() {
            return Err(StewardError::FolderNotFound {
                path: folder.to_path_buf(),
            });
        }
        let names = io_utils::list_csv_files(folder)
            .map_err(|err| StewardError::io(folder, std::io::Error::other(format!("{err:#}"))))?;
        let mut datasets = DatasetSet::new();
        let mut load_failures = Vec::new();
        for name in names {
            let path = folder.join(&name);
            match Dataset::load(&path, &options) {
                Ok(dataset) => {
                    info!(
                        "Loaded {name} ({} columns, {} rows)",
                        dataset.column_count(),
                        dataset.row_count()
                    );
                    datasets.insert(name, dataset);
                }
                Err(err) => {
                    warn!("Skipping {name}: {err}");
                    load_failures.push(LoadFailure {
                        file: name,
                        message: err.to_string(),
                    });
                }
            }
        }
        let mut session = Session::from_datasets(folder, options, datasets);
        session.load_failures = load_failures;
        Ok(session)
    }

    pub fn from_datasets(folder: &Path, options: LoadOptions, datasets: DatasetSet) -> Self {
        let registry = ColumnRegistry::build(datasets.values());
        Self {
            folder: folder.to_path_buf(),
            options,
            datasets,
            registry,
            modified: BTreeSet::new(),
            load_failures: Vec::new(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    pub fn datasets(&self) -> &DatasetSet {
        &self.datasets
    }

    pub fn dataset(&self, id: &str) -> Option<&Dataset> {
        self.datasets.get(id)
    }

    pub fn load_failures(&self) -> &[LoadFailure] {
        &self.load_failures
    }

    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    pub fn modified_datasets(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    pub fn total_rows(&self) -> usize {
        self.datasets.values().map(Dataset::row_count).sum()
    }

    pub fn total_columns(&self) -> usize {
        self.datasets.values().map(Dataset::column_count).sum()
    }

    pub fn rename(&mut self, old: &str, new: &str) -> Result<Vec<String>> {
        let touched = self.registry.rename(&mut self.datasets, old, new)?;
        self.modified.extend(touched.iter().cloned());
        Ok(touched)
    }

    pub fn delete(&mut self, column: &str) -> Result<Vec<String>> {
        let touched = self.registry.delete(&mut self.datasets, column)?;
        self.modified.extend(touched.iter().cloned());
        Ok(touched)
    }

    /// Adds a dataset to the working set, replacing any dataset with the same id.
    pub fn insert_dataset(&mut self, dataset: Dataset) -> Option<Dataset> {
        let previous = self.datasets.remove(dataset.id());
        if let Some(previous) = &previous {
            self.registry.drop_dataset(previous);
        }
        self.registry.add_dataset(&dataset);
        self.modified.insert(dataset.id().to_string());
        self.datasets.insert(dataset.id().to_string(), dataset);
        previous
    }

    /// Removes a dataset from the working set. The file on disk is untouched.
    pub fn drop_dataset(&mut self, id: &str) -> Result<Dataset> {
        let dataset = self
            .datasets
            .remove(id)
            .ok_or_else(|| StewardError::DatasetNotFound {
                dataset: id.to_string(),
            })?;
        self.registry.drop_dataset(&dataset);
        self.modified.remove(id);
        Ok(dataset)
    }

    /// Writes every modified dataset back to its source file. Failures are
    /// collected per file; the remaining files are still written.
    pub fn save(&mut self) -> SaveOutcome {
        let mut outcome = SaveOutcome::default();
        let pending = self.modified.iter().cloned().collect::<Vec<_>>();
        for id in pending {
            let Some(dataset) = self.datasets.get(&id) else {
                self.modified.remove(&id);
                continue;
            };
            let path = self.folder.join(&id);
            let delimiter = io_utils::resolve_input_delimiter(&path, self.options.delimiter);
            match dataset.save(&path, delimiter, self.options.encoding) {
                Ok(()) => {
                    self.modified.remove(&id);
                    outcome.saved.push(id);
                }
                Err(error) => {
                    warn!("Could not save {id}: {error}");
                    outcome.failures.push(SaveFailure { dataset: id, error });
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let a = Dataset::from_str_columns("a.csv", &[("id", &["1"]), ("q", &["2"])]).unwrap();
        let b = Dataset::from_str_columns("b.csv", &[("id", &["3"])]).unwrap();
        let datasets = [a, b]
            .into_iter()
            .map(|ds| (ds.id().to_string(), ds))
            .collect();
        Session::from_datasets(Path::new("."), LoadOptions::default(), datasets)
    }

    #[test]
    fn mutations_mark_datasets_modified() {
        let mut s = session();
        assert!(!s.is_modified());
        s.delete("q").unwrap();
        assert_eq!(s.modified_datasets().collect::<Vec<_>>(), vec!["a.csv"]);
    }

    #[test]
    fn failed_rename_leaves_session_clean() {
        let mut s = session();
        assert!(s.rename("id", "q").is_err());
        assert!(!s.is_modified());
        assert!(s.dataset("a.csv").unwrap().has_column("id"));
    }

    #[test]
    fn insert_and_drop_keep_registry_in_sync() {
        let mut s = session();
        let c = Dataset::from_str_columns("c.csv", &[("q", &["9"])]).unwrap();
        assert!(s.insert_dataset(c).is_none());
        assert!(s.registry().is_repeated("q"));
        s.drop_dataset("a.csv").unwrap();
        assert_eq!(s.registry(), &ColumnRegistry::build(s.datasets().values()));
        assert!(matches!(
            s.drop_dataset("nope.csv"),
            Err(StewardError::DatasetNotFound { .. })
        ));
    }
}
