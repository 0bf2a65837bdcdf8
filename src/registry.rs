//! Column registry: which files carry which column.
//!
//! The registry is the column-membership index of a dataset set. Mutations go
//! through [`ColumnRegistry::rename`] and [`ColumnRegistry::delete`], which
//! validate every affected dataset before touching any of them, so a failed
//! mutation leaves both the datasets and the index exactly as they were.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::{
    dataset::Dataset,
    error::{Result, StewardError},
};

/// Datasets keyed by id (file name).
pub type DatasetSet = BTreeMap<String, Dataset>;

static NO_LOCATIONS: BTreeSet<String> = BTreeSet::new();

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRegistry {
    locations: BTreeMap<String, BTreeSet<String>>,
    repeated: BTreeSet<String>,
}

impl ColumnRegistry {
    pub fn build<'a, I>(datasets: I) -> Self
    where
        I: IntoIterator<Item = &'a Dataset>,
    {
        let mut registry = ColumnRegistry::default();
        for dataset in datasets {
            registry.add_dataset(dataset);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.locations.contains_key(column)
    }

    /// Files containing `column`; empty when the column is unknown.
    pub fn locations(&self, column: &str) -> &BTreeSet<String> {
        self.locations.get(column).unwrap_or(&NO_LOCATIONS)
    }

    pub fn file_count(&self, column: &str) -> usize {
        self.locations(column).len()
    }

    pub fn is_repeated(&self, column: &str) -> bool {
        self.repeated.contains(column)
    }

    /// Every column with its file count, most widespread first, ties by name.
    pub fn columns(&self) -> Vec<(&str, usize)> {
        let mut entries = self
            .locations
            .iter()
            .map(|(name, files)| (name.as_str(), files.len()))
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// Columns present in more than one file, ordered like [`Self::columns`].
    pub fn repeated_columns(&self) -> Vec<&str> {
        self.columns()
            .into_iter()
            .filter(|(name, _)| self.repeated.contains(*name))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn add_dataset(&mut self, dataset: &Dataset) {
        for column in dataset.column_names() {
            self.locations
                .entry(column.to_string())
                .or_default()
                .insert(dataset.id().to_string());
            self.refresh_repeated(column);
        }
    }

    pub fn drop_dataset(&mut self, dataset: &Dataset) {
        for column in dataset.column_names() {
            if let Some(files) = self.locations.get_mut(column) {
                files.remove(dataset.id());
                if files.is_empty() {
                    self.locations.remove(column);
                }
            }
            self.refresh_repeated(column);
        }
    }

    /// Renames `old` to `new` in every dataset that carries it.
    ///
    /// Returns the ids of the modified datasets in sorted order. Refuses to
    /// rename onto an existing column name.
    pub fn rename(&mut self, datasets: &mut DatasetSet, old: &str, new: &str) -> Result<Vec<String>> {
        if new.trim().is_empty() {
            return Err(StewardError::InvalidName {
                name: new.to_string(),
                reason: "column names cannot be empty".to_string(),
            });
        }
        if old == new {
            return Err(StewardError::InvalidName {
                name: new.to_string(),
                reason: "new name is identical to the current name".to_string(),
            });
        }
        let files = self
            .locations
            .get(old)
            .cloned()
            .ok_or_else(|| StewardError::ColumnNotFound {
                column: old.to_string(),
            })?;
        if let Some(existing) = self.locations.get(new) {
            return Err(StewardError::Conflict {
                column: new.to_string(),
                datasets: existing.iter().cloned().collect(),
            });
        }

        for id in &files {
            let dataset = require_column(datasets, id, old)?;
            if dataset.has_column(new) {
                return Err(StewardError::Conflict {
                    column: new.to_string(),
                    datasets: vec![id.clone()],
                });
            }
        }

        for id in &files {
            if let Some(dataset) = datasets.get_mut(id) {
                dataset.rename_column(old, new)?;
            }
        }
        self.locations.insert(new.to_string(), files.clone());
        self.locations.remove(old);
        if self.repeated.remove(old) {
            self.repeated.insert(new.to_string());
        }
        debug!("Renamed '{old}' to '{new}' in {} file(s)", files.len());
        Ok(files.into_iter().collect())
    }

    /// Drops `column` from every dataset that carries it.
    pub fn delete(&mut self, datasets: &mut DatasetSet, column: &str) -> Result<Vec<String>> {
        let files = self
            .locations
            .get(column)
            .cloned()
            .ok_or_else(|| StewardError::ColumnNotFound {
                column: column.to_string(),
            })?;
        for id in &files {
            require_column(datasets, id, column)?;
        }
        for id in &files {
            if let Some(dataset) = datasets.get_mut(id) {
                dataset.drop_column(column)?;
            }
        }
        self.locations.remove(column);
        self.repeated.remove(column);
        debug!("Deleted '{column}' from {} file(s)", files.len());
        Ok(files.into_iter().collect())
    }

    fn refresh_repeated(&mut self, column: &str) {
        if self.file_count(column) > 1 {
            self.repeated.insert(column.to_string());
        } else {
            self.repeated.remove(column);
        }
    }
}

fn require_column<'a>(datasets: &'a DatasetSet, id: &str, column: &str) -> Result<&'a Dataset> {
    match datasets.get(id) {
        Some(dataset) if dataset.has_column(column) => Ok(dataset),
        _ => Err(StewardError::ColumnMissingInDataset {
            column: column.to_string(),
            dataset: id.to_string(),
        }),
    }
}
