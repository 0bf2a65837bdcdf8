//! Coded-value remapping.
//!
//! Two metadata tables drive the substitution:
//!
//! - the **structure** table maps `(dataset, column)` to a category set;
//! - the **value** table maps `(category set, raw value)` to a label.
//!
//! Both lookups share the category set id. A value whose lookup misses or is
//! ambiguous at either stage becomes [`RemappedValue::Unresolved`]; nothing is
//! guessed and no raw code is passed through. The remap is a projection: the
//! session's datasets are never modified and results are written to a separate
//! output directory.

use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    dataset::{Cell, Dataset},
    error::{Result, StewardError},
    io_utils,
    registry::DatasetSet,
    session::Session,
};

pub const DEFAULT_STRUCTURE_FILE: &str = "dbstructure.csv";
pub const DEFAULT_VALUES_FILE: &str = "dvg.csv";
pub const DEFAULT_OUTPUT_DIR: &str = "transformed_data";

/// Field names of the two metadata tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapSchema {
    pub structure_dataset_field: String,
    pub structure_column_field: String,
    pub structure_category_field: String,
    pub value_category_field: String,
    pub value_raw_field: String,
    pub value_label_field: String,
}

impl Default for RemapSchema {
    fn default() -> Self {
        Self {
            structure_dataset_field: "DCM_name".to_string(),
            structure_column_field: "Question".to_string(),
            structure_category_field: "DVG_SUBSET_NM".to_string(),
            value_category_field: "DVG_SUBSET_NM".to_string(),
            value_raw_field: "DVG_VAL".to_string(),
            value_label_field: "DVG_LVAL".to_string(),
        }
    }
}

/// Result of a single-key lookup in a metadata table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Unique(String),
    /// Rows disagree about this key; candidates are sorted.
    Ambiguous(Vec<String>),
}

impl Lookup {
    fn merge(&mut self, candidate: String) {
        match self {
            Lookup::Unique(existing) if *existing == candidate => {}
            Lookup::Unique(existing) => {
                let mut candidates = vec![existing.clone(), candidate];
                candidates.sort();
                *self = Lookup::Ambiguous(candidates);
            }
            Lookup::Ambiguous(candidates) => {
                if let Err(pos) = candidates.binary_search(&candidate) {
                    candidates.insert(pos, candidate);
                }
            }
        }
    }

    fn absorb(&mut self, other: &Lookup) {
        match other {
            Lookup::Unique(value) => self.merge(value.clone()),
            Lookup::Ambiguous(candidates) => {
                for candidate in candidates {
                    self.merge(candidate.clone());
                }
            }
        }
    }

    pub fn unique(&self) -> Option<&str> {
        match self {
            Lookup::Unique(value) => Some(value),
            Lookup::Ambiguous(_) => None,
        }
    }
}

fn insert_entry(map: &mut HashMap<(String, String), Lookup>, key: (String, String), value: String) {
    match map.get_mut(&key) {
        Some(existing) => existing.merge(value),
        None => {
            map.insert(key, Lookup::Unique(value));
        }
    }
}

fn ambiguous_keys(map: &HashMap<(String, String), Lookup>) -> Vec<StewardError> {
    let mut keys = map
        .iter()
        .filter_map(|((left, right), lookup)| match lookup {
            Lookup::Ambiguous(candidates) => Some(StewardError::AmbiguousResolution {
                key: format!("({left}, {right})"),
                candidates: candidates.clone(),
            }),
            Lookup::Unique(_) => None,
        })
        .collect::<Vec<_>>();
    keys.sort_by_key(|err| err.to_string());
    keys
}

fn field_index(dataset: &Dataset, field: &str) -> Result<usize> {
    dataset
        .column_names()
        .position(|name| name == field)
        .ok_or_else(|| StewardError::FieldNotFound {
            field: field.to_string(),
            dataset: dataset.id().to_string(),
        })
}

/// Structure keys that matched one dataset column and their combined lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyResolution {
    pub keys: Vec<(String, String)>,
    pub lookup: Lookup,
}

/// `(dataset key, column) → category set`.
#[derive(Debug, Clone, Default)]
pub struct StructureMapping {
    entries: HashMap<(String, String), Lookup>,
}

impl StructureMapping {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = ((S, S), S)>,
        S: Into<String>,
    {
        let mut mapping = StructureMapping::default();
        for ((dataset, column), category) in entries {
            insert_entry(
                &mut mapping.entries,
                (dataset.into(), column.into()),
                category.into(),
            );
        }
        mapping
    }

    /// One entry per row whose category set is present.
    pub fn from_dataset(table: &Dataset, schema: &RemapSchema) -> Result<Self> {
        let dataset_idx = field_index(table, &schema.structure_dataset_field)?;
        let column_idx = field_index(table, &schema.structure_column_field)?;
        let category_idx = field_index(table, &schema.structure_category_field)?;
        let columns = table.columns();
        let mut mapping = StructureMapping::default();
        for row in 0..table.row_count() {
            let (Some(dataset), Some(column), Some(category)) = (
                &columns[dataset_idx].cells()[row],
                &columns[column_idx].cells()[row],
                &columns[category_idx].cells()[row],
            ) else {
                continue;
            };
            insert_entry(
                &mut mapping.entries,
                (dataset.clone(), column.clone()),
                category.clone(),
            );
        }
        debug!("Structure mapping holds {} key(s)", mapping.len());
        Ok(mapping)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, dataset_key: &str, column: &str) -> Option<&Lookup> {
        self.entries
            .get(&(dataset_key.to_string(), column.to_string()))
    }

    /// Looks `column` up under the dataset's file name and under its stem.
    /// When both keys exist their category sets are merged, so rows that
    /// disagree across the two spellings yield [`Lookup::Ambiguous`].
    pub fn resolve(&self, dataset: &Dataset, column: &str) -> Option<KeyResolution> {
        let mut candidates = vec![dataset.id()];
        if dataset.stem() != dataset.id() {
            candidates.push(dataset.stem());
        }
        let mut keys = Vec::new();
        let mut lookup: Option<Lookup> = None;
        for candidate in candidates {
            let Some((key, found)) = self
                .entries
                .get_key_value(&(candidate.to_string(), column.to_string()))
            else {
                continue;
            };
            keys.push(key.clone());
            lookup = Some(match lookup.take() {
                Some(mut merged) => {
                    merged.absorb(found);
                    merged
                }
                None => found.clone(),
            });
        }
        lookup.map(|lookup| KeyResolution { keys, lookup })
    }

    pub fn keys(&self) -> impl Iterator<Item = &(String, String)> {
        self.entries.keys()
    }

    pub fn ambiguities(&self) -> Vec<StewardError> {
        ambiguous_keys(&self.entries)
    }
}

/// `(category set, raw value) → label`.
#[derive(Debug, Clone, Default)]
pub struct ValueMapping {
    entries: HashMap<(String, String), Lookup>,
}

impl ValueMapping {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = ((S, S), S)>,
        S: Into<String>,
    {
        let mut mapping = ValueMapping::default();
        for ((category, raw), label) in entries {
            insert_entry(
                &mut mapping.entries,
                (category.into(), raw.into()),
                label.into(),
            );
        }
        mapping
    }

    /// One entry per row with a category set, raw value and label present.
    pub fn from_dataset(table: &Dataset, schema: &RemapSchema) -> Result<Self> {
        let category_idx = field_index(table, &schema.value_category_field)?;
        let raw_idx = field_index(table, &schema.value_raw_field)?;
        let label_idx = field_index(table, &schema.value_label_field)?;
        let columns = table.columns();
        let mut mapping = ValueMapping::default();
        let mut skipped = 0usize;
        for row in 0..table.row_count() {
            match (
                &columns[category_idx].cells()[row],
                &columns[raw_idx].cells()[row],
                &columns[label_idx].cells()[row],
            ) {
                (Some(category), Some(raw), Some(label)) => insert_entry(
                    &mut mapping.entries,
                    (category.clone(), raw.clone()),
                    label.clone(),
                ),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!("Skipped {skipped} incomplete value row(s) in {}", table.id());
        }
        Ok(mapping)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, category_set: &str, raw: &str) -> Option<&Lookup> {
        self.entries
            .get(&(category_set.to_string(), raw.to_string()))
    }

    pub fn ambiguities(&self) -> Vec<StewardError> {
        ambiguous_keys(&self.entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "label", rename_all = "snake_case")]
pub enum RemappedValue {
    Resolved(String),
    Unresolved,
    Missing,
}

impl RemappedValue {
    pub fn into_cell(self, unresolved_marker: Option<&str>) -> Cell {
        match self {
            RemappedValue::Resolved(label) => Some(label),
            RemappedValue::Unresolved => unresolved_marker.map(str::to_string),
            RemappedValue::Missing => None,
        }
    }
}

/// Substitutes every present cell through the two-stage lookup.
pub fn remap_cells(cells: &[Cell], category_set: &Lookup, values: &ValueMapping) -> Vec<RemappedValue> {
    cells
        .iter()
        .map(|cell| match cell {
            None => RemappedValue::Missing,
            Some(raw) => category_set
                .unique()
                .and_then(|set| values.get(set, raw))
                .and_then(Lookup::unique)
                .map(|label| RemappedValue::Resolved(label.to_string()))
                .unwrap_or(RemappedValue::Unresolved),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemappedColumn {
    pub name: String,
    pub category_set: Lookup,
    pub values: Vec<RemappedValue>,
}

impl RemappedColumn {
    fn count(&self, predicate: impl Fn(&RemappedValue) -> bool) -> usize {
        self.values.iter().filter(|v| predicate(v)).count()
    }

    pub fn resolved(&self) -> usize {
        self.count(|v| matches!(v, RemappedValue::Resolved(_)))
    }

    pub fn unresolved(&self) -> usize {
        self.count(|v| matches!(v, RemappedValue::Unresolved))
    }

    pub fn missing(&self) -> usize {
        self.count(|v| matches!(v, RemappedValue::Missing))
    }
}

/// Transformed copy of one dataset.
#[derive(Debug, Clone)]
pub struct RemappedDataset {
    pub dataset: Dataset,
    pub columns: Vec<RemappedColumn>,
    pub matched_keys: Vec<(String, String)>,
    /// File-name and stem keys that name different category sets.
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RemapEngine {
    structure: StructureMapping,
    values: ValueMapping,
    unresolved_marker: Option<String>,
}

impl RemapEngine {
    pub fn new(structure: StructureMapping, values: ValueMapping) -> Self {
        Self {
            structure,
            values,
            unresolved_marker: None,
        }
    }

    /// Text written for unresolved cells instead of an empty field.
    pub fn with_unresolved_marker(mut self, marker: Option<String>) -> Self {
        self.unresolved_marker = marker;
        self
    }

    pub fn structure(&self) -> &StructureMapping {
        &self.structure
    }

    pub fn values(&self) -> &ValueMapping {
        &self.values
    }

    /// Remaps every mapped column of `dataset`. Returns `None` when no column
    /// has a structure entry; such datasets are left untouched.
    pub fn remap_dataset(&self, dataset: &Dataset) -> Result<Option<RemappedDataset>> {
        let mut projected = dataset.clone();
        let mut columns = Vec::new();
        let mut matched_keys = Vec::new();
        let mut conflicts = Vec::new();
        for column in dataset.columns() {
            let Some(resolution) = self.structure.resolve(dataset, column.name()) else {
                continue;
            };
            if let (true, Lookup::Ambiguous(candidates)) =
                (resolution.keys.len() > 1, &resolution.lookup)
            {
                let spellings = resolution.keys.iter().map(|(key, _)| key.as_str()).join(" | ");
                let conflict = StewardError::AmbiguousResolution {
                    key: format!("({spellings}, {})", column.name()),
                    candidates: candidates.clone(),
                };
                conflicts.push(conflict.to_string());
            }
            let values = remap_cells(column.cells(), &resolution.lookup, &self.values);
            let cells = values
                .iter()
                .cloned()
                .map(|value| value.into_cell(self.unresolved_marker.as_deref()))
                .collect();
            projected = projected.with_replaced_cells(column.name(), cells)?;
            matched_keys.extend(resolution.keys);
            columns.push(RemappedColumn {
                name: column.name().to_string(),
                category_set: resolution.lookup,
                values,
            });
        }
        if columns.is_empty() {
            return Ok(None);
        }
        Ok(Some(RemappedDataset {
            dataset: projected,
            columns,
            matched_keys,
            conflicts,
        }))
    }

    /// Remaps every dataset in `datasets` except the ids in `exclude`.
    pub fn remap_all(&self, datasets: &DatasetSet, exclude: &[&str]) -> Result<Vec<RemappedDataset>> {
        let mut remapped = Vec::new();
        for (id, dataset) in datasets {
            if exclude.contains(&id.as_str()) {
                continue;
            }
            if let Some(result) = self.remap_dataset(dataset)? {
                debug!("Remapped {} column(s) in {id}", result.columns.len());
                remapped.push(result);
            }
        }
        Ok(remapped)
    }
}

#[derive(Debug, Clone)]
pub struct RemapOptions {
    pub schema: RemapSchema,
    /// Structure table, by file name inside the session folder.
    pub structure_file: String,
    /// Value table; a bare file name is looked up in the session folder.
    pub values_path: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub unresolved_marker: Option<String>,
}

impl Default for RemapOptions {
    fn default() -> Self {
        Self {
            schema: RemapSchema::default(),
            structure_file: DEFAULT_STRUCTURE_FILE.to_string(),
            values_path: PathBuf::from(DEFAULT_VALUES_FILE),
            output_dir: None,
            unresolved_marker: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    /// `None` when the structure table is ambiguous for this column.
    pub category_set: Option<String>,
    pub resolved: usize,
    pub unresolved: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub dataset: String,
    pub output: PathBuf,
    pub columns: Vec<ColumnSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteFailure {
    pub dataset: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemapReport {
    pub structure_file: String,
    pub values_file: String,
    pub structure_entries: usize,
    pub value_entries: usize,
    pub output_dir: PathBuf,
    pub files: Vec<FileSummary>,
    /// Structure keys that matched no column of any target dataset.
    pub unmatched_keys: Vec<(String, String)>,
    pub ambiguities: Vec<String>,
    pub write_failures: Vec<WriteFailure>,
}

fn resolve_values_path(folder: &Path, values_path: &Path) -> PathBuf {
    if values_path.components().count() == 1 && !values_path.is_absolute() {
        folder.join(values_path)
    } else {
        values_path.to_path_buf()
    }
}

fn same_directory(left: &Path, right: &Path) -> bool {
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(l), Ok(r)) => l == r,
        _ => left == right,
    }
}

/// Runs the remap over a session and writes one file per touched dataset.
pub fn run(session: &Session, options: &RemapOptions) -> Result<RemapReport> {
    let structure_table = session.dataset(&options.structure_file).ok_or_else(|| {
        StewardError::DatasetNotFound {
            dataset: options.structure_file.clone(),
        }
    })?;
    let values_path = resolve_values_path(session.folder(), &options.values_path);
    if !values_path.is_file() {
        return Err(StewardError::FileNotFound { path: values_path });
    }
    // Codes such as "NA" are legitimate in the value table.
    let values_table = Dataset::load(&values_path, &session.options().strict())?;

    let structure = StructureMapping::from_dataset(structure_table, &options.schema)?;
    let values = ValueMapping::from_dataset(&values_table, &options.schema)?;
    let mut ambiguities = structure
        .ambiguities()
        .into_iter()
        .chain(values.ambiguities())
        .map(|err| err.to_string())
        .collect::<Vec<_>>();

    let engine = RemapEngine::new(structure, values)
        .with_unresolved_marker(options.unresolved_marker.clone());
    // A value table outside the folder never shadows a data file of the same name.
    let values_in_folder = values_path
        .parent()
        .is_some_and(|parent| same_directory(parent, session.folder()));
    let mut exclude = vec![structure_table.id()];
    if values_in_folder {
        exclude.push(values_table.id());
    }
    let remapped = engine.remap_all(session.datasets(), &exclude)?;

    ambiguities.extend(remapped.iter().flat_map(|r| r.conflicts.iter().cloned()));
    ambiguities.sort();
    ambiguities.dedup();
    for message in &ambiguities {
        warn!("{message}");
    }

    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| session.folder().join(DEFAULT_OUTPUT_DIR));
    if same_directory(&output_dir, session.folder()) {
        return Err(StewardError::OutputOverlapsSource { path: output_dir });
    }
    fs::create_dir_all(&output_dir).map_err(|err| StewardError::io(&output_dir, err))?;

    let mut files = Vec::new();
    let mut write_failures = Vec::new();
    let mut used_keys = BTreeSet::new();
    for result in &remapped {
        used_keys.extend(result.matched_keys.iter().cloned());
        let id = result.dataset.id();
        let output = output_dir.join(id);
        let delimiter = io_utils::resolve_input_delimiter(&output, session.options().delimiter);
        match result
            .dataset
            .save(&output, delimiter, session.options().encoding)
        {
            Ok(()) => info!("Wrote remapped {id} to {output:?}"),
            Err(err) => {
                warn!("Could not write remapped {id}: {err}");
                write_failures.push(WriteFailure {
                    dataset: id.to_string(),
                    message: err.to_string(),
                });
                continue;
            }
        }
        files.push(FileSummary {
            dataset: id.to_string(),
            output,
            columns: result
                .columns
                .iter()
                .map(|column| ColumnSummary {
                    column: column.name.clone(),
                    category_set: column.category_set.unique().map(str::to_string),
                    resolved: column.resolved(),
                    unresolved: column.unresolved(),
                    missing: column.missing(),
                })
                .collect(),
        });
    }

    let mut unmatched_keys = engine
        .structure()
        .keys()
        .filter(|key| !used_keys.contains(*key))
        .cloned()
        .collect::<Vec<_>>();
    unmatched_keys.sort();

    Ok(RemapReport {
        structure_file: structure_table.id().to_string(),
        values_file: values_table.id().to_string(),
        structure_entries: engine.structure().len(),
        value_entries: engine.values().len(),
        output_dir,
        files,
        unmatched_keys,
        ambiguities,
        write_failures,
    })
}
