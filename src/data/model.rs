use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, StringArray};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::tensor::{Element, Tensor};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Vocabularies (documentation only, never enforced)
// ---------------------------------------------------------------------------

pub const VRU_TYPES: [&str; 2] = ["ped", "bike"];

pub const SETS: [&str; 3] = ["train", "valid", "test"];

pub const POSE3D_JOINTS: [&str; 14] = [
    "head", "thorax", "lshoulder", "rshoulder", "lelbow", "relbow", "lwrist", "rwrist", "lhip",
    "rhip", "lknee", "rknee", "lfoot", "rfoot",
];

pub const POSE2D_JOINTS: [&str; 18] = [
    "nose", "neck", "rshoulder", "relbow", "rwrist", "lshoulder", "lelbow", "lwrist", "rhip",
    "rknee", "rankle", "lhip", "lknee", "lankle", "reye", "leye", "rear", "lear",
];

// ---------------------------------------------------------------------------
// Field – the closed set of top-level record keys
// ---------------------------------------------------------------------------

/// Top-level key of an annotation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    VruType,
    Set,
    Timestamps,
    HeadSmoothed,
    Pose2d,
    Pose3d,
    MotionPrimitives,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::VruType,
        Field::Set,
        Field::Timestamps,
        Field::HeadSmoothed,
        Field::Pose2d,
        Field::Pose3d,
        Field::MotionPrimitives,
    ];

    /// The key used in the JSON files.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::VruType => "vru_type",
            Field::Set => "set",
            Field::Timestamps => "timestamps",
            Field::HeadSmoothed => "head_smoothed",
            Field::Pose2d => "pose2d",
            Field::Pose3d => "pose3d",
            Field::MotionPrimitives => "motion_primitives",
        }
    }

    /// Resolve a JSON key. Unknown keys yield `None`.
    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.as_str() == key)
    }

    /// Whether the value is a mapping of named series (joints, primitives).
    pub fn is_nested(self) -> bool {
        matches!(self, Field::Pose2d | Field::Pose3d | Field::MotionPrimitives)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Record – one decoded annotation file
// ---------------------------------------------------------------------------

/// A decoded source record: JSON key → value, plus where it came from.
#[derive(Debug, Clone, Default)]
pub struct Record {
    origin: Option<PathBuf>,
    values: JsonMap<String, JsonValue>,
}

impl Record {
    pub fn new(values: JsonMap<String, JsonValue>) -> Self {
        Record {
            origin: None,
            values,
        }
    }

    /// Wrap a JSON value; `None` unless it is an object.
    pub fn from_value(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(values) => Some(Record::new(values)),
            _ => None,
        }
    }

    pub fn with_origin(mut self, path: impl Into<PathBuf>) -> Self {
        self.origin = Some(path.into());
        self
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    /// Read a required string label (`vru_type` or `set`).
    pub fn label(&self, field: Field) -> Result<&str> {
        let value = self.values.get(field.as_str()).ok_or_else(|| DatasetError::MissingField {
            field,
            origin: self.describe(),
        })?;
        value.as_str().ok_or_else(|| {
            DatasetError::invalid(field.as_str(), format!("{}: expected a string, found {value}", self.describe()))
        })
    }

    pub(crate) fn describe(&self) -> String {
        match &self.origin {
            Some(path) => path.display().to_string(),
            None => "<record>".to_string(),
        }
    }

    pub(crate) fn into_values(self) -> JsonMap<String, JsonValue> {
        self.values
    }
}

// ---------------------------------------------------------------------------
// Column – the frozen, record-aligned arrays of one field
// ---------------------------------------------------------------------------

/// Arrays of one top-level field. Every array has one slot per record.
///
/// Labels are `Utf8`; numeric series are `List` over the time axis with
/// `FixedSizeList` inner axes, e.g. `head_smoothed` points become
/// `List<FixedSizeList<Float32, 3>>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Scalar(ArrayRef),
    /// Sub-key (joint or primitive name) → array.
    Nested(BTreeMap<String, ArrayRef>),
}

impl Column {
    /// The array for `sub_key` (`None` addresses a scalar column).
    pub fn array(&self, sub_key: Option<&str>) -> Option<&ArrayRef> {
        match (self, sub_key) {
            (Column::Scalar(array), None) => Some(array),
            (Column::Nested(parts), Some(key)) => parts.get(key),
            _ => None,
        }
    }

    /// Keep the records where `mask` is true. Nested columns drop sub-keys
    /// rejected by `keep_key`.
    pub fn select(&self, mask: &BooleanArray, keep_key: impl Fn(&str) -> bool) -> Result<Column> {
        match self {
            Column::Scalar(array) => Ok(Column::Scalar(arrow::compute::filter(array.as_ref(), mask)?)),
            Column::Nested(parts) => {
                let mut selected = BTreeMap::new();
                for (key, array) in parts.iter().filter(|(key, _)| keep_key(key.as_str())) {
                    selected.insert(key.clone(), arrow::compute::filter(array.as_ref(), mask)?);
                }
                Ok(Column::Nested(selected))
            }
        }
    }

    /// Iterate every array with its sub-key.
    pub fn arrays(&self) -> Box<dyn Iterator<Item = (Option<&str>, &ArrayRef)> + '_> {
        match self {
            Column::Scalar(array) => Box::new(std::iter::once((None::<&str>, array))),
            Column::Nested(parts) => Box::new(parts.iter().map(|(k, a)| (Some(k.as_str()), a))),
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnStore – the loaded dataset
// ---------------------------------------------------------------------------

/// The loaded dataset: one [`Column`] per field, all aligned on record index.
///
/// There is no mutating API; [`ColumnStore::filter`] returns a new store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnStore {
    len: usize,
    columns: BTreeMap<Field, Column>,
}

impl ColumnStore {
    /// Freeze `columns` into a store of `len` records. Every array must
    /// have exactly `len` slots.
    pub(crate) fn from_parts(len: usize, columns: BTreeMap<Field, Column>) -> Result<Self> {
        for (field, column) in &columns {
            for (sub_key, array) in column.arrays() {
                if array.len() != len {
                    return Err(DatasetError::Misaligned {
                        field: match sub_key {
                            Some(key) => format!("{field}.{key}"),
                            None => field.to_string(),
                        },
                        present: array.len(),
                        records: len,
                    });
                }
            }
        }
        Ok(ColumnStore { len, columns })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether no field was loaded at all.
    pub fn has_no_fields(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.columns.keys().copied()
    }

    pub fn column(&self, field: Field) -> Option<&Column> {
        self.columns.get(&field)
    }

    pub(crate) fn columns(&self) -> &BTreeMap<Field, Column> {
        &self.columns
    }

    /// String labels of `vru_type` or `set`.
    pub fn labels(&self, field: Field) -> Option<&StringArray> {
        self.column(field)?.array(None)?.as_string_opt::<i32>()
    }

    /// Sub-keys of a nested field, in sorted order.
    pub fn nested_keys(&self, field: Field) -> Vec<&str> {
        match self.column(field) {
            Some(Column::Nested(parts)) => parts.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Number of records per label value.
    pub fn label_counts(&self, field: Field) -> Result<BTreeMap<String, usize>> {
        let labels = self.labels(field).ok_or(DatasetError::MissingColumn(field))?;
        let mut counts = BTreeMap::new();
        for label in labels.iter().flatten() {
            *counts.entry(label.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Read back one record's series as a dense tensor.
    ///
    /// `sub_key` names the joint/primitive for nested fields. Returns `None`
    /// if the field, sub-key or record is absent, the slot is null, or `N`
    /// does not match the stored element type.
    pub fn record<N: Element>(&self, field: Field, sub_key: Option<&str>, index: usize) -> Option<Tensor<N>> {
        let array = self.column(field)?.array(sub_key)?;
        if index >= array.len() || array.is_null(index) {
            return None;
        }

        if let Some(scalars) = array.as_primitive_opt::<N::Arrow>() {
            return Tensor::new(Vec::new(), vec![scalars.value(index)]);
        }

        let list = array.as_list_opt::<i32>()?;
        let mut shape = vec![list.value_length(index) as usize];
        let mut inner = list.value(index);
        while let Some(fixed) = inner.as_fixed_size_list_opt() {
            shape.push(fixed.value_length() as usize);
            inner = fixed.values().clone();
        }
        let values = inner.as_primitive_opt::<N::Arrow>()?.values().to_vec();
        Tensor::new(shape, values)
    }
}
