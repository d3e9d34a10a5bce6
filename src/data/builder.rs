use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, ListArray, PrimitiveArray, StringArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::Field as ArrowField;
use log::{debug, warn};
use serde_json::Value as JsonValue;

use super::model::{Column, ColumnStore, Field, Record};
use super::selection::{MissingPolicy, Selection};
use super::tensor::{Element, Tensor};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// ColumnBuilder – growable, per-record slots of one array
// ---------------------------------------------------------------------------

/// Accumulates one array. Slot `i` belongs to passing record `i`; records
/// that did not supply a value hold `None`.
#[derive(Debug)]
enum ColumnBuilder {
    Labels(Vec<Option<String>>),
    Float32(Vec<Option<Tensor<f32>>>),
    UInt64(Vec<Option<Tensor<u64>>>),
    UInt8(Vec<Option<Tensor<u8>>>),
}

/// One decoded value, waiting to be committed to its builder.
#[derive(Debug)]
enum Cell {
    Label(String),
    Float32(Tensor<f32>),
    UInt64(Tensor<u64>),
    UInt8(Tensor<u8>),
}

impl Cell {
    fn decode(field: Field, value: &JsonValue) -> std::result::Result<Cell, String> {
        Ok(match field {
            Field::VruType | Field::Set => match value {
                JsonValue::String(s) => Cell::Label(s.clone()),
                other => return Err(format!("expected a string, found {other}")),
            },
            Field::Timestamps => Cell::UInt64(Tensor::from_json(value)?),
            Field::MotionPrimitives => Cell::UInt8(Tensor::from_json(value)?),
            Field::HeadSmoothed | Field::Pose2d | Field::Pose3d => Cell::Float32(Tensor::from_json(value)?),
        })
    }
}

impl ColumnBuilder {
    fn for_field(field: Field) -> Self {
        match field {
            Field::VruType | Field::Set => ColumnBuilder::Labels(Vec::new()),
            Field::Timestamps => ColumnBuilder::UInt64(Vec::new()),
            Field::MotionPrimitives => ColumnBuilder::UInt8(Vec::new()),
            Field::HeadSmoothed | Field::Pose2d | Field::Pose3d => ColumnBuilder::Float32(Vec::new()),
        }
    }

    /// Store an already decoded value in slot `row`.
    fn place(&mut self, row: usize, cell: Cell) {
        match (self, cell) {
            (ColumnBuilder::Labels(slots), Cell::Label(v)) => place(slots, row, v),
            (ColumnBuilder::Float32(slots), Cell::Float32(v)) => place(slots, row, v),
            (ColumnBuilder::UInt64(slots), Cell::UInt64(v)) => place(slots, row, v),
            (ColumnBuilder::UInt8(slots), Cell::UInt8(v)) => place(slots, row, v),
            _ => unreachable!("element type is fixed per field"),
        }
    }

    fn present(&self) -> usize {
        match self {
            ColumnBuilder::Labels(slots) => count_present(slots),
            ColumnBuilder::Float32(slots) => count_present(slots),
            ColumnBuilder::UInt64(slots) => count_present(slots),
            ColumnBuilder::UInt8(slots) => count_present(slots),
        }
    }

    /// Freeze into an array of exactly `records` slots.
    fn finish(self, name: &str, records: usize) -> Result<ArrayRef> {
        match self {
            ColumnBuilder::Labels(mut slots) => {
                slots.resize_with(records, || None);
                Ok(Arc::new(slots.into_iter().collect::<StringArray>()))
            }
            ColumnBuilder::Float32(slots) => tensor_array(name, slots, records),
            ColumnBuilder::UInt64(slots) => tensor_array(name, slots, records),
            ColumnBuilder::UInt8(slots) => tensor_array(name, slots, records),
        }
    }
}

fn place<T>(slots: &mut Vec<Option<T>>, row: usize, value: T) {
    debug_assert!(slots.len() <= row, "slot {row} filled twice");
    while slots.len() < row {
        slots.push(None);
    }
    slots.push(Some(value));
}

fn count_present<T>(slots: &[Option<T>]) -> usize {
    slots.iter().filter(|s| s.is_some()).count()
}

/// Assemble per-record tensors into one Arrow array.
///
/// Rank-0 tensors become a primitive array. Otherwise the leading axis may
/// vary per record and becomes a `List`; every further axis must agree across
/// records and becomes a `FixedSizeList`.
fn tensor_array<N: Element>(name: &str, mut slots: Vec<Option<Tensor<N>>>, records: usize) -> Result<ArrayRef> {
    slots.resize_with(records, || None);

    let mut present = slots.iter().flatten().peekable();
    if present.peek().is_some() && slots.iter().flatten().all(|t| t.rank() == 0) {
        let values: PrimitiveArray<N::Arrow> = slots
            .iter()
            .map(|slot| slot.as_ref().map(|t| t.values()[0]))
            .collect();
        return Ok(Arc::new(values));
    }

    let mut inner: Option<&[usize]> = None;
    for tensor in present {
        if tensor.rank() == 0 {
            return Err(DatasetError::invalid(name, "mixes scalars and sequences"));
        }
        if tensor.rows() == 0 {
            continue;
        }
        let dims = &tensor.shape()[1..];
        match inner {
            None => inner = Some(dims),
            Some(expected) if expected != dims => {
                return Err(DatasetError::invalid(
                    name,
                    format!("inner shape {dims:?} differs from {expected:?}"),
                ));
            }
            Some(_) => {}
        }
    }
    let inner = inner.map(<[usize]>::to_vec).unwrap_or_default();

    let mut lengths = Vec::with_capacity(records);
    let mut validity = Vec::with_capacity(records);
    let mut values = Vec::new();
    for slot in slots {
        match slot {
            Some(tensor) => {
                lengths.push(tensor.rows());
                validity.push(true);
                values.extend(tensor.into_values());
            }
            None => {
                lengths.push(0);
                validity.push(false);
            }
        }
    }

    let rows: usize = lengths.iter().sum();
    let mut child: ArrayRef = Arc::new(PrimitiveArray::<N::Arrow>::try_new(values.into(), None)?);
    for (depth, &size) in inner.iter().enumerate().rev() {
        // A zero-width list cannot infer its length from the child.
        let nulls = (size == 0).then(|| {
            let len = rows * inner[..depth].iter().product::<usize>();
            NullBuffer::new_valid(len)
        });
        let item = Arc::new(ArrowField::new("item", child.data_type().clone(), false));
        child = Arc::new(FixedSizeListArray::try_new(item, size as i32, child, nulls)?);
    }

    let nulls = NullBuffer::from(validity);
    let nulls = (nulls.null_count() > 0).then_some(nulls);
    let item = Arc::new(ArrowField::new("item", child.data_type().clone(), false));
    let list = ListArray::try_new(item, OffsetBuffer::from_lengths(lengths), child, nulls)?;
    Ok(Arc::new(list))
}

// ---------------------------------------------------------------------------
// StoreBuilder – accumulation phase of a load
// ---------------------------------------------------------------------------

/// Growable per-field state; [`StoreBuilder::finish`] freezes it into a
/// [`ColumnStore`].
#[derive(Debug, Default)]
pub struct StoreBuilder {
    records: usize,
    scalars: BTreeMap<Field, ColumnBuilder>,
    nested: BTreeMap<Field, BTreeMap<String, ColumnBuilder>>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records accepted so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Append one record that already passed the category/split test.
    /// Field and joint allow-lists of `selection` are applied here.
    ///
    /// Every value is decoded before any is stored, so a failed record
    /// leaves the builder unchanged.
    pub fn push_record(&mut self, record: Record, selection: &Selection) -> Result<()> {
        let origin = record.describe();
        let mut staged: Vec<(Field, Option<String>, Cell)> = Vec::new();
        let mut nested_seen = Vec::new();

        for (key, value) in record.into_values() {
            let Some(field) = Field::from_key(&key) else {
                debug!("{origin}: skipping unknown field '{key}'");
                continue;
            };
            if !selection.admits_field(field) {
                continue;
            }

            if field.is_nested() {
                let JsonValue::Object(parts) = value else {
                    return Err(DatasetError::invalid(
                        field.as_str(),
                        format!("{origin}: expected an object of named series"),
                    ));
                };
                nested_seen.push(field);
                for (sub_key, sub_value) in parts {
                    if !selection.admits_sub_key(field, &sub_key) {
                        continue;
                    }
                    let cell = Cell::decode(field, &sub_value).map_err(|reason| {
                        DatasetError::invalid(format!("{field}.{sub_key}"), format!("{origin}: {reason}"))
                    })?;
                    staged.push((field, Some(sub_key), cell));
                }
            } else {
                let cell = Cell::decode(field, &value)
                    .map_err(|reason| DatasetError::invalid(field.as_str(), format!("{origin}: {reason}")))?;
                staged.push((field, None, cell));
            }
        }

        let row = self.records;
        for field in nested_seen {
            self.nested.entry(field).or_default();
        }
        for (field, sub_key, cell) in staged {
            let builder = match sub_key {
                Some(sub_key) => self
                    .nested
                    .entry(field)
                    .or_default()
                    .entry(sub_key)
                    .or_insert_with(|| ColumnBuilder::for_field(field)),
                None => self
                    .scalars
                    .entry(field)
                    .or_insert_with(|| ColumnBuilder::for_field(field)),
            };
            builder.place(row, cell);
        }
        self.records += 1;
        Ok(())
    }

    /// Freeze every builder into an Arrow array of `records()` slots.
    pub fn finish(self, missing: MissingPolicy) -> Result<ColumnStore> {
        let records = self.records;
        let mut columns = BTreeMap::new();

        for (field, builder) in self.scalars {
            let array = finish_checked(field.as_str(), builder, records, missing)?;
            columns.insert(field, Column::Scalar(array));
        }
        for (field, parts) in self.nested {
            let mut arrays = BTreeMap::new();
            for (sub_key, builder) in parts {
                let name = format!("{field}.{sub_key}");
                arrays.insert(sub_key, finish_checked(&name, builder, records, missing)?);
            }
            columns.insert(field, Column::Nested(arrays));
        }

        ColumnStore::from_parts(records, columns)
    }
}

fn finish_checked(name: &str, builder: ColumnBuilder, records: usize, missing: MissingPolicy) -> Result<ArrayRef> {
    let present = builder.present();
    if present < records {
        match missing {
            MissingPolicy::Reject => {
                return Err(DatasetError::Misaligned {
                    field: name.to_string(),
                    present,
                    records,
                });
            }
            MissingPolicy::Null => {
                warn!("'{name}' missing in {} of {records} records, storing nulls", records - present);
            }
        }
    }
    builder.finish(name, records)
}

#[cfg(test)]
mod tests {
    use arrow::array::AsArray;
    use arrow::datatypes::{Float32Type, UInt64Type};
    use serde_json::json;

    use super::*;

    fn record(value: JsonValue) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn late_field_is_backfilled() {
        let mut builder = StoreBuilder::new();
        let sel = Selection::default();
        builder.push_record(record(json!({"vru_type": "ped", "set": "train"})), &sel).unwrap();
        builder
            .push_record(record(json!({"vru_type": "ped", "set": "train", "timestamps": [4, 5]})), &sel)
            .unwrap();

        let store = builder.finish(MissingPolicy::Null).unwrap();
        let ts = store.column(Field::Timestamps).unwrap().array(None).unwrap();
        assert_eq!(ts.len(), 2);
        assert!(ts.is_null(0));
        let list = ts.as_list::<i32>();
        assert_eq!(list.value(1).as_primitive::<UInt64Type>().values().to_vec(), vec![4, 5]);
    }

    #[test]
    fn reject_policy_reports_sparse_joint() {
        let mut builder = StoreBuilder::new();
        let sel = Selection::default();
        builder
            .push_record(record(json!({"vru_type": "ped", "set": "train", "pose2d": {"nose": [[1.0, 2.0]]}})), &sel)
            .unwrap();
        builder
            .push_record(record(json!({"vru_type": "ped", "set": "train", "pose2d": {}})), &sel)
            .unwrap();

        match builder.finish(MissingPolicy::Reject) {
            Err(DatasetError::Misaligned { field, present, records }) => {
                assert_eq!(field, "pose2d.nose");
                assert_eq!((present, records), (1, 2));
            }
            other => panic!("expected Misaligned, got {other:?}"),
        }
    }

    #[test]
    fn points_become_fixed_size_lists() {
        let mut builder = StoreBuilder::new();
        let sel = Selection::default();
        for points in [json!([[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]), json!([[6.0, 7.0, 8.0]])] {
            builder
                .push_record(record(json!({"vru_type": "bike", "set": "test", "head_smoothed": points})), &sel)
                .unwrap();
        }
        let store = builder.finish(MissingPolicy::Reject).unwrap();
        let head = store.column(Field::HeadSmoothed).unwrap().array(None).unwrap();
        let list = head.as_list::<i32>();
        assert_eq!(list.value_length(0), 2);
        assert_eq!(list.value_length(1), 1);
        let points = list.value(1);
        let fixed = points.as_fixed_size_list();
        assert_eq!(fixed.value_length(), 3);
        assert_eq!(fixed.values().as_primitive::<Float32Type>().values().to_vec(), vec![6.0, 7.0, 8.0]);
    }

    #[test]
    fn mismatched_point_width_is_an_error() {
        let mut builder = StoreBuilder::new();
        let sel = Selection::default();
        for points in [json!([[0.0, 1.0]]), json!([[6.0, 7.0, 8.0]])] {
            builder
                .push_record(record(json!({"vru_type": "bike", "set": "test", "head_smoothed": points})), &sel)
                .unwrap();
        }
        let err = builder.finish(MissingPolicy::Reject).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { ref field, .. } if field == "head_smoothed"));
    }

    #[test]
    fn out_of_range_primitive_names_the_sub_key() {
        let mut builder = StoreBuilder::new();
        let err = builder
            .push_record(
                record(json!({"vru_type": "ped", "set": "train", "motion_primitives": {"wait": [0, 300]}})),
                &Selection::default(),
            )
            .unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { ref field, .. } if field == "motion_primitives.wait"));
    }

    #[test]
    fn zero_width_points_keep_their_rows() {
        let mut builder = StoreBuilder::new();
        let sel = Selection::default();
        for points in [json!([[], []]), json!([[]])] {
            builder
                .push_record(record(json!({"vru_type": "ped", "set": "train", "head_smoothed": points})), &sel)
                .unwrap();
        }
        let store = builder.finish(MissingPolicy::Reject).unwrap();
        let head = store.column(Field::HeadSmoothed).unwrap().array(None).unwrap();
        let list = head.as_list::<i32>();
        assert_eq!((list.value_length(0), list.value_length(1)), (2, 1));

        let first = store.record::<f32>(Field::HeadSmoothed, None, 0).unwrap();
        assert_eq!(first.shape(), &[2, 0]);
        assert!(first.values().is_empty());
    }

    #[test]
    fn failed_record_leaves_builder_usable() {
        let mut builder = StoreBuilder::new();
        let sel = Selection::default();
        let err = builder
            .push_record(
                record(json!({"vru_type": "ped", "set": "train", "head_smoothed": [[1, 2]], "timestamps": [-1]})),
                &sel,
            )
            .unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { ref field, .. } if field == "timestamps"));
        assert_eq!(builder.records(), 0);

        builder
            .push_record(
                record(json!({"vru_type": "bike", "set": "test", "head_smoothed": [[3, 4]], "timestamps": [7]})),
                &sel,
            )
            .unwrap();
        let store = builder.finish(MissingPolicy::Reject).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.labels(Field::VruType).unwrap().value(0), "bike");
        let head = store.record::<f32>(Field::HeadSmoothed, None, 0).unwrap();
        assert_eq!(head.values(), &[3.0, 4.0]);
    }

    #[test]
    fn empty_nested_mapping_registers_field() {
        let mut builder = StoreBuilder::new();
        builder
            .push_record(record(json!({"vru_type": "ped", "set": "train", "pose3d": {}})), &Selection::default())
            .unwrap();
        let store = builder.finish(MissingPolicy::Reject).unwrap();
        assert!(store.nested_keys(Field::Pose3d).is_empty());
        assert!(store.column(Field::Pose3d).is_some());
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let mut builder = StoreBuilder::new();
        builder
            .push_record(record(json!({"vru_type": "ped", "set": "train", "camera": "left"})), &Selection::default())
            .unwrap();
        let store = builder.finish(MissingPolicy::Reject).unwrap();
        assert_eq!(store.fields().collect::<Vec<_>>(), vec![Field::VruType, Field::Set]);
    }
}
