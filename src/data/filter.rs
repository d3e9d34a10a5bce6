use std::collections::BTreeMap;

use arrow::array::BooleanArray;
use log::debug;

use super::model::{ColumnStore, Field};
use super::selection::Selection;
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Mask filtering on a loaded store
// ---------------------------------------------------------------------------

impl ColumnStore {
    /// Derive a new store holding the records, fields and joints admitted
    /// by `selection`. `self` is left untouched.
    ///
    /// Fails with [`DatasetError::EmptyStore`] if no field was loaded.
    pub fn filter(&self, selection: &Selection) -> Result<ColumnStore> {
        if self.has_no_fields() {
            return Err(DatasetError::EmptyStore);
        }

        let mask = self.record_mask(selection)?;
        let len = mask.true_count();

        let mut columns = BTreeMap::new();
        for (&field, column) in self.columns() {
            if !selection.admits_field(field) {
                continue;
            }
            let selected = column.select(&mask, |key| selection.admits_sub_key(field, key))?;
            columns.insert(field, selected);
        }

        debug!("Filter kept {len} of {} records", self.len());
        ColumnStore::from_parts(len, columns)
    }

    /// One entry per record: whether its `vru_type` and `set` pass the
    /// selection. Only the category and split lists are consulted.
    pub fn record_mask(&self, selection: &Selection) -> Result<BooleanArray> {
        let mut keep = vec![true; self.len()];

        for (field, allowed) in [
            (Field::VruType, &selection.vru_types),
            (Field::Set, &selection.sets),
        ] {
            if allowed.is_empty() {
                continue;
            }
            let labels = self.labels(field).ok_or(DatasetError::MissingColumn(field))?;
            for (slot, label) in keep.iter_mut().zip(labels.iter()) {
                *slot &= label.is_some_and(|l| allowed.contains(l));
            }
        }

        Ok(BooleanArray::from(keep))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data::loader::ingest;
    use crate::data::model::Record;
    use crate::data::selection::LoadOptions;

    fn store() -> ColumnStore {
        let records = [
            json!({"vru_type": "ped", "set": "train", "timestamps": [1, 2]}),
            json!({"vru_type": "bike", "set": "test", "timestamps": [3]}),
            json!({"vru_type": "ped", "set": "test", "timestamps": [4, 5, 6]}),
        ];
        ingest(
            records.into_iter().map(|r| Ok(Record::from_value(r).unwrap())),
            &LoadOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn mask_combines_axes() {
        let store = store();
        let mask = store
            .record_mask(&Selection::default().with_vru_types(["ped"]).with_sets(["test"]))
            .unwrap();
        assert_eq!(mask, BooleanArray::from(vec![false, false, true]));

        let all = store.record_mask(&Selection::default()).unwrap();
        assert_eq!(all.true_count(), 3);
    }

    #[test]
    fn mask_needs_label_column() {
        let store = store()
            .filter(&Selection::default().with_data_fields([Field::Timestamps]))
            .unwrap();
        let err = store.record_mask(&Selection::default().with_sets(["train"])).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(Field::Set)));
    }

    #[test]
    fn dropped_fields_leave_record_count() {
        let filtered = store()
            .filter(&Selection::default().with_sets(["test"]).with_data_fields([Field::Timestamps]))
            .unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.fields().collect::<Vec<_>>(), vec![Field::Timestamps]);
        let last = filtered.record::<u64>(Field::Timestamps, None, 1).unwrap();
        assert_eq!(last.values(), &[4, 5, 6]);
    }
}
