use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::Value as JsonValue;

use super::builder::StoreBuilder;
use super::model::{ColumnStore, Field, Record};
use super::selection::LoadOptions;
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load every `.json` record in `dir` into a [`ColumnStore`].
pub fn load_dir(dir: &Path, options: &LoadOptions) -> Result<ColumnStore> {
    ingest(read_dir_records(dir)?, options)
}

/// Build a store from decoded records.
///
/// A record is skipped unless its `vru_type` and `set` pass the selection;
/// of the records kept, only allowed fields and joints are stored. Errors
/// yielded by `records` are returned unchanged.
pub fn ingest<I>(records: I, options: &LoadOptions) -> Result<ColumnStore>
where
    I: IntoIterator<Item = Result<Record>>,
{
    let selection = &options.selection;
    let mut builder = StoreBuilder::new();
    let mut skipped = 0usize;

    for record in records {
        let record = record?;
        let vru_type = record.label(Field::VruType)?;
        let set = record.label(Field::Set)?;
        if !selection.admits_record(vru_type, set) {
            skipped += 1;
            continue;
        }
        builder.push_record(record, selection)?;
    }

    let store = builder.finish(options.missing)?;
    info!(
        "Loaded {} records ({skipped} skipped), fields: {:?}",
        store.len(),
        store.fields().map(Field::as_str).collect::<Vec<_>>()
    );
    Ok(store)
}

// ---------------------------------------------------------------------------
// Directory reader
// ---------------------------------------------------------------------------

/// Decode the `.json` files directly inside `dir`, in path order.
///
/// Listing happens up front; files are read lazily as the iterator is
/// consumed. Subdirectories and other extensions are ignored.
pub fn read_dir_records(dir: &Path) -> Result<impl Iterator<Item = Result<Record>>> {
    let io_err = |source: std::io::Error| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    info!("Loading dataset: {} files in {}", paths.len(), dir.display());
    Ok(paths.into_iter().map(|path| read_record(&path)))
}

/// Decode a single record file.
pub fn read_record(path: &Path) -> Result<Record> {
    debug!("Reading {}", path.display());
    let text = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: JsonValue = serde_json::from_str(&text).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    Record::from_value(value)
        .map(|record| record.with_origin(path))
        .ok_or_else(|| DatasetError::NotAnObject {
            path: path.to_path_buf(),
        })
}
