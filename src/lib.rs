//! Loader and filter for the Aschaffenburg Pose Dataset (APD).
//!
//! The dataset ships as one JSON file per pedestrian or cyclist track. A
//! load reads the whole directory once into a [`ColumnStore`] of Arrow
//! arrays, one slot per record, keeping only the categories, splits, fields
//! and joints named in a [`Selection`]. [`ColumnStore::filter`] narrows a
//! loaded store further without touching the disk.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use apd_loader::{load_dir, Field, LoadOptions, Selection};
//!
//! # fn main() -> apd_loader::Result<()> {
//! let selection = Selection::default().with_data_fields([Field::Set, Field::HeadSmoothed]);
//! let store = load_dir(Path::new("data/"), &LoadOptions::new(selection))?;
//!
//! let test = store.filter(&Selection::default().with_sets(["test"]))?;
//! for i in 0..test.len() {
//!     let path = test.record::<f32>(Field::HeadSmoothed, None, i);
//!     println!("{i}: {:?}", path.map(|p| p.shape().to_vec()));
//! }
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;

pub use data::builder::StoreBuilder;
pub use data::loader::{ingest, load_dir, read_dir_records, read_record};
pub use data::model::{
    Column, ColumnStore, Field, Record, POSE2D_JOINTS, POSE3D_JOINTS, SETS, VRU_TYPES,
};
pub use data::selection::{LoadOptions, MissingPolicy, Selection};
pub use data::tensor::{Element, Tensor};
pub use error::{DatasetError, Result};
