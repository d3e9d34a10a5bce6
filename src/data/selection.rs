use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::model::Field;

// ---------------------------------------------------------------------------
// Selection – allow-lists shared by loading and filtering
// ---------------------------------------------------------------------------

/// Which records, fields and joints to keep.
///
/// Every list is an allow-list; an empty list means "no restriction".
/// Deserializes from JSON with all keys optional:
///
/// ```json
/// { "vru_types": ["ped"], "data_fields": ["set", "head_smoothed"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub vru_types: BTreeSet<String>,
    pub sets: BTreeSet<String>,
    pub data_fields: BTreeSet<Field>,
    pub pose3d_joints: BTreeSet<String>,
    pub pose2d_joints: BTreeSet<String>,
}

impl Selection {
    pub fn with_vru_types<I, S>(mut self, vru_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vru_types = vru_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sets<I, S>(mut self, sets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets = sets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_data_fields<I: IntoIterator<Item = Field>>(mut self, fields: I) -> Self {
        self.data_fields = fields.into_iter().collect();
        self
    }

    pub fn with_pose3d_joints<I, S>(mut self, joints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pose3d_joints = joints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pose2d_joints<I, S>(mut self, joints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pose2d_joints = joints.into_iter().map(Into::into).collect();
        self
    }

    /// Record-level test on the category and split labels.
    pub fn admits_record(&self, vru_type: &str, set: &str) -> bool {
        allows(&self.vru_types, vru_type) && allows(&self.sets, set)
    }

    pub fn admits_field(&self, field: Field) -> bool {
        self.data_fields.is_empty() || self.data_fields.contains(&field)
    }

    /// Sub-key test inside a nested field. `motion_primitives` is never
    /// restricted.
    pub fn admits_sub_key(&self, field: Field, key: &str) -> bool {
        match field {
            Field::Pose2d => allows(&self.pose2d_joints, key),
            Field::Pose3d => allows(&self.pose3d_joints, key),
            _ => true,
        }
    }
}

fn allows(list: &BTreeSet<String>, item: &str) -> bool {
    list.is_empty() || list.contains(item)
}

// ---------------------------------------------------------------------------
// Load options
// ---------------------------------------------------------------------------

/// What to do when an included field or joint is missing from some records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Fail the load: every included field must be present in every record.
    #[default]
    Reject,
    /// Store a null slot for records that lack the value.
    Null,
}

/// Options for a one-shot load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub selection: Selection,
    pub missing: MissingPolicy,
}

impl LoadOptions {
    pub fn new(selection: Selection) -> Self {
        LoadOptions {
            selection,
            missing: MissingPolicy::default(),
        }
    }

    pub fn with_missing(mut self, missing: MissingPolicy) -> Self {
        self.missing = missing;
        self
    }
}
