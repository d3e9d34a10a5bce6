//! Data layer: record decoding, loading, and mask filtering.
//!
//! Architecture:
//! ```text
//!   <dir>/*.json
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  read + decode files → Record stream, vru_type/set test
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  builder  │  per-field slots, field/joint test → freeze to Arrow
//!   └──────────┘
//!        │
//!        ▼
//!   ┌─────────────┐
//!   │ ColumnStore  │  Field → Column (aligned arrays), read-only
//!   └─────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  selection → boolean mask → new ColumnStore
//!   └──────────┘
//! ```

pub mod builder;
pub mod filter;
pub mod loader;
pub mod model;
pub mod selection;
pub mod tensor;
