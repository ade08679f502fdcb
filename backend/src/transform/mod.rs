//! Transformation module.
//!
//! This module turns a product export into a template-shaped CSV:
//! - Cleanup: Text normalization of selected columns
//! - Images: Per-product image slots
//! - Fields: Template field classification and output layout
//! - Propagate: Per-product values shared by variant rows
//! - Rows: Plan compilation and lazy row materialization
//! - Encoder: Streaming CSV output and previews
//! - Pipeline: Request-level orchestration

pub mod cleanup;
pub mod encoder;
pub mod fields;
pub mod images;
pub mod pipeline;
pub mod propagate;
pub mod rows;

pub use cleanup::{clean_columns, clean_text};
pub use encoder::{encode_all, CsvChunks, Preview, PREVIEW_ROWS, UTF8_BOM};
pub use fields::{FieldBinding, FieldLayout, OutputColumn};
pub use images::ImageSlots;
pub use pipeline::*;
pub use propagate::ProductValues;
pub use rows::{PlanStats, Rows, TransformPlan};
