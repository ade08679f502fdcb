//! # Catalog Buddy - Template-driven product catalog transformation
//!
//! Catalog Buddy turns a product catalog export (Shopify-style CSV: one row
//! per variant, product attributes on the first row of each handle) into the
//! CSV layout of a target marketplace, described by a declarative template.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Transform  │────▶│ Target CSV  │
//! │ (UTF8/1252) │     │  (auto-enc) │     │ (template)  │     │ (streamed)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use catalog_buddy::{prepare, TemplateRegistry, TransformRequest, VariantColumns};
//!
//! let registry = TemplateRegistry::with_dir("templates");
//! let request = TransformRequest::new(std::fs::read("products.csv")?, "noon")
//!     .with_mapping(r#"{"sku": "Variant SKU"}"#);
//! let run = prepare(request, &registry, &VariantColumns::default())?;
//! println!("{} rows", run.preview(10).total_rows);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (Template, Field, ExportRules, Mapping)
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Cleanup, binding, propagation, materialization, encoding
//! - [`registry`] - Template store
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Templates
pub mod registry;

// Transformation
pub mod transform;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{CsvError, PipelineError, RegistryError, ServerError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{ExportRules, Field, Mapping, ProductValuePolicy, Template, VariantColumns};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes, parse_file, ParseResult,
    Table,
};

// =============================================================================
// Re-exports - Registry
// =============================================================================

pub use registry::{load_template, TemplateRegistry, TemplateStore};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    parse_cleanup_columns, parse_mapping, prepare, CsvInfo, TransformRequest, Transformation,
};
pub use transform::{clean_text, encode_all, CsvChunks, Preview, TransformPlan};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::AppConfig;

// Server
pub mod server {
    pub use crate::api::server::{build_router, start_server, AppState};
}
