//! High-level pipeline API for catalog transformation.
//!
//! Combines all steps for one request: template lookup, mapping parsing,
//! table parsing, text cleanup and plan compilation. The resulting
//! [`Transformation`] is either previewed or streamed as CSV.
//!
//! # Example
//!
//! ```rust,ignore
//! use catalog_buddy::{prepare, TemplateRegistry, TransformRequest, VariantColumns};
//!
//! let registry = TemplateRegistry::with_dir("templates");
//! let request = TransformRequest::new(std::fs::read("products.csv")?, "noon")
//!     .with_mapping(r#"{"sku": "Variant SKU", "name": "Title"}"#);
//!
//! let run = prepare(request, &registry, &VariantColumns::default())?;
//! std::fs::write("noon.csv", run.to_csv()?)?;
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::error::{CsvResult, PipelineError, PipelineResult};
use crate::models::{Mapping, ProductValuePolicy, VariantColumns};
use crate::parser::parse_bytes;
use crate::registry::TemplateStore;
use crate::transform::cleanup::clean_columns;
use crate::transform::encoder::{encode_all, CsvChunks, Preview};
use crate::transform::rows::{Rows, TransformPlan};

/// Download name used when the caller gives none.
pub const DEFAULT_FILENAME: &str = "catalog_export.csv";

/// Everything a caller sends for one transformation.
#[derive(Debug, Clone, Default)]
pub struct TransformRequest {
    /// Uploaded table bytes
    pub file: Vec<u8>,
    /// Template to transform into
    pub template_key: String,
    /// Raw JSON object of field key -> source column
    pub mapping: String,
    /// Raw JSON `{"columns": [...]}`; empty or malformed means no cleanup
    pub text_cleanup: String,
    /// Attachment filename for the streamed document
    pub filename: Option<String>,
    /// Return a preview instead of the full document
    pub preview: bool,
    /// How per-product values meet row values
    pub policy: ProductValuePolicy,
}

impl TransformRequest {
    pub fn new(file: Vec<u8>, template_key: impl Into<String>) -> Self {
        Self {
            file,
            template_key: template_key.into(),
            mapping: "{}".to_string(),
            ..Self::default()
        }
    }

    pub fn with_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.mapping = mapping.into();
        self
    }

    pub fn with_cleanup(mut self, text_cleanup: impl Into<String>) -> Self {
        self.text_cleanup = text_cleanup.into();
        self
    }

    pub fn with_policy(mut self, policy: ProductValuePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Uploaded file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// A compiled, request-local transformation.
#[derive(Debug, Clone)]
pub struct Transformation {
    /// Identifier used in logs
    pub run_id: String,
    pub template_key: String,
    pub filename: String,
    pub csv_info: CsvInfo,
    /// Headers that text cleanup was applied to
    pub cleaned_columns: Vec<String>,
    plan: Arc<TransformPlan>,
}

impl Transformation {
    pub fn headers(&self) -> &[String] {
        self.plan.headers()
    }

    /// Materialize all rows and keep the first `limit`.
    pub fn preview(&self, limit: usize) -> Preview {
        let preview = Preview::collect(
            self.headers().to_vec(),
            self.plan.iter(),
            limit,
            &self.template_key,
        );
        log_dropped(&self.run_id, self.csv_info.row_count, preview.total_rows);
        preview
    }

    /// Lazy output rows.
    pub fn rows(&self) -> Rows {
        Arc::clone(&self.plan).into_rows()
    }

    /// Lazy CSV chunks: BOM, header line, one chunk per row.
    pub fn stream(&self) -> CsvChunks<Rows> {
        CsvChunks::new(self.headers().to_vec(), self.rows())
    }

    /// Whole document in memory.
    pub fn to_csv(&self) -> CsvResult<Vec<u8>> {
        encode_all(self.headers().to_vec(), self.rows())
    }
}

fn log_dropped(run_id: &str, input_rows: usize, kept: usize) {
    if kept < input_rows {
        log_warning(format!(
            "[{}] {} row(s) dropped (blank required field)",
            run_id,
            input_rows - kept
        ));
    }
    log_success(format!("[{}] {} output row(s)", run_id, kept));
}

/// Parse the caller's mapping payload.
///
/// Must be a JSON object; `null` and empty values leave a field unmapped.
pub fn parse_mapping(raw: &str) -> PipelineResult<Mapping> {
    let obj: Map<String, Value> =
        serde_json::from_str(raw).map_err(|e| PipelineError::InvalidMapping(e.to_string()))?;

    let mut mapping = Mapping::new();
    for (key, value) in obj {
        match value {
            Value::String(source) if !source.is_empty() => {
                mapping.insert(key, source);
            }
            Value::String(_) | Value::Null => {}
            other => {
                return Err(PipelineError::InvalidMapping(format!(
                    "value for '{}' must be a column name, got {}",
                    key, other
                )))
            }
        }
    }

    Ok(mapping)
}

/// Parse the cleanup payload `{"columns": [...]}`.
///
/// Cleanup is optional, so an empty or malformed payload means none.
pub fn parse_cleanup_columns(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let parsed: Result<Value, _> = serde_json::from_str(raw);
    match parsed.as_ref().ok().and_then(|v| v.get("columns")).and_then(Value::as_array) {
        Some(columns) => columns
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        None => {
            log_warning("Ignoring malformed textCleanup payload");
            Vec::new()
        }
    }
}

/// Make a filename safe for a `Content-Disposition` header.
pub fn sanitize_filename(name: Option<&str>) -> String {
    let cleaned: String = name
        .unwrap_or("")
        .trim()
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' | '\r' | '\n' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned
    }
}

/// Validate a request and compile its plan.
///
/// Fails only on client input errors: unknown template, malformed mapping,
/// undecodable table. Everything else degrades to empty values.
pub fn prepare(
    request: TransformRequest,
    store: &dyn TemplateStore,
    variants: &VariantColumns,
) -> PipelineResult<Transformation> {
    let run_id = Uuid::new_v4().to_string()[..8].to_string();

    let template = store
        .get(&request.template_key)
        .ok_or_else(|| PipelineError::UnknownTemplate(request.template_key.clone()))?;
    let mapping = parse_mapping(&request.mapping)?;
    let cleanup = parse_cleanup_columns(&request.text_cleanup);

    log_info(format!(
        "[{}] 📖 Reading upload ({} bytes) for template '{}'",
        run_id,
        request.file.len(),
        template.display_name()
    ));
    let parsed = parse_bytes(&request.file)?;
    let csv_info = CsvInfo {
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        headers: parsed.table.headers().to_vec(),
        row_count: parsed.table.len(),
    };
    log_info_indent(
        format!(
            "encoding {}, delimiter '{}', {} columns, {} rows",
            csv_info.encoding,
            format_delimiter(csv_info.delimiter),
            csv_info.headers.len(),
            csv_info.row_count
        ),
        1,
    );

    let mut table = parsed.table;
    let cleaned_columns = clean_columns(&mut table, &cleanup);
    if !cleaned_columns.is_empty() {
        log_info_indent(format!("text cleanup: {}", cleaned_columns.join(", ")), 1);
    }

    let plan = TransformPlan::new(table, template, &mapping, variants, request.policy);
    let stats = plan.stats();
    log_info(format!(
        "[{}] 🗺️  {} output column(s): {} variant, {} product, {} image",
        run_id,
        stats.output_columns,
        stats.variant_columns,
        stats.product_columns,
        stats.image_columns
    ));
    log_info_indent(
        format!(
            "{} image slot(s) across {} product(s), {} propagated field(s)",
            stats.image_slots, stats.image_handles, stats.propagated_fields
        ),
        1,
    );
    if stats.missing_sources > 0 {
        log_warning(format!(
            "[{}] {} mapped source column(s) not in upload, emitted empty",
            run_id, stats.missing_sources
        ));
    }
    if plan.drops_every_row() {
        log_warning(format!(
            "[{}] required field '{}' has no source column, every row will be dropped",
            run_id,
            template.required_label()
        ));
    }

    Ok(Transformation {
        run_id,
        template_key: template.template_key.clone(),
        filename: sanitize_filename(request.filename.as_deref()),
        csv_info,
        cleaned_columns,
        plan: Arc::new(plan),
    })
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CsvError;
    use crate::models::{ExportRules, Field, Template};
    use crate::registry::TemplateRegistry;
    use crate::transform::encoder::UTF8_BOM;

    const PRODUCTS: &str = "Handle,Title,Body (HTML),Variant SKU,Image Src,Image Position\n\
        tee,Tee,<p>Soft &amp; warm</p>,TEE-S,tee1.png,1\n\
        tee,,,TEE-M,tee2.png,2\n\
        tee,,,,tee3.png,3\n\
        mug,Mug,<b>Big</b>,MUG-1,mug1.png,1\n";

    fn registry() -> TemplateRegistry {
        TemplateRegistry::from_templates(vec![Template::new(
            "noon",
            vec![
                Field::text("sku", "SKU"),
                Field::text("name", "Title"),
                Field::text("desc", "Description"),
                Field::image("img1", "Main Image", 1),
                Field::image("img2", "Image 2", 2),
            ],
        )
        .with_export_rules(ExportRules::require("sku"))])
    }

    fn request() -> TransformRequest {
        TransformRequest::new(PRODUCTS.as_bytes().to_vec(), "noon").with_mapping(
            r#"{"sku": "Variant SKU", "name": "Title", "desc": "Body (HTML)"}"#,
        )
    }

    #[test]
    fn test_end_to_end_csv() {
        let run = prepare(
            request().with_cleanup(r#"{"columns": ["Body (HTML)"]}"#),
            &registry(),
            &VariantColumns::default(),
        )
        .unwrap();

        assert_eq!(run.cleaned_columns, vec!["Body (HTML)"]);
        assert_eq!(run.filename, DEFAULT_FILENAME);

        let bytes = run.to_csv().unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap();
        assert_eq!(
            text,
            "SKU,Title,Description,Main Image,Image 2\r\n\
             TEE-S,Tee,Soft & warm,tee1.png,tee2.png\r\n\
             TEE-M,Tee,Soft & warm,tee1.png,tee2.png\r\n\
             MUG-1,Mug,Big,mug1.png,\r\n"
        );
    }

    #[test]
    fn test_preview_reports_post_drop_total() {
        let run = prepare(request(), &registry(), &VariantColumns::default()).unwrap();
        let preview = run.preview(2);

        assert_eq!(preview.total_rows, 3);
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.template_key, "noon");
        assert_eq!(preview.headers.len(), 5);
        assert_eq!(preview.rows[1][1], "Tee");
    }

    #[test]
    fn test_stream_matches_to_csv() {
        let run = prepare(request(), &registry(), &VariantColumns::default()).unwrap();
        let streamed: Vec<u8> = run
            .stream()
            .collect::<CsvResult<Vec<_>>>()
            .unwrap()
            .concat();
        assert_eq!(streamed, run.to_csv().unwrap());
    }

    #[test]
    fn test_unknown_template() {
        let mut req = request();
        req.template_key = "etsy".into();
        let err = prepare(req, &registry(), &VariantColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTemplate(k) if k == "etsy"));
    }

    #[test]
    fn test_invalid_mapping() {
        let err = prepare(
            request().with_mapping("{not json"),
            &registry(),
            &VariantColumns::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidMapping(_)));
    }

    #[test]
    fn test_empty_upload_is_csv_error() {
        let req = TransformRequest::new(Vec::new(), "noon");
        let err = prepare(req, &registry(), &VariantColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Csv(CsvError::EmptyFile)));
    }

    #[test]
    fn test_auto_image_required_field_drops_all_rows() {
        let store = TemplateRegistry::from_templates(vec![Template::new(
            "img",
            vec![Field::image("sku", "SKU", 1), Field::text("name", "Title")],
        )
        .with_export_rules(ExportRules::require("sku"))]);
        let mut req = request();
        req.template_key = "img".into();

        let run = prepare(req, &store, &VariantColumns::default()).unwrap();
        assert!(run.rows().next().is_none());
        assert_eq!(run.preview(10).total_rows, 0);
    }

    #[test]
    fn test_parse_mapping() {
        let m = parse_mapping(r#"{"sku": "Variant SKU", "name": "", "vendor": null}"#).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m["sku"], "Variant SKU");

        assert!(parse_mapping("[]").is_err());
        assert!(parse_mapping(r#"{"sku": 3}"#).is_err());
    }

    #[test]
    fn test_parse_cleanup_columns() {
        assert!(parse_cleanup_columns("").is_empty());
        assert!(parse_cleanup_columns("not json").is_empty());
        assert!(parse_cleanup_columns(r#"{"cols": ["x"]}"#).is_empty());
        assert_eq!(
            parse_cleanup_columns(r#"{"columns": ["Body (HTML)", 4, "Title"]}"#),
            vec!["Body (HTML)", "Title"]
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(None), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename(Some("  ")), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename(Some("noon.csv")), "noon.csv");
        assert_eq!(
            sanitize_filename(Some("a\"b\r\nc/../d.csv")),
            "a_b__c_.._d.csv"
        );
    }
}
