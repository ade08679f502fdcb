//! REST API types for frontend integration.
//!
//! Preview and template listings are JSON; full exports are streamed CSV and
//! have no JSON envelope.

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::Template;
use crate::transform::encoder::Preview;

/// Response of `GET /templates`.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<Template>,
}

impl TemplateListResponse {
    pub fn new<'a>(templates: impl IntoIterator<Item = &'a Template>) -> Self {
        Self {
            templates: templates.into_iter().cloned().collect(),
        }
    }
}

/// Response of `POST /transform` with `preview=true`.
pub type PreviewResponse = Preview;

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

/// Interpret a form flag: `"true"` in any case is true.
pub fn parse_flag(raw: Option<&str>) -> bool {
    raw.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    #[test]
    fn test_error_response_shape() {
        let body = error_response("Unknown templateKey: etsy");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Unknown templateKey: etsy");
        assert_eq!(body.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_template_list_shape() {
        let tpl = Template::new("noon", vec![Field::text("sku", "SKU")]);
        let body = serde_json::to_value(TemplateListResponse::new([&tpl])).unwrap();
        assert_eq!(body["templates"][0]["templateKey"], "noon");
        assert_eq!(body["templates"][0]["fields"][0]["label"], "SKU");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("TRUE ")));
        assert!(!parse_flag(Some("1")));
        assert!(!parse_flag(Some("")));
        assert!(!parse_flag(None));
    }
}
