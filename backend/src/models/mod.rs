//! Domain models for the Catalog Buddy transformation engine.
//!
//! - [`Template`] - Declarative target catalog format
//! - [`Field`] - One output field of a template
//! - [`ExportRules`] - Required-field and row-drop rules
//! - [`Mapping`] - Caller-supplied field key to source column binding
//! - [`VariantColumns`] - Source columns whose values differ per variant row
//! - [`ProductValuePolicy`] - How propagated product values meet row values

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;

// =============================================================================
// Template
// =============================================================================

/// A target catalog format.
///
/// Loaded from JSON by the template registry. Keys the engine does not use
/// are preserved in `extra` so `/templates` can return the file as written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Unique key used to select the template.
    pub template_key: String,

    /// Human-readable name for pickers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,

    /// Output fields in declaration order.
    #[serde(default)]
    pub fields: Vec<Field>,

    /// Row filtering rules.
    #[serde(default)]
    pub export_rules: ExportRules,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Template {
    /// Build a template with default export rules.
    pub fn new(template_key: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            template_key: template_key.into(),
            template_name: None,
            fields,
            export_rules: ExportRules::default(),
            extra: Map::new(),
        }
    }

    pub fn with_export_rules(mut self, rules: ExportRules) -> Self {
        self.export_rules = rules;
        self
    }

    /// Display name, falling back to the key.
    pub fn display_name(&self) -> &str {
        self.template_name.as_deref().unwrap_or(&self.template_key)
    }

    /// Label of the required field, falling back to its key.
    pub fn required_label(&self) -> &str {
        let key = &self.export_rules.required_field_key;
        self.fields
            .iter()
            .find(|f| &f.key == key)
            .map(|f| f.label.as_str())
            .unwrap_or(key)
    }
}

/// One output field.
///
/// `label` is the output header and need not be unique; `key` is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub key: String,
    pub label: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    /// `"position=N"` binds an image field to the N-th product image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_map: Option<String>,
}

fn default_field_type() -> String {
    "text".to_string()
}

impl Field {
    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type: default_field_type(),
            auto_map: None,
        }
    }

    pub fn image(key: impl Into<String>, label: impl Into<String>, position: u8) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type: "image".to_string(),
            auto_map: Some(format!("position={}", position)),
        }
    }

    pub fn is_image(&self) -> bool {
        self.field_type == "image"
    }
}

/// Export rules applied while materializing rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportRules {
    /// Field whose source value decides whether a row is kept.
    #[serde(default = "default_required_key")]
    pub required_field_key: String,

    /// Field keys that drop a row when their required value is blank.
    #[serde(default)]
    pub drop_row_if_blank_keys: BTreeSet<String>,
}

fn default_required_key() -> String {
    "sku".to_string()
}

impl Default for ExportRules {
    fn default() -> Self {
        Self {
            required_field_key: default_required_key(),
            drop_row_if_blank_keys: BTreeSet::new(),
        }
    }
}

impl ExportRules {
    /// Require `key` and drop rows where it is blank.
    pub fn require(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            drop_row_if_blank_keys: BTreeSet::from([key.clone()]),
            required_field_key: key,
        }
    }

    pub fn drops_blank_required(&self) -> bool {
        self.drop_row_if_blank_keys.contains(&self.required_field_key)
    }
}

// =============================================================================
// Mapping
// =============================================================================

/// Field key to source column name, supplied once per transformation.
pub type Mapping = HashMap<String, String>;

// =============================================================================
// Variant-scoped columns
// =============================================================================

/// Shopify product export headers that carry per-variant values.
pub const SHOPIFY_VARIANT_COLUMNS: &[&str] = &[
    "Variant SKU",
    "Variant Price",
    "Variant Compare At Price",
    "Variant Barcode",
    "Variant Inventory Qty",
    "Variant Grams",
    "Variant Weight",
    "Variant Weight Unit",
    "Variant Tax Code",
    "Variant Fulfillment Service",
    "Variant Requires Shipping",
    "Variant Taxable",
    "Variant Title",
    "Variant Image",
    "Option1 Value",
    "Option2 Value",
    "Option3 Value",
    "Cost per item",
    "Inventory Policy",
    "Inventory Qty",
    "Inventory Item ID",
    "Inventory Tracker",
];

/// Closed set of source headers treated as per-variant.
///
/// Any other source column used by a mapping is per-product. Membership is
/// an exact, case-sensitive match on the mapped source name.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantColumns(HashSet<String>);

impl VariantColumns {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for VariantColumns {
    fn default() -> Self {
        Self::new(SHOPIFY_VARIANT_COLUMNS.iter().copied())
    }
}

// =============================================================================
// Product value policy
// =============================================================================

/// Which value a per-product field emits when a row has its own value and
/// the group also has a propagated one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductValuePolicy {
    /// The group's first non-blank value always wins.
    #[default]
    Product,
    /// The row's own non-blank value wins; the group value fills blanks.
    Own,
}

impl FromStr for ProductValuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "product" => Ok(ProductValuePolicy::Product),
            "own" => Ok(ProductValuePolicy::Own),
            other => Err(format!("Unknown product value policy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_deserialize_defaults() {
        let tpl: Template = serde_json::from_value(json!({
            "templateKey": "noon",
            "fields": [
                { "key": "sku", "label": "SKU" },
                { "key": "img1", "label": "Image 1", "type": "image", "autoMap": "position=1" }
            ]
        }))
        .unwrap();

        assert_eq!(tpl.display_name(), "noon");
        assert_eq!(tpl.fields[0].field_type, "text");
        assert!(tpl.fields[1].is_image());
        assert_eq!(tpl.fields[1].auto_map.as_deref(), Some("position=1"));
        assert_eq!(tpl.export_rules.required_field_key, "sku");
        assert!(!tpl.export_rules.drops_blank_required());
    }

    #[test]
    fn test_template_keeps_unknown_keys() {
        let raw = json!({
            "templateKey": "amazon",
            "templateName": "Amazon Flat File",
            "marketplace": "amazon.ae",
            "fields": [],
            "exportRules": { "requiredFieldKey": "sku", "dropRowIfBlankKeys": ["sku"] }
        });
        let tpl: Template = serde_json::from_value(raw).unwrap();
        assert_eq!(tpl.extra["marketplace"], "amazon.ae");
        assert!(tpl.export_rules.drops_blank_required());

        let back = serde_json::to_value(&tpl).unwrap();
        assert_eq!(back["marketplace"], "amazon.ae");
        assert_eq!(back["templateName"], "Amazon Flat File");
    }

    #[test]
    fn test_required_label() {
        let tpl = Template::new("t", vec![Field::text("sku", "Seller SKU")])
            .with_export_rules(ExportRules::require("sku"));
        assert_eq!(tpl.required_label(), "Seller SKU");

        let tpl = Template::new("t", vec![]);
        assert_eq!(tpl.required_label(), "sku");
    }

    #[test]
    fn test_variant_columns_exact_match() {
        let variants = VariantColumns::default();
        assert!(variants.contains("Variant SKU"));
        assert!(variants.contains("Option1 Value"));
        assert!(!variants.contains("variant sku"));
        assert!(!variants.contains("Title"));
        assert_eq!(variants.len(), SHOPIFY_VARIANT_COLUMNS.len());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("".parse::<ProductValuePolicy>(), Ok(ProductValuePolicy::Product));
        assert_eq!("OWN".parse::<ProductValuePolicy>(), Ok(ProductValuePolicy::Own));
        assert!("sometimes".parse::<ProductValuePolicy>().is_err());
    }
}
