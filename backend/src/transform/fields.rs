//! Template field classification and output header construction.
//!
//! Every template field is resolved once into a [`FieldBinding`]:
//!
//! | Field                                        | Binding            |
//! |----------------------------------------------|--------------------|
//! | `type: "image"`, `autoMap: "position=N"`, N≠0 | `AutoImage(N)`     |
//! | `type: "image"` with a malformed `autoMap`    | `Unbound`          |
//! | key mapped to a non-empty source column      | `Mapped(source)`   |
//! | anything else                                | `Unbound`          |
//!
//! Output columns are the bound fields in declaration order, keeping only
//! the first bound field per label.

use std::collections::HashSet;

use crate::models::{Field, Mapping, Template};

/// How a template field gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldBinding {
    /// Read from a source column named by the caller's mapping.
    Mapped { source: String },
    /// Filled from the product's image at a fixed position.
    AutoImage { position: i64 },
    /// Contributes nothing to the output.
    Unbound,
}

impl FieldBinding {
    /// Classify one field against the mapping.
    pub fn classify(field: &Field, mapping: &Mapping) -> Self {
        if let Some(auto) = field.auto_map.as_deref().filter(|a| !a.is_empty()) {
            if field.is_image() {
                return match parse_auto_position(auto) {
                    Some(position) => FieldBinding::AutoImage { position },
                    None => FieldBinding::Unbound,
                };
            }
        }

        match mapping.get(&field.key) {
            Some(source) if !source.is_empty() => FieldBinding::Mapped {
                source: source.clone(),
            },
            _ => FieldBinding::Unbound,
        }
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self, FieldBinding::Unbound)
    }
}

/// Position after the last `=` of an `autoMap` value; zero is rejected.
fn parse_auto_position(auto_map: &str) -> Option<i64> {
    let suffix = auto_map.rsplit('=').next()?;
    suffix.trim().parse::<i64>().ok().filter(|p| *p != 0)
}

/// A field that produces an output column.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub key: String,
    pub label: String,
    pub binding: FieldBinding,
}

/// Classified template fields plus the output header layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    /// Bindings aligned with the template's field list.
    pub bindings: Vec<(String, FieldBinding)>,
    /// Output columns aligned 1:1 with `headers()`.
    pub columns: Vec<OutputColumn>,
}

impl FieldLayout {
    pub fn build(template: &Template, mapping: &Mapping) -> Self {
        let bindings: Vec<(String, FieldBinding)> = template
            .fields
            .iter()
            .map(|f| (f.key.clone(), FieldBinding::classify(f, mapping)))
            .collect();

        let mut seen_labels: HashSet<&str> = HashSet::new();
        let mut columns = Vec::new();
        for (field, (_, binding)) in template.fields.iter().zip(&bindings) {
            if !binding.is_bound() || !seen_labels.insert(field.label.as_str()) {
                continue;
            }
            columns.push(OutputColumn {
                key: field.key.clone(),
                label: field.label.clone(),
                binding: binding.clone(),
            });
        }

        Self { bindings, columns }
    }

    /// Output header labels, unique and in template order.
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }

    /// Source column mapped to `key`, when that field is a mapped field.
    ///
    /// Fields suppressed by a repeated label still count here.
    pub fn mapped_source(&self, key: &str) -> Option<&str> {
        self.bindings.iter().find_map(|(k, binding)| match binding {
            FieldBinding::Mapped { source } if k == key => Some(source.as_str()),
            _ => None,
        })
    }
}
