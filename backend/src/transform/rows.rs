//! Row materialization.
//!
//! A [`TransformPlan`] owns everything one transformation needs: the input
//! table, compiled output columns, image slots and propagated product
//! values. Rows are produced lazily by [`Rows`], which holds the plan behind
//! an `Arc` so it can be handed to a streaming response body.

use std::sync::Arc;

use crate::models::{Mapping, ProductValuePolicy, Template, VariantColumns};
use crate::parser::Table;
use crate::transform::fields::{FieldBinding, FieldLayout};
use crate::transform::images::ImageSlots;
use crate::transform::propagate::{row_handles, ProductValues};

/// Value source of one output column, resolved against the input headers.
#[derive(Debug, Clone, PartialEq)]
enum CompiledColumn {
    /// Variant-scoped source: each row emits its own value.
    Variant { col: Option<usize> },
    /// Per-product source: rows of a handle share the propagated value.
    Product { key: String, col: Option<usize> },
    /// Image at a fixed position of the row's handle.
    Image { position: i64 },
}

/// Counters describing a compiled plan, for logs and previews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub input_rows: usize,
    pub output_columns: usize,
    pub variant_columns: usize,
    pub product_columns: usize,
    pub image_columns: usize,
    pub missing_sources: usize,
    pub image_handles: usize,
    pub image_slots: usize,
    pub propagated_fields: usize,
}

/// Request-local state of one transformation.
#[derive(Debug, Clone)]
pub struct TransformPlan {
    table: Table,
    handles: Vec<String>,
    headers: Vec<String>,
    columns: Vec<CompiledColumn>,
    images: ImageSlots,
    product_values: ProductValues,
    required_col: Option<usize>,
    drop_blank_required: bool,
    policy: ProductValuePolicy,
}

impl TransformPlan {
    /// Compile a plan. `table` should already have cleanup applied.
    pub fn new(
        table: Table,
        template: &Template,
        mapping: &Mapping,
        variants: &VariantColumns,
        policy: ProductValuePolicy,
    ) -> Self {
        let layout = FieldLayout::build(template, mapping);
        let handles = row_handles(&table);
        let images = ImageSlots::collect(&table);

        let mut product_values = ProductValues::default();
        let columns = layout
            .columns
            .iter()
            .map(|column| match &column.binding {
                FieldBinding::Mapped { source } if variants.contains(source) => {
                    CompiledColumn::Variant {
                        col: table.resolve(source),
                    }
                }
                FieldBinding::Mapped { source } => {
                    let col = table.resolve(source);
                    if let Some(col) = col {
                        product_values.insert_field(&table, &handles, &column.key, col);
                    }
                    CompiledColumn::Product {
                        key: column.key.clone(),
                        col,
                    }
                }
                FieldBinding::AutoImage { position } => CompiledColumn::Image {
                    position: *position,
                },
                // FieldLayout only emits bound columns.
                FieldBinding::Unbound => CompiledColumn::Variant { col: None },
            })
            .collect();

        let rules = &template.export_rules;
        let required_col = layout
            .mapped_source(&rules.required_field_key)
            .and_then(|source| table.resolve(source));

        Self {
            headers: layout.headers(),
            drop_blank_required: rules.drops_blank_required(),
            table,
            handles,
            columns,
            images,
            product_values,
            required_col,
            policy,
        }
    }

    /// Output header labels.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn input_rows(&self) -> usize {
        self.table.len()
    }

    pub fn stats(&self) -> PlanStats {
        let mut stats = PlanStats {
            input_rows: self.table.len(),
            output_columns: self.columns.len(),
            image_handles: self.images.handle_count(),
            image_slots: self.images.slot_count(),
            propagated_fields: self.product_values.field_count(),
            ..PlanStats::default()
        };
        for column in &self.columns {
            match column {
                CompiledColumn::Variant { col } => {
                    stats.variant_columns += 1;
                    stats.missing_sources += usize::from(col.is_none());
                }
                CompiledColumn::Product { col, .. } => {
                    stats.product_columns += 1;
                    stats.missing_sources += usize::from(col.is_none());
                }
                CompiledColumn::Image { .. } => stats.image_columns += 1,
            }
        }
        stats
    }

    /// True when the drop rule is active but the required field has no
    /// readable source column, so no row can be kept.
    pub fn drops_every_row(&self) -> bool {
        self.drop_blank_required && self.required_col.is_none()
    }

    /// Output row for input row `idx`, or `None` when the row is dropped
    /// because its required value is blank.
    pub fn materialize(&self, idx: usize) -> Option<Vec<String>> {
        let handle = self.handles[idx].as_str();

        let required = self
            .required_col
            .map(|col| self.table.cell(idx, col).trim())
            .unwrap_or("");
        if required.is_empty() && self.drop_blank_required {
            return None;
        }

        let row = self
            .columns
            .iter()
            .map(|column| match column {
                CompiledColumn::Variant { col } => self.own_value(idx, *col).to_string(),
                CompiledColumn::Product { key, col } => {
                    let own = self.own_value(idx, *col);
                    let product = self.product_values.get(key, handle);
                    match (self.policy, product) {
                        (ProductValuePolicy::Own, _) if !own.is_empty() => own.to_string(),
                        (_, Some(value)) => value.to_string(),
                        (_, None) => own.to_string(),
                    }
                }
                CompiledColumn::Image { position } => self
                    .images
                    .get(handle, *position)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect();

        Some(row)
    }

    fn own_value(&self, idx: usize, col: Option<usize>) -> &str {
        col.map(|c| self.table.cell(idx, c).trim()).unwrap_or("")
    }

    /// Borrowing iterator over kept output rows, in input order.
    pub fn iter(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        (0..self.table.len()).filter_map(move |idx| self.materialize(idx))
    }

    /// Owning, single-pass iterator over kept output rows.
    pub fn into_rows(self: Arc<Self>) -> Rows {
        Rows { plan: self, next: 0 }
    }
}

/// Lazy output rows of a shared plan.
///
/// Not restartable: each call to `next` advances through the input once.
#[derive(Debug)]
pub struct Rows {
    plan: Arc<TransformPlan>,
    next: usize,
}

impl Rows {
    /// Output headers of the underlying plan.
    pub fn headers(&self) -> &[String] {
        self.plan.headers()
    }
}

impl Iterator for Rows {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.plan.input_rows() {
            let idx = self.next;
            self.next += 1;
            if let Some(row) = self.plan.materialize(idx) {
                return Some(row);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.plan.input_rows() - self.next))
    }
}
