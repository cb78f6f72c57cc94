use std::collections::BTreeSet;

use crate::data::filter::{FilterSpec, RangeFilter};
use crate::data::model::CellValue;
use crate::error::ConfigError;
use crate::pipeline::{build_view, Dataset, DashboardView, ViewParams};

// ---------------------------------------------------------------------------
// Dashboard state
// ---------------------------------------------------------------------------

/// Selection state for one dataset, independent of rendering. Every change
/// recomputes the view from the immutable cleaned table.
pub struct DashboardState {
    pub dataset: Dataset,

    /// Current filters, value column, reducer and horizon.
    pub params: ViewParams,

    /// The view for `params`.
    pub view: DashboardView,
}

impl DashboardState {
    /// Start with `params` applied.
    pub fn new(dataset: Dataset, params: ViewParams) -> Self {
        let view = build_view(&dataset, &params);
        DashboardState {
            dataset,
            params,
            view,
        }
    }

    /// Start with everything selected and the schema's default value column.
    pub fn with_defaults(dataset: Dataset) -> Result<Self, ConfigError> {
        let value_column = dataset
            .schema
            .default_value_column()
            .ok_or_else(|| ConfigError::NoValueColumns(dataset.schema.name.clone()))?
            .to_string();
        let params = ViewParams {
            filter: FilterSpec::select_all(&dataset.table, &dataset.schema),
            value_column,
            reducer: Default::default(),
            horizon: crate::data::forecast::DEFAULT_HORIZON,
        };
        Ok(Self::new(dataset, params))
    }

    /// Recompute the view after a selection change.
    pub fn refresh(&mut self) {
        self.view = build_view(&self.dataset, &self.params);
    }

    /// Toggle a single value in a column's selection.
    pub fn toggle_filter_value(&mut self, column: &str, value: &CellValue) {
        let selected = self
            .params
            .filter
            .selections
            .entry(column.to_string())
            .or_default();
        if selected.contains(value) {
            selected.remove(value);
        } else {
            selected.insert(value.clone());
        }
        self.refresh();
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) {
        let all_vals = self.dataset.table.unique_values(column);
        self.params.filter.selections.insert(column.to_string(), all_vals);
        self.refresh();
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) {
        self.params
            .filter
            .selections
            .insert(column.to_string(), BTreeSet::new());
        self.refresh();
    }

    /// Constrain the schema's range column to `[lo, hi]`.
    pub fn set_range(&mut self, lo: f64, hi: f64) {
        if let Some(column) = &self.dataset.schema.range_column {
            self.params.filter.range = Some(RangeFilter {
                column: column.clone(),
                lo,
                hi,
            });
            self.refresh();
        }
    }

    /// Pick the value column from the schema's enumeration.
    pub fn set_value_column(&mut self, column: &str) -> Result<(), ConfigError> {
        if !self.dataset.schema.value_columns.iter().any(|c| c == column) {
            return Err(ConfigError::UnknownValueColumn(column.to_string()));
        }
        self.params.value_column = column.to_string();
        self.refresh();
        Ok(())
    }
}
