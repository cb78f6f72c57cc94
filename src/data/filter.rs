use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::model::{CellValue, Table};
use super::schema::DatasetSchema;

// ---------------------------------------------------------------------------
// Filter predicate: which values are selected per column, plus a range
// ---------------------------------------------------------------------------

/// Inclusive numeric range on one column, e.g. a span of years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub column: String,
    pub lo: f64,
    pub hi: f64,
}

impl RangeFilter {
    pub fn contains(&self, v: f64) -> bool {
        self.lo <= v && v <= self.hi
    }
}

/// Per-column selection state plus an optional range. All predicates are
/// ANDed. A column absent from `selections` is unconstrained; a column
/// present with an empty set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub selections: BTreeMap<String, BTreeSet<CellValue>>,
    #[serde(default)]
    pub range: Option<RangeFilter>,
}

impl FilterSpec {
    /// Everything selected: every distinct value of each filter column and
    /// the full observed span of the range column.
    pub fn select_all(table: &Table, schema: &DatasetSchema) -> Self {
        let selections = schema
            .filter_columns
            .iter()
            .map(|col| (col.clone(), table.unique_values(col)))
            .collect();

        let range = schema.range_column.as_ref().and_then(|col| {
            let values = table.numeric_column(col)?;
            let lo = values.iter().copied().reduce(f64::min)?;
            let hi = values.iter().copied().reduce(f64::max)?;
            Some(RangeFilter {
                column: col.clone(),
                lo,
                hi,
            })
        });

        FilterSpec { selections, range }
    }
}

/// Return indices of records that pass every predicate.
///
/// A record passes a column selection when:
/// * The selection set is empty → nothing selected → fails
/// * The column does not exist → passes only if `Null` is selected
/// * The record's value is in the selected set → passes
///
/// and passes the range when its value is numeric and within `[lo, hi]`.
pub fn filtered_indices(table: &Table, spec: &FilterSpec) -> Vec<usize> {
    let selections: Vec<(Option<usize>, &BTreeSet<CellValue>)> = spec
        .selections
        .iter()
        .map(|(col, selected)| (table.column_index(col), selected))
        .collect();
    let range = spec
        .range
        .as_ref()
        .map(|r| (table.column_index(&r.column), r));
    let null = CellValue::Null;

    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            for (idx, selected) in &selections {
                if selected.is_empty() {
                    return false;
                }
                let value = match idx {
                    Some(i) => &row[*i],
                    None => &null,
                };
                if !selected.contains(value) {
                    return false;
                }
            }
            match range {
                Some((Some(i), r)) => row[i].as_f64().is_some_and(|v| r.contains(v)),
                Some((None, _)) => false,
                None => true,
            }
        })
        .map(|(i, _)| i)
        .collect()
}

/// The subsequence of `table` satisfying `spec`, order preserved.
pub fn filter(table: &Table, spec: &FilterSpec) -> Table {
    table.select_rows(&filtered_indices(table, spec))
}
