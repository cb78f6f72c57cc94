//! Cleaning turns a raw loaded table into the immutable table every later
//! stage reads. Each step is idempotent on already-clean input.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info, warn};
use serde::Serialize;

use super::model::{CellValue, Table};
use super::schema::{CategoryMap, DatasetSchema};
use crate::error::SchemaError;

/// Counters collected while cleaning, for logging and for the presenter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub input_rows: usize,
    pub duplicates_removed: usize,
    pub cells_filled: usize,
    /// Column → number of codes without a label.
    pub unmapped_codes: BTreeMap<String, usize>,
    pub totals_reconciled: usize,
    pub output_rows: usize,
}

/// Run every cleaning step in order and project the schema's focus columns.
pub fn clean(table: Table, schema: &DatasetSchema) -> Result<(Table, CleanReport), SchemaError> {
    let mut report = CleanReport {
        input_rows: table.len(),
        ..CleanReport::default()
    };

    let table = dedupe(table);
    report.duplicates_removed = report.input_rows - table.len();

    let table = normalize_columns(table)?;
    require_columns(&table, &schema.required)?;

    let (table, filled) = fill_missing(table, &schema.numeric)?;
    report.cells_filled = filled;

    let (table, unmapped) = recode_categories(table, &schema.categories);
    report.unmapped_codes = unmapped;

    let table = match &schema.total_column {
        Some(total) if !schema.component_columns.is_empty() => {
            let (table, fixed) = reconcile_total(table, &schema.component_columns, total)?;
            report.totals_reconciled = fixed;
            table
        }
        _ => table,
    };

    let table = project(table, &schema.focus_columns)?;
    report.output_rows = table.len();

    for (column, count) in &report.unmapped_codes {
        warn!("{count} value(s) in \"{column}\" have no category label and were left null");
    }
    info!(
        "cleaned {}: {} -> {} rows ({} duplicates, {} cells filled, {} totals reconciled)",
        schema.name,
        report.input_rows,
        report.output_rows,
        report.duplicates_removed,
        report.cells_filled,
        report.totals_reconciled
    );

    Ok((table, report))
}

/// Drop records identical across all columns, keeping the first occurrence.
pub fn dedupe(table: Table) -> Table {
    let Table { columns, rows } = table;
    let mut seen = HashSet::with_capacity(rows.len());
    let rows: Vec<_> = rows
        .into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect();
    Table { columns, rows }
}

/// Trim whitespace around column labels.
pub fn normalize_columns(table: Table) -> Result<Table, SchemaError> {
    let Table { columns, rows } = table;
    let mut seen = HashSet::with_capacity(columns.len());
    let mut normalized = Vec::with_capacity(columns.len());
    for col in columns {
        let trimmed = col.trim().to_string();
        if !seen.insert(trimmed.clone()) {
            return Err(SchemaError::DuplicateColumn(trimmed));
        }
        normalized.push(trimmed);
    }
    Ok(Table {
        columns: normalized,
        rows,
    })
}

pub fn require_columns(table: &Table, required: &[String]) -> Result<(), SchemaError> {
    match required.iter().find(|c| table.column_index(c).is_none()) {
        Some(missing) => Err(SchemaError::MissingColumn(missing.clone())),
        None => Ok(()),
    }
}

/// Replace missing values (nulls and float NaN) with zero and coerce
/// `numeric` columns to floats.
///
/// Numeric columns get `0.0`; any other column gets integer `0`, so a missing
/// category code becomes code 0 and later recodes to a null label.
pub fn fill_missing(table: Table, numeric: &[String]) -> Result<(Table, usize), SchemaError> {
    let numeric_idx = indices(&table, numeric)?;
    let Table { columns, mut rows } = table;
    let mut filled = 0;

    for (row_no, row) in rows.iter_mut().enumerate() {
        for (col_idx, cell) in row.iter_mut().enumerate() {
            let is_numeric = numeric_idx.contains(&col_idx);
            if cell.is_missing() {
                *cell = if is_numeric {
                    CellValue::Float(0.0)
                } else {
                    CellValue::Integer(0)
                };
                filled += 1;
            } else if is_numeric {
                match cell.as_f64() {
                    Some(v) => *cell = CellValue::Float(v),
                    None => {
                        return Err(SchemaError::NotNumeric {
                            column: columns[col_idx].clone(),
                            row: row_no,
                            value: cell.to_string(),
                        })
                    }
                }
            }
        }
    }

    if filled > 0 {
        debug!("filled {filled} missing cells with 0");
    }
    Ok((Table { columns, rows }, filled))
}

/// Replace integer codes with labels. Codes missing from a map, and values
/// that are not codes at all, become null.
pub fn recode_categories(
    table: Table,
    maps: &BTreeMap<String, CategoryMap>,
) -> (Table, BTreeMap<String, usize>) {
    let Table { columns, mut rows } = table;
    let mut unmapped = BTreeMap::new();

    for (name, map) in maps {
        let Some(idx) = columns.iter().position(|c| c == name) else {
            continue;
        };
        for row in rows.iter_mut() {
            let cell = &mut row[idx];
            // Already a label from a previous pass.
            if let CellValue::String(s) = &*cell {
                if map.values().any(|label| label == s) {
                    continue;
                }
            }
            if cell.is_null() {
                continue;
            }
            *cell = match cell.as_code().and_then(|code| map.get(&code)) {
                Some(label) => CellValue::String(label.clone()),
                None => {
                    *unmapped.entry(name.clone()).or_insert(0) += 1;
                    CellValue::Null
                }
            };
        }
    }

    (Table { columns, rows }, unmapped)
}

/// Overwrite `total` with the sum of `components` wherever they differ.
pub fn reconcile_total(
    table: Table,
    components: &[String],
    total: &str,
) -> Result<(Table, usize), SchemaError> {
    let component_idx = indices(&table, components)?;
    let total_idx = table
        .column_index(total)
        .ok_or_else(|| SchemaError::MissingColumn(total.to_string()))?;

    let Table { columns, mut rows } = table;
    let mut fixed = 0;
    for row in rows.iter_mut() {
        let sum: f64 = component_idx
            .iter()
            .map(|&i| row[i].as_f64().unwrap_or(0.0))
            .sum();
        if row[total_idx].as_f64() != Some(sum) {
            row[total_idx] = CellValue::Float(sum);
            fixed += 1;
        }
    }

    if fixed > 0 {
        debug!("recomputed \"{total}\" on {fixed} rows");
    }
    Ok((Table { columns, rows }, fixed))
}

/// Keep only `focus` columns, in that order. An empty focus keeps everything.
pub fn project(table: Table, focus: &[String]) -> Result<Table, SchemaError> {
    if focus.is_empty() {
        return Ok(table);
    }
    let keep = indices(&table, focus)?;
    let rows = table
        .rows
        .into_iter()
        .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
        .collect();
    Ok(Table {
        columns: focus.to_vec(),
        rows,
    })
}

fn indices(table: &Table, names: &[String]) -> Result<Vec<usize>, SchemaError> {
    names
        .iter()
        .map(|n| {
            table
                .column_index(n)
                .ok_or_else(|| SchemaError::MissingColumn(n.clone()))
        })
        .collect()
}
