use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring common dataframe dtypes.
/// Cells are used as set members and dedup keys downstream, so equality,
/// ordering and hashing all agree (floats compare by `total_cmp`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.4}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Integer(v)
    }
}

impl CellValue {
    /// Interpret the value as an `f64` for numeric work.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Interpret the value as an integer code. Floats with no fractional part
    /// count, since a column with gaps is often read back as floats.
    pub fn as_code(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            CellValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Null, or a float NaN as read from Parquet or JSON.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Guess the type of a raw text cell. Empty cells and the usual
    /// missing-value markers (`NA`, `NaN`, `null`, ...) are null.
    pub fn parse(s: &str) -> CellValue {
        if s.is_empty() || MISSING_MARKERS.contains(&s) {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        if s == "true" || s == "false" {
            return CellValue::Bool(s == "true");
        }
        CellValue::String(s.to_string())
    }
}

/// Text cells read as missing, the same set pandas' `read_csv` recognises.
pub const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// ---------------------------------------------------------------------------
// Table – ordered columns + ordered records
// ---------------------------------------------------------------------------

/// One row of a table, aligned with [`Table::columns`].
pub type Record = Vec<CellValue>;

/// An in-memory table. Column labels are kept verbatim as loaded; the
/// cleaner is responsible for normalizing them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Table { columns, rows }
    }

    /// A table with the same columns and no rows.
    pub fn empty_like(&self) -> Self {
        Table {
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no records.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact label.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate one column's cells in record order.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a CellValue> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Numeric view of a column; non-numeric cells are skipped.
    pub fn numeric_column(&self, name: &str) -> Option<Vec<f64>> {
        Some(self.column(name)?.filter_map(CellValue::as_f64).collect())
    }

    /// Sorted set of distinct values in a column.
    pub fn unique_values(&self, name: &str) -> BTreeSet<CellValue> {
        self.column(name)
            .map(|cells| cells.cloned().collect())
            .unwrap_or_default()
    }

    /// Distinct values in first-seen order.
    pub fn unique_in_order(&self, name: &str) -> Vec<CellValue> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        if let Some(cells) = self.column(name) {
            for cell in cells {
                if seen.insert(cell.clone()) {
                    out.push(cell.clone());
                }
            }
        }
        out
    }

    /// Keep only the records at `indices`, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Records whose `column` equals `value`.
    pub fn rows_where(&self, column: &str, value: &CellValue) -> Table {
        let Some(idx) = self.column_index(column) else {
            return self.empty_like();
        };
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| &r[idx] == value)
                .cloned()
                .collect(),
        }
    }

    /// Give each column a single numeric type: in a column that mixes
    /// integers and floats, the integers become floats. Returns the number of
    /// columns promoted.
    pub fn promote_mixed_numeric(&mut self) -> usize {
        let mut promoted = 0;
        for idx in 0..self.columns.len() {
            let column = || self.rows.iter().filter_map(|r| r.get(idx));
            let has_float = column().any(|c| matches!(c, CellValue::Float(_)));
            let has_int = column().any(|c| matches!(c, CellValue::Integer(_)));
            if !(has_float && has_int) {
                continue;
            }
            for row in self.rows.iter_mut() {
                if let Some(CellValue::Integer(i)) = row.get(idx) {
                    row[idx] = CellValue::Float(*i as f64);
                }
            }
            promoted += 1;
        }
        promoted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_cells_have_consistent_equality() {
        assert_eq!(CellValue::Float(f64::NAN), CellValue::Float(f64::NAN));
        assert_ne!(CellValue::Integer(1), CellValue::Float(1.0));
        assert!(CellValue::Null < CellValue::Integer(-5));
    }

    #[test]
    fn parse_guesses_types() {
        assert_eq!(CellValue::parse(""), CellValue::Null);
        assert_eq!(CellValue::parse("42"), CellValue::Integer(42));
        assert_eq!(CellValue::parse("4.5"), CellValue::Float(4.5));
        assert_eq!(CellValue::parse("true"), CellValue::Bool(true));
        assert_eq!(CellValue::parse("Kenya"), CellValue::from("Kenya"));
    }

    #[test]
    fn missing_markers_parse_as_null() {
        for marker in ["NA", "N/A", "NaN", "nan", "null", "NULL", "#N/A", "None"] {
            assert_eq!(CellValue::parse(marker), CellValue::Null, "{marker}");
        }
        assert!(CellValue::Float(f64::NAN).is_missing());
        assert!(!CellValue::Float(0.0).is_missing());
        assert!(!CellValue::from("NAN").is_missing());
    }

    #[test]
    fn mixed_integer_and_float_columns_become_float() {
        let mut t = Table::new(
            vec!["Country".into(), "Year".into(), "Solar".into()],
            vec![
                vec!["Kenya".into(), CellValue::Integer(2019), CellValue::Integer(1)],
                vec!["Kenya".into(), CellValue::Integer(2019), CellValue::Float(1.0)],
                vec!["Peru".into(), CellValue::Integer(2020), CellValue::Null],
            ],
        );
        assert_eq!(t.promote_mixed_numeric(), 1);
        assert_eq!(t.rows[0], t.rows[1]);
        assert_eq!(t.rows[0][1], CellValue::Integer(2019));
        assert!(t.rows[2][2].is_null());
    }

    #[test]
    fn unique_in_order_keeps_first_seen() {
        let t = Table::new(
            vec!["c".into()],
            vec![vec!["b".into()], vec!["a".into()], vec!["b".into()]],
        );
        assert_eq!(t.unique_in_order("c"), vec![CellValue::from("b"), CellValue::from("a")]);
        assert_eq!(t.unique_values("c").len(), 2);
    }

    #[test]
    fn codes_accept_whole_floats() {
        assert_eq!(CellValue::Float(3.0).as_code(), Some(3));
        assert_eq!(CellValue::Float(3.5).as_code(), None);
        assert_eq!(CellValue::from("3").as_code(), None);
    }
}
