use std::cmp::Ordering;
use std::collections::HashMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::forecast::XAxis;
use super::model::{CellValue, Table};
use super::schema::{LineSpec, ScatterSpec};

// ---------------------------------------------------------------------------
// Grouped reduction
// ---------------------------------------------------------------------------

/// A pure aggregation applied within a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    #[default]
    Sum,
    Mean,
    Count,
    Min,
    Max,
}

impl Reducer {
    pub fn name(self) -> &'static str {
        match self {
            Reducer::Sum => "sum",
            Reducer::Mean => "mean",
            Reducer::Count => "count",
            Reducer::Min => "min",
            Reducer::Max => "max",
        }
    }

    fn reduce(self, values: &[f64]) -> f64 {
        match self {
            Reducer::Sum => values.iter().sum(),
            Reducer::Count => values.len() as f64,
            Reducer::Mean if values.is_empty() => f64::NAN,
            Reducer::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupValue {
    pub key: CellValue,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedResult {
    pub key_column: String,
    pub value_column: String,
    pub reducer: Reducer,
    /// Sorted by value, largest first; equal values keep first-seen order.
    pub groups: Vec<GroupValue>,
}

/// Group rows by `key`, reduce the numeric `value` column per group, and sort
/// descending. Unknown columns produce an empty result.
pub fn group_reduce(table: &Table, key: &str, value: &str, reducer: Reducer) -> GroupedResult {
    let mut order: Vec<CellValue> = Vec::new();
    let mut buckets: HashMap<CellValue, Vec<f64>> = HashMap::new();

    if let (Some(k), Some(v)) = (table.column_index(key), table.column_index(value)) {
        for row in &table.rows {
            let bucket = buckets.entry(row[k].clone()).or_insert_with(|| {
                order.push(row[k].clone());
                Vec::new()
            });
            if let Some(x) = row[v].as_f64() {
                bucket.push(x);
            }
        }
    }

    let mut groups: Vec<GroupValue> = order
        .into_iter()
        .map(|key| {
            let value = reducer.reduce(&buckets[&key]);
            GroupValue { key, value }
        })
        .collect();
    // Stable sort keeps first-seen order among ties.
    groups.sort_by(|a, b| descending(a.value, b.value));

    GroupedResult {
        key_column: key.to_string(),
        value_column: value.to_string(),
        reducer,
        groups,
    }
}

/// Largest first. `-0.0` ties with `0.0` and NaN sorts after every number.
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}

// ---------------------------------------------------------------------------
// Descriptive statistics
// ---------------------------------------------------------------------------

/// One row of a `describe()` table. Everything but `count` is `None` when the
/// column has no values; `std` also needs at least two.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (N-1 denominator).
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnStats {
    fn empty(column: &str) -> Self {
        ColumnStats {
            column: column.to_string(),
            count: 0,
            mean: None,
            std: None,
            min: None,
            q25: None,
            q50: None,
            q75: None,
            max: None,
        }
    }
}

pub fn describe(table: &Table, columns: &[String]) -> Vec<ColumnStats> {
    columns
        .iter()
        .map(|name| {
            let values = table.numeric_column(name).unwrap_or_default();
            describe_values(name, values)
        })
        .collect()
}

fn describe_values(column: &str, mut values: Vec<f64>) -> ColumnStats {
    if values.is_empty() {
        return ColumnStats::empty(column);
    }
    values.sort_by(f64::total_cmp);

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = (n > 1).then(|| {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    });

    ColumnStats {
        column: column.to_string(),
        count: n,
        mean: Some(mean),
        std,
        min: values.first().copied(),
        q25: Some(percentile(&values, 0.25)),
        q50: Some(percentile(&values, 0.50)),
        q75: Some(percentile(&values, 0.75)),
        max: values.last().copied(),
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = idx - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// Pairwise Pearson correlations. `values[i][j]` pairs `columns[i]` with
/// `columns[j]`. Undefined off-diagonal entries (a constant column) are NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }
}

/// Correlate `columns` over rows where all of them are numeric. Meant to run
/// on the full cleaned table rather than a filtered view.
pub fn correlation_matrix(table: &Table, columns: &[String]) -> CorrelationMatrix {
    let idx: Vec<Option<usize>> = columns.iter().map(|c| table.column_index(c)).collect();
    let mut series: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];

    if idx.iter().all(Option::is_some) {
        for row in &table.rows {
            let values: Option<Vec<f64>> =
                idx.iter().flatten().map(|&i| row[i].as_f64()).collect();
            if let Some(values) = values {
                for (s, v) in series.iter_mut().zip(values) {
                    s.push(v);
                }
            }
        }
    }

    let k = columns.len();
    let mut values = vec![vec![f64::NAN; k]; k];
    for i in 0..k {
        values[i][i] = 1.0;
        for j in (i + 1)..k {
            let r = pearson(&series[i], &series[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    }
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return f64::NAN;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa == 0.0 || sbb == 0.0 {
        return f64::NAN;
    }
    (sab / (saa * sbb).sqrt()).clamp(-1.0, 1.0)
}

// ---------------------------------------------------------------------------
// Chart tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub group: CellValue,
    pub column: String,
    pub points: Vec<(f64, f64)>,
}

/// One series per (group, y column), groups in first-seen order. With
/// `XAxis::Index` the x value restarts at 0 inside each group.
pub fn line_series(table: &Table, spec: &LineSpec) -> Vec<Series> {
    let Some(g) = table.column_index(&spec.group_by) else {
        return Vec::new();
    };
    let x_idx = match &spec.x {
        XAxis::Index => None,
        XAxis::Column(name) => match table.column_index(name) {
            Some(i) => Some(i),
            None => return Vec::new(),
        },
    };

    let mut out = Vec::new();
    for group in table.unique_in_order(&spec.group_by) {
        let rows: Vec<_> = table.rows.iter().filter(|r| r[g] == group).collect();
        for column in &spec.y {
            let Some(y) = table.column_index(column) else {
                continue;
            };
            let points = rows
                .iter()
                .enumerate()
                .filter_map(|(i, row)| {
                    let x = match x_idx {
                        Some(xi) => row[xi].as_f64()?,
                        None => i as f64,
                    };
                    Some((x, row[y].as_f64()?))
                })
                .collect();
            out.push(Series {
                group: group.clone(),
                column: column.clone(),
                points,
            });
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub hue: Option<CellValue>,
    pub style: Option<CellValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scatter {
    pub x: String,
    pub y: String,
    pub points: Vec<ScatterPoint>,
}

/// One point per record with numeric x and y.
pub fn scatter_points(table: &Table, spec: &ScatterSpec) -> Scatter {
    let col = |name: &Option<String>| name.as_ref().and_then(|n| table.column_index(n));
    let (hue, style) = (col(&spec.hue), col(&spec.style));

    let points = match (table.column_index(&spec.x), table.column_index(&spec.y)) {
        (Some(xi), Some(yi)) => table
            .rows
            .iter()
            .filter_map(|row| {
                Some(ScatterPoint {
                    x: row[xi].as_f64()?,
                    y: row[yi].as_f64()?,
                    hue: hue.map(|i| row[i].clone()),
                    style: style.map(|i| row[i].clone()),
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    Scatter {
        x: spec.x.clone(),
        y: spec.y.clone(),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projects() -> Table {
        let rows = [
            ("Wind", 5.0, 1.0),
            ("Solar", 10.0, 2.0),
            ("Hydro", 4.0, 3.0),
            ("Wind", 5.0, 4.0),
            ("Tidal", 10.0, 6.0),
        ]
        .iter()
        .map(|(k, v, w)| vec![CellValue::from(*k), CellValue::Float(*v), CellValue::Float(*w)])
        .collect();
        Table::new(vec!["Kind".into(), "Output".into(), "Cost".into()], rows)
    }

    #[test]
    fn grouped_sum_sorts_descending_with_stable_ties() {
        let result = group_reduce(&projects(), "Kind", "Output", Reducer::Sum);
        let keys: Vec<String> = result.groups.iter().map(|g| g.key.to_string()).collect();
        // Wind, Solar and Tidal all total 10; first-seen order decides.
        assert_eq!(keys, vec!["Wind", "Solar", "Tidal", "Hydro"]);
        for pair in result.groups.windows(2) {
            assert!(pair[0].value >= pair[1].value);
        }
    }

    #[test]
    fn signed_zeros_tie_in_first_seen_order() {
        let t = Table::new(
            vec!["Kind".into(), "Output".into()],
            vec![
                vec!["A".into(), CellValue::Float(-0.0)],
                vec!["B".into(), CellValue::Float(0.0)],
            ],
        );
        let result = group_reduce(&t, "Kind", "Output", Reducer::Sum);
        let keys: Vec<String> = result.groups.iter().map(|g| g.key.to_string()).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn mean_of_group_without_numbers_sorts_last() {
        let t = Table::new(
            vec!["Kind".into(), "Output".into()],
            vec![
                vec!["Blank".into(), CellValue::from("n/a")],
                vec!["Low".into(), CellValue::Float(-3.0)],
                vec!["High".into(), CellValue::Float(7.0)],
            ],
        );
        let result = group_reduce(&t, "Kind", "Output", Reducer::Mean);
        let keys: Vec<String> = result.groups.iter().map(|g| g.key.to_string()).collect();
        assert_eq!(keys, vec!["High", "Low", "Blank"]);
        assert!(result.groups[2].value.is_nan());
    }

    #[test]
    fn reducer_names_parse_from_the_command_line() {
        for reducer in [Reducer::Sum, Reducer::Mean, Reducer::Count, Reducer::Min, Reducer::Max] {
            assert_eq!(Reducer::from_str(reducer.name(), true), Ok(reducer));
        }
    }

    #[test]
    fn other_reducers() {
        let t = projects();
        let count = group_reduce(&t, "Kind", "Cost", Reducer::Count);
        assert_eq!(count.groups[0].key, CellValue::from("Wind"));
        assert_eq!(count.groups[0].value, 2.0);

        let mean = group_reduce(&t, "Kind", "Cost", Reducer::Mean);
        let wind = mean.groups.iter().find(|g| g.key == CellValue::from("Wind")).unwrap();
        assert_eq!(wind.value, 2.5);

        let max = group_reduce(&t, "Kind", "Cost", Reducer::Max);
        assert_eq!(max.groups[0].key, CellValue::from("Tidal"));
    }

    #[test]
    fn describe_matches_sample_conventions() {
        let t = Table::new(
            vec!["v".into()],
            [1.0, 2.0, 3.0, 4.0]
                .iter()
                .map(|v| vec![CellValue::Float(*v)])
                .collect(),
        );
        let stats = &describe(&t, &["v".to_string()])[0];
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, Some(2.5));
        let std = stats.std.unwrap();
        assert!((std - 1.2909944487358056).abs() < 1e-12);
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.q25, Some(1.75));
        assert_eq!(stats.q50, Some(2.5));
        assert_eq!(stats.q75, Some(3.25));
        assert_eq!(stats.max, Some(4.0));
    }

    #[test]
    fn describe_on_empty_table_has_zero_counts() {
        let t = projects().empty_like();
        let cols = vec!["Output".to_string(), "Cost".to_string()];
        for stats in describe(&t, &cols) {
            assert_eq!(stats.count, 0);
            assert_eq!(stats.mean, None);
            assert_eq!(stats.std, None);
            assert_eq!(stats.q50, None);
        }
    }

    #[test]
    fn single_value_has_no_std() {
        let t = Table::new(vec!["v".into()], vec![vec![CellValue::Float(3.0)]]);
        let stats = &describe(&t, &["v".to_string()])[0];
        assert_eq!(stats.count, 1);
        assert_eq!(stats.std, None);
        assert_eq!(stats.q75, Some(3.0));
    }

    #[test]
    fn correlation_is_symmetric_with_unit_diagonal() {
        let t = projects();
        let cols = vec!["Output".to_string(), "Cost".to_string()];
        let m = correlation_matrix(&t, &cols);
        for i in 0..cols.len() {
            assert_eq!(m.values[i][i], 1.0);
            for j in 0..cols.len() {
                assert_eq!(m.values[i][j].to_bits(), m.values[j][i].to_bits());
            }
        }
        let r = m.get("Output", "Cost").unwrap();
        assert!((-1.0..=1.0).contains(&r));
    }

    #[test]
    fn perfectly_correlated_columns() {
        let t = Table::new(
            vec!["a".into(), "b".into(), "c".into()],
            (0..5)
                .map(|i| {
                    let x = i as f64;
                    vec![CellValue::Float(x), CellValue::Float(3.0 * x + 1.0), CellValue::Float(-x)]
                })
                .collect(),
        );
        let cols: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let m = correlation_matrix(&t, &cols);
        assert!((m.get("a", "b").unwrap() - 1.0).abs() < 1e-12);
        assert!((m.get("a", "c").unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn line_series_restart_index_per_group() {
        let spec = LineSpec {
            group_by: "Kind".into(),
            x: XAxis::Index,
            y: vec!["Output".into(), "Cost".into()],
        };
        let series = line_series(&projects(), &spec);
        assert_eq!(series.len(), 8);
        let wind_cost = series
            .iter()
            .find(|s| s.group == CellValue::from("Wind") && s.column == "Cost")
            .unwrap();
        assert_eq!(wind_cost.points, vec![(0.0, 1.0), (1.0, 4.0)]);
    }

    #[test]
    fn scatter_carries_hue() {
        let spec = ScatterSpec {
            x: "Cost".into(),
            y: "Output".into(),
            hue: Some("Kind".into()),
            style: None,
        };
        let scatter = scatter_points(&projects(), &spec);
        assert_eq!(scatter.points.len(), 5);
        assert_eq!(scatter.points[1].hue, Some(CellValue::from("Solar")));
        assert!(scatter.points[1].style.is_none());
    }
}
