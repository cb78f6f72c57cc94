//! Linear trend fitting and extrapolation.
//!
//! Ordinary least squares with a single predictor: either the 0-based record
//! index or an explicit numeric column such as the year. Closed-form, no
//! regularization, always with an intercept.

use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use super::model::{CellValue, Table};
use crate::error::{ForecastError, InsufficientDataError};

/// Forecast horizon used by both built-in dashboards.
pub const DEFAULT_HORIZON: usize = 5;

/// The predictor axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XAxis {
    /// 0-based position of the record in the table.
    Index,
    /// Values of a numeric column.
    Column(String),
}

/// A fitted line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Number of (x, y) pairs used.
    pub n: usize,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub fit: LinearFit,
    pub points: Vec<ForecastPoint>,
}

impl ForecastResult {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }
}

/// Fit `ys` on `xs` by least squares. Pairs are matched positionally.
pub fn fit(xs: &[f64], ys: &[f64]) -> Result<LinearFit, InsufficientDataError> {
    let n = xs.len().min(ys.len());
    let distinct = xs[..n]
        .iter()
        .map(|x| x.to_bits())
        .collect::<BTreeSet<_>>()
        .len();
    if distinct < 2 {
        return Err(InsufficientDataError { distinct });
    }

    let nf = n as f64;
    let mean_x = xs[..n].iter().sum::<f64>() / nf;
    let mean_y = ys[..n].iter().sum::<f64>() / nf;

    let (sxy, sxx) = xs[..n]
        .iter()
        .zip(&ys[..n])
        .fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
            let dx = x - mean_x;
            (sxy + dx * (y - mean_y), sxx + dx * dx)
        });

    // Distinct values can still collapse to zero spread for huge magnitudes.
    if sxx == 0.0 {
        return Err(InsufficientDataError { distinct: 1 });
    }

    let slope = sxy / sxx;
    Ok(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
        n,
    })
}

/// Fit `y_col` against `x` over `table` and predict `horizon` further points
/// at the integers following the largest observed x.
pub fn fit_and_predict(
    table: &Table,
    x: &XAxis,
    y_col: &str,
    horizon: usize,
) -> Result<ForecastResult, ForecastError> {
    let y_idx = table
        .column_index(y_col)
        .ok_or_else(|| ForecastError::UnknownColumn(y_col.to_string()))?;

    let (xs, ys): (Vec<f64>, Vec<f64>) = match x {
        XAxis::Index => table
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| Some((i as f64, row[y_idx].as_f64()?)))
            .unzip(),
        XAxis::Column(name) => {
            let x_idx = table
                .column_index(name)
                .ok_or_else(|| ForecastError::UnknownColumn(name.clone()))?;
            table
                .rows
                .iter()
                .filter_map(|row| Some((row[x_idx].as_f64()?, row[y_idx].as_f64()?)))
                .unzip()
        }
    };

    let fit = fit(&xs, &ys)?;
    let last = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max).floor();
    let points = (1..=horizon)
        .map(|step| {
            let x = last + step as f64;
            ForecastPoint {
                x,
                y: fit.predict(x),
            }
        })
        .collect();

    debug!(
        "fitted {y_col}: slope {:.4}, intercept {:.4} over {} points",
        fit.slope, fit.intercept, fit.n
    );
    Ok(ForecastResult { fit, points })
}

/// Forecast only the rows where `column == value`. No such rows is
/// [`ForecastError::SubsetAbsent`], not a shortage of data.
pub fn fit_and_predict_subset(
    table: &Table,
    subset: (&str, &CellValue),
    x: &XAxis,
    y_col: &str,
    horizon: usize,
) -> Result<ForecastResult, ForecastError> {
    let (column, value) = subset;
    if table.column_index(column).is_none() {
        return Err(ForecastError::UnknownColumn(column.to_string()));
    }
    let rows = table.rows_where(column, value);
    if rows.is_empty() {
        return Err(ForecastError::SubsetAbsent(value.clone()));
    }
    fit_and_predict(&rows, x, y_col, horizon)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(ys: &[f64]) -> Table {
        Table::new(
            vec!["Year".into(), "Output".into()],
            ys.iter()
                .enumerate()
                .map(|(i, y)| vec![CellValue::Integer(2015 + i as i64), CellValue::Float(*y)])
                .collect(),
        )
    }

    #[test]
    fn perfect_line_extends_exactly() {
        let table = series(&[10.0, 12.0, 14.0, 16.0, 18.0]);
        let result = fit_and_predict(&table, &XAxis::Index, "Output", DEFAULT_HORIZON).unwrap();
        assert_eq!(result.fit.slope, 2.0);
        assert_eq!(result.fit.intercept, 10.0);
        let xs: Vec<f64> = result.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(result.values(), vec![20.0, 22.0, 24.0, 26.0, 28.0]);
    }

    #[test]
    fn year_axis_continues_after_last_year() {
        let table = series(&[1.0, 2.0, 3.0]);
        let x = XAxis::Column("Year".into());
        let result = fit_and_predict(&table, &x, "Output", 2).unwrap();
        assert_eq!(result.points[0].x, 2018.0);
        assert_eq!(result.points[1].x, 2019.0);
        assert!((result.points[0].y - 4.0).abs() < 1e-9);
        assert!((result.points[1].y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn single_distinct_x_is_insufficient() {
        let table = Table::new(
            vec!["Year".into(), "Output".into()],
            vec![
                vec![CellValue::Integer(2020), CellValue::Float(1.0)],
                vec![CellValue::Integer(2020), CellValue::Float(3.0)],
            ],
        );
        let err = fit_and_predict(&table, &XAxis::Column("Year".into()), "Output", 5).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData(InsufficientDataError { distinct: 1 })
        );

        let one_row = series(&[7.0]);
        assert!(matches!(
            fit_and_predict(&one_row, &XAxis::Index, "Output", 5),
            Err(ForecastError::InsufficientData(_))
        ));
        assert!(matches!(
            fit_and_predict(&one_row.empty_like(), &XAxis::Index, "Output", 5),
            Err(ForecastError::InsufficientData(InsufficientDataError { distinct: 0 }))
        ));
    }

    #[test]
    fn deterministic_for_identical_input() {
        let table = series(&[3.2, 4.9, 4.1, 7.7, 6.0, 9.3]);
        let a = fit_and_predict(&table, &XAxis::Index, "Output", 5).unwrap();
        let b = fit_and_predict(&table, &XAxis::Index, "Output", 5).unwrap();
        for (pa, pb) in a.points.iter().zip(&b.points) {
            assert_eq!(pa.y.to_bits(), pb.y.to_bits());
        }
    }

    #[test]
    fn unknown_column_is_reported() {
        let table = series(&[1.0, 2.0]);
        assert_eq!(
            fit_and_predict(&table, &XAxis::Index, "Nope", 5).unwrap_err(),
            ForecastError::UnknownColumn("Nope".into())
        );
    }

    #[test]
    fn subset_fits_only_matching_rows() {
        let table = Table::new(
            vec!["Kind".into(), "Output".into()],
            vec![
                vec!["Solar".into(), CellValue::Float(1.0)],
                vec!["Wind".into(), CellValue::Float(100.0)],
                vec!["Solar".into(), CellValue::Float(2.0)],
                vec!["Solar".into(), CellValue::Float(3.0)],
            ],
        );
        let solar = CellValue::from("Solar");
        let result =
            fit_and_predict_subset(&table, ("Kind", &solar), &XAxis::Index, "Output", 1).unwrap();
        assert_eq!(result.fit.n, 3);
        assert_eq!(result.points[0].x, 3.0);
        assert!((result.points[0].y - 4.0).abs() < 1e-9);

        let tidal = CellValue::from("Tidal");
        assert_eq!(
            fit_and_predict_subset(&table, ("Kind", &tidal), &XAxis::Index, "Output", 1)
                .unwrap_err(),
            ForecastError::SubsetAbsent(tidal)
        );
    }
}
