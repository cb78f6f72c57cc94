//! The explicit pipeline: load → clean once, then filter → aggregate →
//! forecast on every change of selection.

use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use crate::data::aggregate::{
    correlation_matrix, describe, group_reduce, line_series, scatter_points, ColumnStats,
    CorrelationMatrix, GroupedResult, Reducer, Scatter, Series,
};
use crate::data::clean::{clean, CleanReport};
use crate::data::filter::{filter, FilterSpec};
use crate::data::forecast::{fit_and_predict, fit_and_predict_subset, ForecastResult};
use crate::data::loader::{load_source, LoadCache, Source};
use crate::data::model::{CellValue, Table};
use crate::data::schema::DatasetSchema;
use crate::error::{ForecastError, PipelineError};

/// A cleaned table ready to be filtered repeatedly.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub schema: DatasetSchema,
    pub table: Arc<Table>,
    pub report: CleanReport,
    /// Dataset-wide correlations, independent of any filter.
    pub correlation: CorrelationMatrix,
}

impl Dataset {
    /// Clean a raw table against `schema`.
    pub fn from_raw(raw: Table, schema: DatasetSchema) -> Result<Self, PipelineError> {
        let (table, report) = clean(raw, &schema)?;
        schema.check_columns(&table)?;
        let correlation = correlation_matrix(&table, &schema.correlation_columns);
        Ok(Dataset {
            schema,
            table: Arc::new(table),
            report,
            correlation,
        })
    }

    /// Load and clean. With a cache, repeated loads of one source are served
    /// from memory; the cleaning still runs against the given schema.
    pub fn load(
        source: &Source,
        schema: DatasetSchema,
        cache: Option<&mut LoadCache>,
    ) -> Result<Self, PipelineError> {
        let raw = match cache {
            Some(cache) => cache.get_or_load(source, load_source)?.as_ref().clone(),
            None => load_source(source)?,
        };
        Self::from_raw(raw, schema)
    }
}

/// Why no forecast was produced for a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ForecastSkip {
    /// The schema declares no forecast.
    NotConfigured,
    /// The forecast subset value is absent from the filtered rows.
    SubsetAbsent(CellValue),
    /// Too little data to fit; the raw data is shown on its own.
    Insufficient(String),
    /// The value column picked by the caller is not in the table.
    UnknownColumn(String),
}

/// Everything the presenter needs for one selection.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub rows: usize,
    pub value_column: String,
    pub filtered: Table,
    pub totals: GroupedResult,
    pub statistics: Vec<ColumnStats>,
    pub line: Vec<Series>,
    pub scatter: Vec<Scatter>,
    pub correlation: CorrelationMatrix,
    pub forecast: Result<ForecastResult, ForecastSkip>,
}

/// Parameters of one run over a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewParams {
    pub filter: FilterSpec,
    pub value_column: String,
    pub reducer: Reducer,
    pub horizon: usize,
}

/// Compute a fresh view from the immutable cleaned table.
pub fn build_view(dataset: &Dataset, params: &ViewParams) -> DashboardView {
    let schema = &dataset.schema;
    let filtered = filter(&dataset.table, &params.filter);
    debug!(
        "filter kept {} of {} rows",
        filtered.len(),
        dataset.table.len()
    );

    let totals = group_reduce(
        &filtered,
        &schema.group_key,
        &params.value_column,
        params.reducer,
    );
    let statistics = describe(&filtered, &schema.numeric);
    let line = schema
        .line
        .as_ref()
        .map(|spec| line_series(&filtered, spec))
        .unwrap_or_default();
    let scatter = schema
        .scatter
        .iter()
        .map(|spec| scatter_points(&filtered, spec))
        .collect();
    let forecast = forecast_view(&filtered, schema, params);

    match &forecast {
        Ok(result) => info!(
            "forecast {} point(s), slope {:.4}",
            result.points.len(),
            result.fit.slope
        ),
        Err(skip) => info!("forecast skipped: {skip:?}"),
    }

    DashboardView {
        rows: filtered.len(),
        value_column: params.value_column.clone(),
        filtered,
        totals,
        statistics,
        line,
        scatter,
        correlation: dataset.correlation.clone(),
        forecast,
    }
}

fn forecast_view(
    filtered: &Table,
    schema: &DatasetSchema,
    params: &ViewParams,
) -> Result<ForecastResult, ForecastSkip> {
    let spec = schema.forecast.as_ref().ok_or(ForecastSkip::NotConfigured)?;
    let y = spec.y.as_deref().unwrap_or(&params.value_column);

    let result = match &spec.subset {
        Some((column, value)) => {
            fit_and_predict_subset(filtered, (column.as_str(), value), &spec.x, y, params.horizon)
        }
        None => fit_and_predict(filtered, &spec.x, y, params.horizon),
    };
    result.map_err(|e| match e {
        ForecastError::InsufficientData(inner) => ForecastSkip::Insufficient(inner.to_string()),
        ForecastError::SubsetAbsent(value) => ForecastSkip::SubsetAbsent(value),
        ForecastError::UnknownColumn(column) => ForecastSkip::UnknownColumn(column),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::forecast::{XAxis, DEFAULT_HORIZON};
    use crate::data::loader::read_csv;
    use crate::data::schema::{self, DatasetSchema};
    use crate::error::SchemaError;

    const PROJECTS: &str = "\
Type_of_Renewable_Energy,Energy_Production_MWh,Energy_Consumption_MWh,Initial_Investment_USD,GHG_Emission_Reduction_tCO2e,Air_Pollution_Reduction_Index,Funding_Sources,Grid_Integration_Level
1,10,8,5000,12.5,3.1,2,1
2,50,40,9000,30.0,5.0,1,2
1,12,9,5200,13.0,3.0,2,1
1,14,10,5400,14.0,3.3,3,1
1,16,12,5600,15.0,3.2,1,1
1,18,15,5800,16.5,3.6,2,1
2,50,40,9000,30.0,5.0,1,2
";

    fn projects() -> Dataset {
        let raw = read_csv(PROJECTS.as_bytes(), "inline").unwrap();
        Dataset::from_raw(raw, DatasetSchema::energy_projects()).unwrap()
    }

    fn params(dataset: &Dataset) -> ViewParams {
        ViewParams {
            filter: FilterSpec::select_all(&dataset.table, &dataset.schema),
            value_column: schema::PRODUCTION.to_string(),
            reducer: Reducer::Sum,
            horizon: DEFAULT_HORIZON,
        }
    }

    #[test]
    fn full_view_forecasts_solar_production() {
        let dataset = projects();
        assert_eq!(dataset.report.duplicates_removed, 1);
        let view = build_view(&dataset, &params(&dataset));
        assert_eq!(view.rows, 6);

        let forecast = view.forecast.expect("solar rows form a clean line");
        assert_eq!(forecast.values(), vec![20.0, 22.0, 24.0, 26.0, 28.0]);

        assert_eq!(view.totals.groups[0].key, CellValue::from("Solar"));
        assert_eq!(view.totals.groups[0].value, 70.0);
        assert_eq!(view.scatter.len(), 2);
        assert_eq!(view.correlation.columns.len(), 5);
    }

    #[test]
    fn forecast_skipped_without_solar() {
        let dataset = projects();
        let mut p = params(&dataset);
        p.filter.selections.insert(
            schema::ENERGY_TYPE.to_string(),
            [CellValue::from("Wind")].into(),
        );
        let view = build_view(&dataset, &p);
        assert_eq!(view.rows, 1);
        assert_eq!(
            view.forecast.unwrap_err(),
            ForecastSkip::SubsetAbsent(CellValue::from("Solar"))
        );
    }

    #[test]
    fn empty_selection_produces_empty_statistics() {
        let dataset = projects();
        let mut p = params(&dataset);
        p.filter
            .selections
            .insert(schema::ENERGY_TYPE.to_string(), Default::default());
        let view = build_view(&dataset, &p);
        assert_eq!(view.rows, 0);
        assert!(view.totals.groups.is_empty());
        assert!(view.statistics.iter().all(|s| s.count == 0 && s.mean.is_none()));
        assert!(view.forecast.is_err());
        // Correlations describe the whole dataset regardless of the filter.
        assert_eq!(view.correlation, dataset.correlation);
    }

    #[test]
    fn country_mix_forecasts_selected_value_by_year() {
        let data = "\
Country,Year,Solar_Energy,Wind_Energy,Hydro_Energy,Other_Renewable_Energy,Total_Renewable_Energy
Kenya,2018,1,1,1,1,4
Kenya,2019,2,1,1,1,0
Kenya,2020,3,1,1,1,6
Peru,2020,9,9,9,9,36
";
        let raw = read_csv(data.as_bytes(), "inline").unwrap();
        let dataset = Dataset::from_raw(raw, DatasetSchema::country_mix()).unwrap();
        assert_eq!(dataset.report.totals_reconciled, 1);

        let mut p = params(&dataset);
        p.value_column = schema::SOLAR.to_string();
        p.filter
            .selections
            .insert(schema::COUNTRY.to_string(), [CellValue::from("Kenya")].into());
        let view = build_view(&dataset, &p);
        let forecast = view.forecast.unwrap();
        assert_eq!(forecast.points[0].x, 2021.0);
        assert!((forecast.points[0].y - 4.0).abs() < 1e-9);
        assert_eq!(view.line.len(), 1);
    }

    #[test]
    fn inline_schema_naming_a_missing_column_is_rejected() {
        let mut schema = DatasetSchema::energy_projects();
        if let Some(forecast) = schema.forecast.as_mut() {
            forecast.x = XAxis::Column("Yr".into());
        }
        let raw = read_csv(PROJECTS.as_bytes(), "inline").unwrap();
        let err = Dataset::from_raw(raw, schema).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Schema(SchemaError::MissingColumn(column)) if column == "Yr"
        ));
    }

    #[test]
    fn unknown_value_column_is_not_reported_as_insufficient() {
        let dataset = projects();
        let mut schema = dataset.schema.clone();
        if let Some(forecast) = schema.forecast.as_mut() {
            forecast.y = None;
        }
        let dataset = Dataset { schema, ..dataset };
        let mut p = params(&dataset);
        p.value_column = "Nope".to_string();
        let view = build_view(&dataset, &p);
        assert_eq!(
            view.forecast.unwrap_err(),
            ForecastSkip::UnknownColumn("Nope".into())
        );
    }

    #[test]
    fn single_year_is_insufficient_for_a_trend() {
        let data = "\
Country,Year,Solar_Energy,Wind_Energy,Hydro_Energy,Other_Renewable_Energy,Total_Renewable_Energy
Kenya,2020,1,1,1,1,4
Peru,2020,2,2,2,2,8
";
        let raw = read_csv(data.as_bytes(), "inline").unwrap();
        let dataset = Dataset::from_raw(raw, DatasetSchema::country_mix()).unwrap();
        let mut p = params(&dataset);
        p.value_column = schema::TOTAL.to_string();
        let view = build_view(&dataset, &p);
        assert!(matches!(view.forecast, Err(ForecastSkip::Insufficient(_))));
        assert_eq!(view.rows, 2);
    }
}
