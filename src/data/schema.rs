//! Dataset schemas: the configuration data that drives one generic pipeline.
//!
//! Everything that used to differ between the "energy projects" and the
//! "country energy mix" dashboards lives here as data: which columns are
//! required, which are numeric, which integer codes map to which labels, what
//! can be filtered, what gets grouped and what gets forecast.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::forecast::XAxis;
use crate::data::model::{CellValue, Table};
use crate::error::SchemaError;

/// Fixed mapping from integer code to display label.
pub type CategoryMap = BTreeMap<i64, String>;

/// Which rows to forecast and along which axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSpec {
    pub x: XAxis,
    /// Target column; `None` forecasts the currently selected value column.
    #[serde(default)]
    pub y: Option<String>,
    /// Restrict to rows where `column == value` before fitting. The forecast
    /// is skipped when the filtered view holds no such rows.
    #[serde(default)]
    pub subset: Option<(String, CellValue)>,
}

/// Scatter chart: one point per record, coloured by `hue`, shaped by `style`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterSpec {
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub hue: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

/// Line chart: one series per (group, y column) over `x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSpec {
    pub group_by: String,
    pub x: XAxis,
    pub y: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub name: String,
    /// Columns that must be present once names are normalized.
    pub required: Vec<String>,
    /// Columns coerced to floats during cleaning.
    pub numeric: Vec<String>,
    /// Columns whose integer codes are replaced by labels.
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryMap>,
    /// Columns offered as multi-select filters.
    pub filter_columns: Vec<String>,
    /// Column filtered by an inclusive numeric range (usually the year).
    #[serde(default)]
    pub range_column: Option<String>,
    /// Components summed into `total_column` during reconciliation.
    #[serde(default)]
    pub component_columns: Vec<String>,
    #[serde(default)]
    pub total_column: Option<String>,
    /// Projection kept after cleaning, in this order. Empty keeps everything.
    #[serde(default)]
    pub focus_columns: Vec<String>,
    /// Key for the grouped bar chart.
    pub group_key: String,
    /// The fixed enumeration a caller may pick the value column from.
    pub value_columns: Vec<String>,
    /// Columns included in the dataset-wide correlation heatmap.
    #[serde(default)]
    pub correlation_columns: Vec<String>,
    #[serde(default)]
    pub scatter: Vec<ScatterSpec>,
    #[serde(default)]
    pub line: Option<LineSpec>,
    #[serde(default)]
    pub forecast: Option<ForecastSpec>,
}

pub const ENERGY_TYPE: &str = "Type_of_Renewable_Energy";
pub const GRID_INTEGRATION: &str = "Grid_Integration_Level";
pub const FUNDING_SOURCES: &str = "Funding_Sources";
pub const PRODUCTION: &str = "Energy_Production_MWh";
pub const CONSUMPTION: &str = "Energy_Consumption_MWh";
pub const INVESTMENT: &str = "Initial_Investment_USD";
pub const GHG_REDUCTION: &str = "GHG_Emission_Reduction_tCO2e";
pub const AIR_POLLUTION: &str = "Air_Pollution_Reduction_Index";

pub const COUNTRY: &str = "Country";
pub const YEAR: &str = "Year";
pub const SOLAR: &str = "Solar_Energy";
pub const WIND: &str = "Wind_Energy";
pub const HYDRO: &str = "Hydro_Energy";
pub const OTHER: &str = "Other_Renewable_Energy";
pub const TOTAL: &str = "Total_Renewable_Energy";

/// Names accepted by [`DatasetSchema::builtin`].
pub const BUILTIN_SCHEMAS: &[&str] = &["energy-projects", "country-mix"];

fn labels(pairs: &[(i64, &str)]) -> CategoryMap {
    pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
}

fn axis_column(x: &XAxis) -> Option<&String> {
    match x {
        XAxis::Index => None,
        XAxis::Column(name) => Some(name),
    }
}

fn names(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

impl DatasetSchema {
    /// Look up a built-in schema by name.
    pub fn builtin(name: &str) -> Result<Self, SchemaError> {
        match name {
            "energy-projects" => Ok(Self::energy_projects()),
            "country-mix" => Ok(Self::country_mix()),
            other => Err(SchemaError::UnknownSchema(other.to_string())),
        }
    }

    /// Per-project records with coded energy type, grid level and funding.
    pub fn energy_projects() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            ENERGY_TYPE.to_string(),
            labels(&[
                (1, "Solar"),
                (2, "Wind"),
                (3, "Hydroelectric"),
                (4, "Geothermal"),
                (5, "Biomass"),
                (6, "Tidal"),
                (7, "Wave"),
            ]),
        );
        categories.insert(
            GRID_INTEGRATION.to_string(),
            labels(&[
                (1, "Fully Integrated"),
                (2, "Partially Integrated"),
                (3, "Minimal Integration"),
                (4, "Isolated Microgrid"),
            ]),
        );
        categories.insert(
            FUNDING_SOURCES.to_string(),
            labels(&[
                (1, "Government"),
                (2, "Private"),
                (3, "Public-Private Partnership"),
            ]),
        );

        let measures = [PRODUCTION, CONSUMPTION, INVESTMENT, GHG_REDUCTION, AIR_POLLUTION];

        DatasetSchema {
            name: "energy-projects".to_string(),
            required: names(&[
                ENERGY_TYPE,
                PRODUCTION,
                CONSUMPTION,
                INVESTMENT,
                GHG_REDUCTION,
                AIR_POLLUTION,
                FUNDING_SOURCES,
            ]),
            numeric: names(&measures),
            categories,
            filter_columns: names(&[ENERGY_TYPE, FUNDING_SOURCES]),
            range_column: None,
            component_columns: Vec::new(),
            total_column: None,
            focus_columns: names(&[
                ENERGY_TYPE,
                PRODUCTION,
                CONSUMPTION,
                INVESTMENT,
                GHG_REDUCTION,
                AIR_POLLUTION,
                FUNDING_SOURCES,
            ]),
            group_key: ENERGY_TYPE.to_string(),
            value_columns: names(&measures),
            correlation_columns: names(&measures),
            scatter: vec![
                ScatterSpec {
                    x: INVESTMENT.to_string(),
                    y: GHG_REDUCTION.to_string(),
                    hue: Some(ENERGY_TYPE.to_string()),
                    style: Some(FUNDING_SOURCES.to_string()),
                },
                ScatterSpec {
                    x: INVESTMENT.to_string(),
                    y: AIR_POLLUTION.to_string(),
                    hue: Some(ENERGY_TYPE.to_string()),
                    style: Some(FUNDING_SOURCES.to_string()),
                },
            ],
            line: Some(LineSpec {
                group_by: ENERGY_TYPE.to_string(),
                x: XAxis::Index,
                y: names(&[PRODUCTION, CONSUMPTION]),
            }),
            forecast: Some(ForecastSpec {
                x: XAxis::Index,
                y: Some(PRODUCTION.to_string()),
                subset: Some((ENERGY_TYPE.to_string(), CellValue::from("Solar"))),
            }),
        }
    }

    /// Per-country yearly energy mix with a derived total.
    pub fn country_mix() -> Self {
        let sources = [SOLAR, WIND, HYDRO, OTHER];
        let all = [YEAR, SOLAR, WIND, HYDRO, OTHER, TOTAL];

        DatasetSchema {
            name: "country-mix".to_string(),
            required: names(&[COUNTRY, YEAR, SOLAR, WIND, HYDRO, OTHER, TOTAL]),
            numeric: names(&[SOLAR, WIND, HYDRO, OTHER, TOTAL]),
            categories: BTreeMap::new(),
            filter_columns: names(&[COUNTRY]),
            range_column: Some(YEAR.to_string()),
            component_columns: names(&sources),
            total_column: Some(TOTAL.to_string()),
            focus_columns: Vec::new(),
            group_key: COUNTRY.to_string(),
            value_columns: names(&[SOLAR, WIND, HYDRO, OTHER, TOTAL]),
            correlation_columns: names(&all),
            scatter: vec![ScatterSpec {
                x: SOLAR.to_string(),
                y: WIND.to_string(),
                hue: Some(COUNTRY.to_string()),
                style: None,
            }],
            line: Some(LineSpec {
                group_by: COUNTRY.to_string(),
                x: XAxis::Column(YEAR.to_string()),
                y: names(&[TOTAL]),
            }),
            forecast: Some(ForecastSpec {
                x: XAxis::Column(YEAR.to_string()),
                y: None,
                subset: None,
            }),
        }
    }

    /// Every column the views read (group key, value and filter columns,
    /// charts and forecast) must exist in the cleaned table.
    pub fn check_columns(&self, table: &Table) -> Result<(), SchemaError> {
        let mut used: Vec<&String> = vec![&self.group_key];
        used.extend(&self.value_columns);
        used.extend(&self.filter_columns);
        used.extend(&self.range_column);
        used.extend(&self.correlation_columns);
        for scatter in &self.scatter {
            used.extend([&scatter.x, &scatter.y]);
            used.extend(scatter.hue.iter().chain(&scatter.style));
        }
        if let Some(line) = &self.line {
            used.push(&line.group_by);
            used.extend(axis_column(&line.x));
            used.extend(&line.y);
        }
        if let Some(forecast) = &self.forecast {
            used.extend(axis_column(&forecast.x));
            used.extend(&forecast.y);
            used.extend(forecast.subset.as_ref().map(|(column, _)| column));
        }

        match used.into_iter().find(|c| table.column_index(c).is_none()) {
            Some(missing) => Err(SchemaError::MissingColumn(missing.clone())),
            None => Ok(()),
        }
    }

    /// Default value column: the first of the enumeration.
    pub fn default_value_column(&self) -> Option<&str> {
        self.value_columns.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup() {
        for name in BUILTIN_SCHEMAS {
            assert_eq!(DatasetSchema::builtin(name).unwrap().name, *name);
        }
        assert_eq!(
            DatasetSchema::builtin("nope"),
            Err(SchemaError::UnknownSchema("nope".into()))
        );
    }

    #[test]
    fn schema_round_trips_through_json() {
        let schema = DatasetSchema::energy_projects();
        let text = serde_json::to_string(&schema).unwrap();
        let back: DatasetSchema = serde_json::from_str(&text).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn forecast_column_must_exist() {
        let mut schema = DatasetSchema::country_mix();
        let table = Table::new(schema.required.clone(), Vec::new());
        assert_eq!(schema.check_columns(&table), Ok(()));

        schema.forecast = Some(ForecastSpec {
            x: XAxis::Column("Yr".into()),
            y: None,
            subset: None,
        });
        assert_eq!(
            schema.check_columns(&table),
            Err(SchemaError::MissingColumn("Yr".into()))
        );
    }

    #[test]
    fn focus_projection_keeps_every_used_column() {
        let schema = DatasetSchema::energy_projects();
        let table = Table::new(schema.focus_columns.clone(), Vec::new());
        assert_eq!(schema.check_columns(&table), Ok(()));
    }

    #[test]
    fn country_mix_total_is_sum_of_sources() {
        let schema = DatasetSchema::country_mix();
        assert_eq!(schema.total_column.as_deref(), Some(TOTAL));
        assert_eq!(schema.component_columns.len(), 4);
        assert!(schema.required.contains(&TOTAL.to_string()));
    }
}
