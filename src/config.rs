//! Run configuration, read from an optional JSON file and overridden from the
//! command line.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::aggregate::Reducer;
use crate::data::filter::{FilterSpec, RangeFilter};
use crate::data::forecast::DEFAULT_HORIZON;
use crate::data::model::{CellValue, Table};
use crate::data::schema::DatasetSchema;
use crate::error::ConfigError;
use crate::pipeline::ViewParams;

/// Either a built-in schema name or a full inline schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaChoice {
    Builtin(String),
    Inline(Box<DatasetSchema>),
}

impl Default for SchemaChoice {
    fn default() -> Self {
        SchemaChoice::Builtin("energy-projects".to_string())
    }
}

impl SchemaChoice {
    pub fn resolve(&self) -> Result<DatasetSchema, ConfigError> {
        match self {
            SchemaChoice::Builtin(name) => Ok(DatasetSchema::builtin(name)?),
            SchemaChoice::Inline(schema) => Ok(schema.as_ref().clone()),
        }
    }
}

fn default_horizon() -> usize {
    DEFAULT_HORIZON
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    /// Path or URL of the table.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub schema: SchemaChoice,
    /// Filter column → selected values. Columns left out select everything.
    #[serde(default)]
    pub selections: BTreeMap<String, BTreeSet<CellValue>>,
    /// Inclusive bounds on the schema's range column. Either end may be left
    /// open, in which case the observed bound is used.
    #[serde(default)]
    pub range: Option<(Option<f64>, Option<f64>)>,
    /// One of the schema's value columns; defaults to the first.
    #[serde(default)]
    pub value_column: Option<String>,
    #[serde(default)]
    pub reducer: Reducer,
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    /// Memoize loads by source identifier.
    #[serde(default)]
    pub cache_loads: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            source: None,
            schema: SchemaChoice::default(),
            selections: BTreeMap::new(),
            range: None,
            value_column: None,
            reducer: Reducer::Sum,
            horizon: DEFAULT_HORIZON,
            cache_loads: false,
        }
    }
}

impl DashboardConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Json(path.to_path_buf(), e))
    }

    /// Turn the configured selections into view parameters for `table`.
    pub fn view_params(
        &self,
        table: &Table,
        schema: &DatasetSchema,
    ) -> Result<ViewParams, ConfigError> {
        let mut filter = FilterSpec::select_all(table, schema);
        for (column, values) in &self.selections {
            if !schema.filter_columns.contains(column) {
                return Err(ConfigError::UnknownFilterColumn(column.clone()));
            }
            filter.selections.insert(column.clone(), values.clone());
        }

        if let (Some((lo, hi)), Some(column)) = (self.range, schema.range_column.as_ref()) {
            let observed = filter.range.take();
            let lo = lo.or(observed.as_ref().map(|r| r.lo)).unwrap_or(f64::NEG_INFINITY);
            let hi = hi.or(observed.as_ref().map(|r| r.hi)).unwrap_or(f64::INFINITY);
            filter.range = Some(RangeFilter {
                column: column.clone(),
                lo,
                hi,
            });
        }

        let value_column = match &self.value_column {
            Some(col) if schema.value_columns.contains(col) => col.clone(),
            Some(col) => return Err(ConfigError::UnknownValueColumn(col.clone())),
            None => schema
                .default_value_column()
                .ok_or_else(|| ConfigError::NoValueColumns(schema.name.clone()))?
                .to_string(),
        };

        Ok(ViewParams {
            filter,
            value_column,
            reducer: self.reducer,
            horizon: self.horizon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema;

    #[test]
    fn defaults_from_empty_json() {
        let config: DashboardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.horizon, 5);
    }

    #[test]
    fn parses_selections_and_builtin_schema() {
        let json = r#"{
            "source": "data/mix.csv",
            "schema": "country-mix",
            "selections": { "Country": ["Kenya", "Peru"] },
            "range": [2019, null],
            "value_column": "Wind_Energy",
            "cache_loads": true
        }"#;
        let config: DashboardConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.schema.resolve().unwrap().name, "country-mix");
        assert_eq!(config.selections["Country"].len(), 2);
        assert_eq!(config.range, Some((Some(2019.0), None)));
        assert!(config.cache_loads);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<DashboardConfig>(r#"{"horizn": 3}"#).is_err());
    }

    #[test]
    fn view_params_validate_columns() {
        let schema = DatasetSchema::country_mix();
        let table = Table::new(schema.required.clone(), Vec::new());

        let config = DashboardConfig {
            value_column: Some("Nope".into()),
            ..DashboardConfig::default()
        };
        assert!(matches!(
            config.view_params(&table, &schema),
            Err(ConfigError::UnknownValueColumn(_))
        ));

        let mut config = DashboardConfig::default();
        config
            .selections
            .insert(schema::YEAR.into(), BTreeSet::new());
        assert!(matches!(
            config.view_params(&table, &schema),
            Err(ConfigError::UnknownFilterColumn(_))
        ));

        let mut empty = schema.clone();
        empty.value_columns.clear();
        let err = DashboardConfig::default().view_params(&table, &empty).unwrap_err();
        assert_eq!(err.to_string(), "schema \"country-mix\" declares no value columns");
    }

    #[test]
    fn open_range_end_uses_observed_bound() {
        let schema = DatasetSchema::country_mix();
        let table = Table::new(
            vec![schema::COUNTRY.into(), schema::YEAR.into()],
            vec![
                vec!["Kenya".into(), CellValue::Integer(2015)],
                vec!["Kenya".into(), CellValue::Integer(2022)],
            ],
        );
        let config = DashboardConfig {
            range: Some((Some(2018.0), None)),
            ..DashboardConfig::default()
        };
        let params = config.view_params(&table, &schema).unwrap();
        let range = params.filter.range.unwrap();
        assert_eq!((range.lo, range.hi), (2018.0, 2022.0));
        assert_eq!(params.value_column, schema::SOLAR);
    }
}
