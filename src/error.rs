use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::CellValue;

/// The data source could not be reached or is not a valid table.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to fetch {0}: {1}")]
    Fetch(String, reqwest::Error),
    #[error("{0} responded with HTTP status {1}")]
    HttpStatus(String, reqwest::StatusCode),
    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),
    #[error("malformed CSV in {0}: {1}")]
    Csv(String, csv::Error),
    #[error("malformed JSON in {0}: {1}")]
    Json(String, serde_json::Error),
    #[error("malformed Parquet in {0}: {1}")]
    Parquet(String, String),
    #[error("malformed table in {source_id}: {message}")]
    Malformed { source_id: String, message: String },
}

/// The table does not match the declared schema.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("required column \"{0}\" is missing")]
    MissingColumn(String),
    #[error("column \"{0}\" appears more than once after trimming column names")]
    DuplicateColumn(String),
    #[error("column \"{column}\" row {row}: \"{value}\" is not numeric")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("unknown built-in schema \"{0}\"")]
    UnknownSchema(String),
}

/// A linear fit needs at least two distinct predictor values.
#[derive(Debug, Error, PartialEq)]
#[error("cannot fit a trend on {distinct} distinct x value(s); at least 2 are required")]
pub struct InsufficientDataError {
    pub distinct: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error(transparent)]
    InsufficientData(#[from] InsufficientDataError),
    #[error("column \"{0}\" is not present in the table")]
    UnknownColumn(String),
    #[error("no rows with value {0} to forecast")]
    SubsetAbsent(CellValue),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("invalid config {0}: {1}")]
    Json(PathBuf, serde_json::Error),
    #[error("value column \"{0}\" is not one of the schema's value columns")]
    UnknownValueColumn(String),
    #[error("filter column \"{0}\" is not a filter column of the schema")]
    UnknownFilterColumn(String),
    #[error("no data source configured")]
    MissingSource,
    #[error("schema \"{0}\" declares no value columns")]
    NoValueColumns(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Failures that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
