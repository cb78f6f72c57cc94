//! Schema-driven cleaning, filtering, aggregation and trend forecasting for
//! renewable-energy datasets.

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod state;

pub use data::model::{CellValue, Table};
pub use data::schema::DatasetSchema;
pub use error::{
    ConfigError, ForecastError, InsufficientDataError, LoadError, PipelineError, SchemaError,
};
pub use pipeline::{build_view, DashboardView, Dataset, ViewParams};
