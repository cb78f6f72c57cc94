/// Data layer: core types, loading, cleaning, filtering and analysis.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet / http(s)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  fetch + parse → raw Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  clean    │  dedupe, trim names, fill, recode, reconcile (per schema)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  selections AND year range → filtered Table
///   └──────────┘
///        │
///        ├──────────────┐
///        ▼              ▼
///   ┌───────────┐  ┌──────────┐
///   │ aggregate  │  │ forecast │  group totals, describe, correlation / OLS trend
///   └───────────┘  └──────────┘
/// ```

pub mod aggregate;
pub mod clean;
pub mod filter;
pub mod forecast;
pub mod loader;
pub mod model;
pub mod schema;
