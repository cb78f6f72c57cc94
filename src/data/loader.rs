use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Record, Table};
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Source identifiers
// ---------------------------------------------------------------------------

/// Where a table comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    Path(PathBuf),
    Url(String),
}

impl Source {
    /// Anything with an http(s) scheme is a URL, everything else a path.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Source::Url(s.to_string())
        } else {
            Source::Path(PathBuf::from(s))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(p) => write!(f, "{}", p.display()),
            Source::Url(u) => write!(f, "{u}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a raw table. No retries: any failure is returned to the caller.
pub fn load_source(source: &Source) -> Result<Table, LoadError> {
    let table = match source {
        Source::Path(path) => load_file(path)?,
        Source::Url(url) => load_url(url)?,
    };
    info!(
        "loaded {} rows x {} columns from {source}",
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row followed by records
/// * `.json`    – `[{ "Country": "Kenya", "Year": 2020, ... }, ...]`
/// * `.parquet` – flat scalar columns
pub fn load_file(path: &Path) -> Result<Table, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => {
            let file =
                std::fs::File::open(path).map_err(|e| LoadError::Io(path.to_path_buf(), e))?;
            read_csv(file, &path.display().to_string())
        }
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => Err(LoadError::UnsupportedExtension(other.to_string())),
    }
}

/// Fetch a CSV over HTTP(S).
fn load_url(url: &str) -> Result<Table, LoadError> {
    let resolved = raw_content_url(url);
    if resolved != url {
        debug!("rewrote {url} to {resolved}");
    }
    let response =
        reqwest::blocking::get(&resolved).map_err(|e| LoadError::Fetch(resolved.clone(), e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::HttpStatus(resolved, status));
    }
    let body = response
        .bytes()
        .map_err(|e| LoadError::Fetch(resolved.clone(), e))?;
    read_csv(&body[..], &resolved)
}

/// GitHub `blob` URLs serve an HTML page; point them at the raw file instead.
pub fn raw_content_url(url: &str) -> String {
    const PREFIX: &str = "https://github.com/";
    match url.strip_prefix(PREFIX) {
        Some(rest) if rest.contains("/blob/") => format!(
            "https://raw.githubusercontent.com/{}",
            rest.replacen("/blob/", "/", 1)
        ),
        _ => url.to_string(),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Header row with column names, then one record per line. Every record
/// must have as many fields as the header.
pub fn read_csv<R: Read>(input: R, source_id: &str) -> Result<Table, LoadError> {
    let mut reader = csv::Reader::from_reader(input);
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::Csv(source_id.to_string(), e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if columns.is_empty() {
        return Err(LoadError::Malformed {
            source_id: source_id.to_string(),
            message: "no header row".to_string(),
        });
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| LoadError::Csv(source_id.to_string(), e))?;
        rows.push(record.iter().map(|s| CellValue::parse(s.trim())).collect());
    }

    let mut table = Table::new(columns, rows);
    let promoted = table.promote_mixed_numeric();
    if promoted > 0 {
        debug!("{source_id}: {promoted} column(s) mixing integers and floats read as floats");
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`.
/// Columns are added as new keys appear, in each object's key order; absent keys
/// become nulls.
fn load_json(path: &Path) -> Result<Table, LoadError> {
    let source_id = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::Io(path.to_path_buf(), e))?;
    let root: JsonValue =
        serde_json::from_str(&text).map_err(|e| LoadError::Json(source_id.clone(), e))?;

    let malformed = |message: String| LoadError::Malformed {
        source_id: source_id.clone(),
        message,
    };

    let records = root
        .as_array()
        .ok_or_else(|| malformed("expected top-level JSON array".to_string()))?;

    let mut columns: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut objects = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| malformed(format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !index.contains_key(key) {
                index.insert(key.clone(), columns.len());
                columns.push(key.clone());
            }
        }
        objects.push(obj);
    }

    let rows = objects
        .into_iter()
        .map(|obj| {
            let mut row: Record = vec![CellValue::Null; columns.len()];
            for (key, val) in obj {
                row[index[key]] = json_to_cell(val);
            }
            row
        })
        .collect();

    let mut table = Table::new(columns, rows);
    table.promote_mixed_numeric();
    Ok(table)
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat scalar columns. Works with files written by
/// both **Pandas** (`df.to_parquet()`) and **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Table, LoadError> {
    let source_id = path.display().to_string();
    let parquet_err = |e: String| LoadError::Parquet(source_id.clone(), e);

    let file = std::fs::File::open(path).map_err(|e| LoadError::Io(path.to_path_buf(), e))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| parquet_err(e.to_string()))?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().map_err(|e| parquet_err(e.to_string()))?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.map_err(|e| parquet_err(e.to_string()))?;
        for row in 0..batch.num_rows() {
            let record: Record = batch
                .columns()
                .iter()
                .map(|col| extract_cell(col, row))
                .collect::<Result<_, String>>()
                .map_err(parquet_err)?;
            rows.push(record);
        }
    }

    Ok(Table::new(columns, rows))
}

fn downcast<'a, T: 'static>(col: &'a Arc<dyn Array>) -> Result<&'a T, String> {
    col.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| format!("unexpected array layout for {:?}", col.data_type()))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Result<CellValue, String> {
    if col.is_null(row) {
        return Ok(CellValue::Null);
    }
    let cell = match col.data_type() {
        DataType::Utf8 => CellValue::String(downcast::<StringArray>(col)?.value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => CellValue::Integer(downcast::<Int32Array>(col)?.value(row) as i64),
        DataType::Int64 => CellValue::Integer(downcast::<Int64Array>(col)?.value(row)),
        DataType::Float32 => CellValue::Float(downcast::<Float32Array>(col)?.value(row) as f64),
        DataType::Float64 => CellValue::Float(downcast::<Float64Array>(col)?.value(row)),
        DataType::Boolean => CellValue::Bool(downcast::<BooleanArray>(col)?.value(row)),
        other => return Err(format!("unsupported column type {other:?}")),
    };
    Ok(cell)
}

// ---------------------------------------------------------------------------
// Memoized loading
// ---------------------------------------------------------------------------

/// Explicit load memoization keyed by source identifier. Disabled caches
/// always go back to the source.
#[derive(Debug, Default)]
pub struct LoadCache {
    enabled: bool,
    entries: HashMap<Source, Arc<Table>>,
}

impl LoadCache {
    pub fn new(enabled: bool) -> Self {
        LoadCache {
            enabled,
            entries: HashMap::new(),
        }
    }

    /// Return the cached table for `source`, loading it on a miss.
    pub fn get_or_load<F>(&mut self, source: &Source, load: F) -> Result<Arc<Table>, LoadError>
    where
        F: FnOnce(&Source) -> Result<Table, LoadError>,
    {
        if !self.enabled {
            return load(source).map(Arc::new);
        }
        if let Some(table) = self.entries.get(source) {
            debug!("load cache hit for {source}");
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(load(source)?);
        self.entries.insert(source.clone(), Arc::clone(&table));
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
