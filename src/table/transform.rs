//! Row Mapper
//!
//! Pure mapping from a raw item (plus hydrate results) to typed column
//! values. Extraction rules are declarative: a source selector, an optional
//! post-map function, and a semantic type coercion. Mapping never performs
//! I/O and is deterministic for a given input.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use super::Column;

/// Hydrate results for one item, keyed by hydrator name
pub type HydrateMap = HashMap<&'static str, Value>;

/// Semantic column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Int,
    Bool,
    Timestamp,
    Json,
}

/// A rendered column value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    String(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

/// One rendered output row, cells in declared column order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<(&'static str, CellValue)>,
}

impl Row {
    /// Look up a cell by column name
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// Iterate cells in declared column order
    pub fn cells(&self) -> impl Iterator<Item = (&'static str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Post-map applied after source selection
pub type MapFn = fn(&Value) -> Result<Value>;

/// Where a column's raw value comes from
#[derive(Debug, Clone, Copy)]
enum Source {
    /// PascalCase field derived from the snake_case column name
    DefaultField,
    /// Explicit dot-notation path into the source value
    Field(&'static str),
    /// The whole source value
    Value,
}

/// Extraction rule for one column
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    source: Source,
    then: Option<MapFn>,
}

impl Transform {
    /// Derive the field name from the column name (`user_id` -> `UserId`)
    pub const fn default_field() -> Self {
        Self {
            source: Source::DefaultField,
            then: None,
        }
    }

    /// Extract an explicit field by dot-notation path
    pub const fn from_field(path: &'static str) -> Self {
        Self {
            source: Source::Field(path),
            then: None,
        }
    }

    /// Use the whole source value (typically a hydrate result)
    pub const fn from_value() -> Self {
        Self {
            source: Source::Value,
            then: None,
        }
    }

    /// Chain a post-map over the selected value. Skipped when the selected
    /// value is null, so absent optional fields stay null.
    pub fn map(mut self, f: MapFn) -> Self {
        self.then = Some(f);
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::default_field()
    }
}

/// Convert a snake_case column name to the PascalCase wire field name
pub fn pascal_field(column: &str) -> String {
    column
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Walk a dot-notation path (object keys or array indices) into a value
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(part)?,
        };
    }
    Some(current)
}

/// Apply a column's extraction rule to its source value
pub fn apply(transform: &Transform, column: &str, source: &Value) -> Result<Value> {
    let selected = match transform.source {
        Source::Value => source.clone(),
        Source::Field(path) => lookup_path(source, path).cloned().unwrap_or(Value::Null),
        Source::DefaultField => {
            let field = pascal_field(column);
            source.get(&field).cloned().unwrap_or(Value::Null)
        }
    };

    match transform.then {
        Some(f) if !selected.is_null() => f(&selected),
        _ => Ok(selected),
    }
}

/// Coerce an extracted value to its declared column type
pub fn coerce(column: &str, kind: ColumnType, value: Value) -> Result<CellValue> {
    if value.is_null() {
        return Ok(CellValue::Null);
    }

    let mismatch = |value: &Value| Error::Decode {
        context: format!("column '{column}'"),
        message: format!("cannot coerce {value} to {kind:?}"),
    };

    match kind {
        ColumnType::String => match value {
            Value::String(s) => Ok(CellValue::String(s)),
            Value::Number(n) => Ok(CellValue::String(n.to_string())),
            Value::Bool(b) => Ok(CellValue::String(b.to_string())),
            other => Err(mismatch(&other)),
        },
        ColumnType::Int => match &value {
            Value::Number(n) => n.as_i64().map(CellValue::Int).ok_or_else(|| mismatch(&value)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(CellValue::Int)
                .map_err(|_| mismatch(&value)),
            _ => Err(mismatch(&value)),
        },
        ColumnType::Bool => match &value {
            Value::Bool(b) => Ok(CellValue::Bool(*b)),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(CellValue::Bool(true)),
                "false" => Ok(CellValue::Bool(false)),
                _ => Err(mismatch(&value)),
            },
            _ => Err(mismatch(&value)),
        },
        ColumnType::Timestamp => parse_timestamp(&value)
            .map(CellValue::Timestamp)
            .ok_or_else(|| mismatch(&value)),
        ColumnType::Json => Ok(CellValue::Json(value)),
    }
}

/// Parse RFC3339 strings, or epoch seconds (SQS attribute convention)
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                return Some(parsed.with_timezone(&Utc));
            }
            let seconds = s.trim().parse::<i64>().ok()?;
            DateTime::from_timestamp(seconds, 0)
        }
        Value::Number(n) => {
            if let Some(seconds) = n.as_i64() {
                return DateTime::from_timestamp(seconds, 0);
            }
            let f = n.as_f64()?;
            DateTime::from_timestamp(f.trunc() as i64, (f.fract() * 1e9) as u32)
        }
        _ => None,
    }
}

/// Render the full row for one item and its hydrate results
pub fn render_row(
    table: &str,
    columns: &[Column],
    item: &Value,
    hydrates: &HydrateMap,
) -> Result<Row> {
    let mut cells = Vec::with_capacity(columns.len());

    for column in columns {
        let source = match column.hydrate {
            None => item,
            Some(name) => hydrates.get(name).ok_or_else(|| {
                Error::UnknownHydrator(format!("{name} (column {table}.{})", column.name))
            })?,
        };

        let value = apply(&column.transform, column.name, source)?;
        cells.push((column.name, coerce(column.name, column.kind, value)?));
    }

    Ok(Row { cells })
}

// ---------------------------------------------------------------------------
// Shared post-map functions used by table definitions
// ---------------------------------------------------------------------------

/// Wrap a resource ARN into the single-element akas list
pub fn arn_to_akas(value: &Value) -> Result<Value> {
    match value.as_str() {
        Some(arn) => Ok(Value::Array(vec![Value::String(arn.to_string())])),
        None => Err(Error::decode("akas", "ARN is not a string")),
    }
}

/// Convert an AWS `[{"Key": .., "Value": ..}]` tag list to a flat map
pub fn tag_list_to_map(value: &Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Array(tags) => {
            let mut map = serde_json::Map::new();
            for tag in tags {
                let key = tag.get("Key").and_then(Value::as_str);
                let val = tag.get("Value").and_then(Value::as_str);
                let (Some(key), Some(val)) = (key, val) else {
                    return Err(Error::decode("tag list", "entry missing Key or Value"));
                };
                map.insert(key.to_string(), Value::String(val.to_string()));
            }
            Ok(Value::Object(map))
        }
        other => Err(Error::decode(
            "tag list",
            format!("expected array, got {other}"),
        )),
    }
}

/// Decode a URL-encoded JSON document (IAM policy document convention)
pub fn url_decoded_json(value: &Value) -> Result<Value> {
    let encoded = value
        .as_str()
        .ok_or_else(|| Error::decode("policy document", "expected URL-encoded string"))?;
    let decoded =
        urlencoding::decode(encoded).map_err(|e| Error::decode("policy document", e))?;
    serde_json::from_str(&decoded).map_err(|e| Error::decode("policy document", e))
}

/// Parse a JSON document embedded as a plain string attribute
pub fn embedded_json(value: &Value) -> Result<Value> {
    let raw = value
        .as_str()
        .ok_or_else(|| Error::decode("embedded JSON", "expected string"))?;
    serde_json::from_str(raw).map_err(|e| Error::decode("embedded JSON", e))
}
