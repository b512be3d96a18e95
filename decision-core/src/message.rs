use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Implicit column every persisted event carries besides its own columns.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// The set of column names a stream is known (or observed) to carry. Two sets are compared by
/// value, never by identity.
pub type ColumnSet = BTreeSet<String>;

/// Category of operation applied to the events of a micro-batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Print every event to the log.
    Print,
    /// Persist into the columnar store, one table per stream.
    SaveToColumnar,
    /// Index into the document store, one core per stream.
    SaveToDocument,
    /// Insert into the document-collection store, one collection per stream.
    SaveToCollection,
    /// Index into the search engine, one index per stream.
    SaveToSearchIndex,
    /// Publish to the message broker, one topic per stream.
    Forward,
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::Print,
        ActionType::SaveToColumnar,
        ActionType::SaveToDocument,
        ActionType::SaveToCollection,
        ActionType::SaveToSearchIndex,
        ActionType::Forward,
    ];

    /// Lifecycle label that enables this action on a stream.
    pub fn start_operation(&self) -> &'static str {
        match self {
            ActionType::Print => "print",
            ActionType::SaveToColumnar => "save_to_columnar",
            ActionType::SaveToDocument => "save_to_document",
            ActionType::SaveToCollection => "save_to_collection",
            ActionType::SaveToSearchIndex => "index",
            ActionType::Forward => "listen",
        }
    }

    /// Lifecycle label that disables this action on a stream.
    pub fn stop_operation(&self) -> &'static str {
        match self {
            ActionType::Print => "stop_print",
            ActionType::SaveToColumnar => "stop_save_to_columnar",
            ActionType::SaveToDocument => "stop_save_to_document",
            ActionType::SaveToCollection => "stop_save_to_collection",
            ActionType::SaveToSearchIndex => "stop_index",
            ActionType::Forward => "stop_listen",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Print => write!(f, "PRINT"),
            ActionType::SaveToColumnar => write!(f, "SAVE_TO_COLUMNAR"),
            ActionType::SaveToDocument => write!(f, "SAVE_TO_DOCUMENT"),
            ActionType::SaveToCollection => write!(f, "SAVE_TO_COLLECTION"),
            ActionType::SaveToSearchIndex => write!(f, "SAVE_TO_SEARCH_INDEX"),
            ActionType::Forward => write!(f, "FORWARD"),
        }
    }
}

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    String,
    Boolean,
    Double,
    Float,
    Integer,
    Long,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    #[default]
    Null,
    Boolean(bool),
    Long(i64),
    Double(f64),
    String(String),
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => write!(f, "null"),
            ColumnValue::Boolean(v) => write!(f, "{v}"),
            ColumnValue::Long(v) => write!(f, "{v}"),
            ColumnValue::Double(v) => write!(f, "{v}"),
            ColumnValue::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::String(value.to_string())
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        ColumnValue::Double(value)
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        ColumnValue::Long(value)
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        ColumnValue::Boolean(value)
    }
}

impl ColumnValue {
    /// Converts a numeric value into the representation `column_type` declares. A JSON number
    /// carries no integer/float distinction of its own, so `21` sent for a `DOUBLE` column
    /// must become `21.0`. Integral floats are narrowed for integer columns, everything else
    /// is kept as is.
    pub fn coerce(self, column_type: ColumnType) -> Self {
        match (column_type, self) {
            (ColumnType::Double | ColumnType::Float, ColumnValue::Long(v)) => {
                ColumnValue::Double(v as f64)
            }
            (ColumnType::Integer | ColumnType::Long, ColumnValue::Double(v))
                if v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 =>
            {
                ColumnValue::Long(v as i64)
            }
            (_, value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawColumn")]
pub struct Column {
    #[serde(rename = "column")]
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub value: ColumnValue,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType, value: impl Into<ColumnValue>) -> Self {
        Self {
            name: name.into(),
            column_type,
            value: value.into().coerce(column_type),
        }
    }
}

/// Column as it arrives on the wire, before its value is coerced to the declared type.
#[derive(Deserialize)]
struct RawColumn {
    #[serde(rename = "column")]
    name: String,
    #[serde(rename = "type")]
    column_type: ColumnType,
    #[serde(default)]
    value: ColumnValue,
}

impl From<RawColumn> for Column {
    fn from(raw: RawColumn) -> Self {
        Column::new(raw.name, raw.column_type, raw.value)
    }
}

/// One processed record attributed to a logical stream. The schema of a stream is inferred from
/// the columns its events carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    pub stream_name: String,
    pub columns: Vec<Column>,
    pub action_type: ActionType,
    #[serde(default = "Utc::now")]
    pub event_time: DateTime<Utc>,
}

impl StreamEvent {
    pub fn new(stream_name: impl Into<String>, columns: Vec<Column>, action_type: ActionType) -> Self {
        Self {
            stream_name: stream_name.into(),
            columns,
            action_type,
            event_time: Utc::now(),
        }
    }

    /// Names of the columns this event carries, including [`TIMESTAMP_FIELD`].
    pub fn column_set(&self) -> ColumnSet {
        self.columns
            .iter()
            .map(|c| c.name.clone())
            .chain(std::iter::once(TIMESTAMP_FIELD.to_string()))
            .collect()
    }
}
