use super::error::OutputError;
use super::formats::{csv::CsvSink, json::JsonSink, sqlite::SqliteSink};
use serde_json::Value;

/// What kind of records a sink receives. Decides the SQLite table name and
/// index column
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordKind {
    Mft,
    UsnJrnl,
    Logfile,
    Timeline,
}

impl RecordKind {
    pub(crate) fn table(&self) -> &'static str {
        match self {
            RecordKind::Mft => "mft",
            RecordKind::UsnJrnl => "usnjrnl",
            RecordKind::Logfile => "logfile",
            RecordKind::Timeline => "timeline",
        }
    }

    /// Column indexed at finalization
    pub(crate) fn index_column(&self) -> Option<&'static str> {
        match self {
            RecordKind::Mft => Some("entry_number"),
            RecordKind::UsnJrnl => Some("update_sequence_number"),
            RecordKind::Logfile => Some("lsn"),
            RecordKind::Timeline => Some("timestamp"),
        }
    }
}

/// Output boundary for decoded records. Writers are forward-only; `finish`
/// finalizes the output and `cancelled` leaves a marker instead (database
/// sinks commit what they have and skip finalization)
pub(crate) trait RecordSink {
    fn write(&mut self, record: &Value) -> Result<(), OutputError>;
    fn cancelled(&mut self) -> Result<(), OutputError>;
    fn finish(&mut self) -> Result<(), OutputError>;
}

/// Build a sink for the requested format. `path` carries no extension, the
/// sink appends its own
pub(crate) fn build_sink(
    format: &str,
    path: &str,
    kind: RecordKind,
) -> Result<Box<dyn RecordSink>, OutputError> {
    match format {
        "csv" => Ok(Box::new(CsvSink::create(&format!("{path}.csv"))?)),
        "json" => Ok(Box::new(JsonSink::create(&format!("{path}.json"))?)),
        "sqlite" => Ok(Box::new(SqliteSink::create(&format!("{path}.db"), kind)?)),
        _ => {
            log::error!("[output] Unknown output format {format}");
            Err(OutputError::UnknownFormat)
        }
    }
}

/// Render a JSON value for a flat cell: bare strings, `|` joined arrays
pub(crate) fn flat_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(values) => values
            .iter()
            .map(flat_value)
            .collect::<Vec<String>>()
            .join("|"),
        other => other.to_string(),
    }
}
