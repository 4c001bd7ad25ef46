use crate::output::error::OutputError;
use crate::output::sink::{flat_value, RecordKind, RecordSink};
use log::error;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;

/// Rows buffered per transaction
const BATCH_SIZE: usize = 10_000;

/// One table per record kind. Columns come from the first record: INTEGER for
/// numbers and booleans, TEXT otherwise. `finish` creates the kind's btree
/// index; a cancelled run commits the open batch and skips the index
pub(crate) struct SqliteSink {
    connection: Connection,
    kind: RecordKind,
    columns: Vec<String>,
    insert_query: String,
    batch: Vec<Vec<String>>,
    finalized: bool,
}

impl SqliteSink {
    pub(crate) fn create(path: &str, kind: RecordKind) -> Result<SqliteSink, OutputError> {
        let connection_result = Connection::open(path);
        let connection = match connection_result {
            Ok(result) => result,
            Err(err) => {
                error!("[output] Failed to open database {path}: {err:?}");
                return Err(OutputError::Database);
            }
        };

        Ok(SqliteSink {
            connection,
            kind,
            columns: Vec::new(),
            insert_query: String::new(),
            batch: Vec::new(),
            finalized: false,
        })
    }

    /// Table and insert statement from the first record's shape
    fn setup_table(&mut self, record: &serde_json::Map<String, Value>) -> Result<(), OutputError> {
        let mut definitions = Vec::new();
        for (key, value) in record {
            self.columns.push(key.clone());
            let affinity = match value {
                Value::Number(_) | Value::Bool(_) => "INTEGER",
                _ => "TEXT",
            };
            definitions.push(format!("\"{key}\" {affinity}"));
        }

        let table = self.kind.table();
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (row INTEGER PRIMARY KEY, {})",
            definitions.join(", ")
        );
        if let Err(err) = self.connection.execute(&create, []) {
            error!("[output] Failed to create table {table}: {err:?}");
            return Err(OutputError::Database);
        }

        let column_names: Vec<String> = self
            .columns
            .iter()
            .map(|name| format!("\"{name}\""))
            .collect();
        let placeholders: Vec<String> = (1..=self.columns.len())
            .map(|index| format!("?{index}"))
            .collect();
        self.insert_query = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            column_names.join(", "),
            placeholders.join(", ")
        );

        Ok(())
    }

    fn flush_batch(&mut self) -> Result<(), OutputError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let transaction = match self.connection.transaction() {
            Ok(result) => result,
            Err(err) => {
                error!("[output] Failed to open transaction: {err:?}");
                return Err(OutputError::Database);
            }
        };

        {
            let mut statement = match transaction.prepare_cached(&self.insert_query) {
                Ok(result) => result,
                Err(err) => {
                    error!("[output] Failed to prepare insert: {err:?}");
                    return Err(OutputError::Database);
                }
            };
            for row in &self.batch {
                if let Err(err) = statement.execute(params_from_iter(row.iter())) {
                    error!("[output] Failed to insert row: {err:?}");
                    return Err(OutputError::Database);
                }
            }
        }

        if let Err(err) = transaction.commit() {
            error!("[output] Failed to commit batch: {err:?}");
            return Err(OutputError::Database);
        }
        self.batch.clear();

        Ok(())
    }
}

impl RecordSink for SqliteSink {
    fn write(&mut self, record: &Value) -> Result<(), OutputError> {
        let object = match record.as_object() {
            Some(result) => result,
            None => return Err(OutputError::Serialize),
        };

        if self.columns.is_empty() {
            self.setup_table(object)?;
        }

        let mut row = Vec::with_capacity(self.columns.len());
        for key in &self.columns {
            let cell = object.get(key).map(flat_value).unwrap_or_default();
            row.push(cell);
        }
        self.batch.push(row);

        if self.batch.len() >= BATCH_SIZE {
            self.flush_batch()?;
        }
        Ok(())
    }

    /// Commit what arrived, create no index
    fn cancelled(&mut self) -> Result<(), OutputError> {
        self.finalized = true;
        self.flush_batch()
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.flush_batch()?;

        if let Some(column) = self.kind.index_column() {
            let table = self.kind.table();
            let index = format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table}(\"{column}\")"
            );
            if let Err(err) = self.connection.execute(&index, []) {
                error!("[output] Failed to create index on {table}: {err:?}");
                return Err(OutputError::Database);
            }
        }

        Ok(())
    }
}
