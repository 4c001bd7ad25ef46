use crate::output::error::OutputError;
use crate::output::sink::RecordSink;
use log::error;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};

/// One streamed JSON array, a record per element. Records are written as they
/// arrive so the file never lives in memory
pub(crate) struct JsonSink {
    writer: BufWriter<File>,
    first: bool,
}

impl JsonSink {
    pub(crate) fn create(path: &str) -> Result<JsonSink, OutputError> {
        let file_result = File::create(path);
        let file = match file_result {
            Ok(result) => result,
            Err(err) => {
                error!("[output] Failed to create json output {path}: {err:?}");
                return Err(OutputError::CreateFile);
            }
        };

        let mut writer = BufWriter::new(file);
        if writer.write_all(b"[\n").is_err() {
            return Err(OutputError::CreateFile);
        }

        Ok(JsonSink {
            writer,
            first: true,
        })
    }

    fn write_raw(&mut self, text: &str) -> Result<(), OutputError> {
        let separator: &[u8] = if self.first { b"  " } else { b",\n  " };
        self.first = false;

        if self.writer.write_all(separator).is_err()
            || self.writer.write_all(text.as_bytes()).is_err()
        {
            return Err(OutputError::WriteRecord);
        }
        Ok(())
    }
}

impl RecordSink for JsonSink {
    fn write(&mut self, record: &Value) -> Result<(), OutputError> {
        let serialized = match serde_json::to_string(record) {
            Ok(result) => result,
            Err(err) => {
                error!("[output] Failed to serialize json record: {err:?}");
                return Err(OutputError::Serialize);
            }
        };

        self.write_raw(&serialized)
    }

    fn cancelled(&mut self) -> Result<(), OutputError> {
        self.write_raw("\"<cancelled>\"")?;
        self.finish()
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        if self.writer.write_all(b"\n]\n").is_err() || self.writer.flush().is_err() {
            return Err(OutputError::WriteRecord);
        }
        Ok(())
    }
}
