use crate::output::error::OutputError;
use crate::output::sink::{flat_value, RecordSink};
use csv::{Writer, WriterBuilder};
use log::error;
use serde_json::Value;
use std::fs::File;
use std::io::Write;

/// UTF-8 byte order mark so spreadsheet tools pick the right encoding
const BOM: [u8; 3] = [0xef, 0xbb, 0xbf];

/// RFC 4180 output. The header row comes from the first record's keys, every
/// record of one kind shares the same shape so the order is stable
pub(crate) struct CsvSink {
    writer: Writer<File>,
    header: Vec<String>,
}

impl CsvSink {
    pub(crate) fn create(path: &str) -> Result<CsvSink, OutputError> {
        let file_result = File::create(path);
        let mut file = match file_result {
            Ok(result) => result,
            Err(err) => {
                error!("[output] Failed to create csv output {path}: {err:?}");
                return Err(OutputError::CreateFile);
            }
        };
        if file.write_all(&BOM).is_err() {
            return Err(OutputError::CreateFile);
        }

        // Flexible so the cancellation marker row can be short
        let writer = WriterBuilder::new().flexible(true).from_writer(file);
        Ok(CsvSink {
            writer,
            header: Vec::new(),
        })
    }
}

impl RecordSink for CsvSink {
    fn write(&mut self, record: &Value) -> Result<(), OutputError> {
        let object = match record.as_object() {
            Some(result) => result,
            None => return Err(OutputError::Serialize),
        };

        if self.header.is_empty() {
            self.header = object.keys().cloned().collect();
            if self.writer.write_record(&self.header).is_err() {
                return Err(OutputError::WriteRecord);
            }
        }

        let mut row = Vec::with_capacity(self.header.len());
        for key in &self.header {
            let cell = object.get(key).map(flat_value).unwrap_or_default();
            row.push(cell);
        }
        if self.writer.write_record(&row).is_err() {
            return Err(OutputError::WriteRecord);
        }

        Ok(())
    }

    fn cancelled(&mut self) -> Result<(), OutputError> {
        if self.writer.write_record(["<cancelled>"]).is_err() {
            return Err(OutputError::WriteRecord);
        }
        self.finish()
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        match self.writer.flush() {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("[output] Failed to flush csv output: {err:?}");
                Err(OutputError::WriteRecord)
            }
        }
    }
}
