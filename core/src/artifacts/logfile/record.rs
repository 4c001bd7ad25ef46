use crate::artifacts::mft::attributes::standard::file_attribute_flags;
use crate::utils::nom_helper::{
    nom_data, nom_unsigned_eight_bytes, nom_unsigned_four_bytes, nom_unsigned_two_bytes, Endian,
};
use crate::utils::strings::extract_utf16_chars;
use crate::utils::time::filetime_to_iso;
use common::ntfs::AttributeFlags;

/// Log record header size
pub(crate) const RECORD_HEADER_SIZE: usize = 0x58;

/// One `$LogFile` log record: the 0x58 byte header plus whatever could be
/// recovered from the client data. Full redo/undo payload semantics are not
/// decoded, only embedded `$FILE_NAME` material is scavenged
#[derive(Debug)]
pub(crate) struct LogRecord {
    pub(crate) this_lsn: u64,
    pub(crate) previous_lsn: u64,
    pub(crate) client_undo_lsn: u64,
    pub(crate) client_data_length: u32,
    pub(crate) record_type: u32,
    pub(crate) transaction_id: u32,
    pub(crate) flags: u16,
    pub(crate) redo_op: u16,
    pub(crate) undo_op: u16,
    pub(crate) redo_offset: u16,
    pub(crate) redo_length: u16,
    pub(crate) undo_offset: u16,
    pub(crate) undo_length: u16,
    pub(crate) target_attribute: u16,
    pub(crate) target_vcn: u64,
    // Scavenged from client data
    pub(crate) filename: String,
    pub(crate) file_reference: u64,
    pub(crate) parent_reference: u64,
    pub(crate) timestamp: String,
    pub(crate) file_attributes: Vec<AttributeFlags>,
}

/// Redo/undo operation codes
pub(crate) fn opcode_name(opcode: u16) -> String {
    let name = match opcode {
        0x00 => "Noop",
        0x01 => "CompensationLogRecord",
        0x02 => "InitializeFileRecordSegment",
        0x03 => "DeallocateFileRecordSegment",
        0x04 => "WriteEndOfFileRecordSegment",
        0x05 => "CreateAttribute",
        0x06 => "DeleteAttribute",
        0x07 => "UpdateResidentValue",
        0x08 => "UpdateNonresidentValue",
        0x09 => "UpdateMappingPairs",
        0x0a => "DeleteDirtyClusters",
        0x0b => "SetNewAttributeSizes",
        0x0c => "AddIndexEntryRoot",
        0x0d => "DeleteIndexEntryRoot",
        0x0e => "AddIndexEntryAllocation",
        0x0f => "UpdateFileNameRoot",
        0x10 => "UpdateFileNameAllocation",
        0x11 => "SetIndexEntryVcnAllocation",
        0x12 => "DeleteIndexEntryAllocation",
        0x13 => "SetBitsInNonresidentBitMap",
        0x14 => "ClearBitsInNonresidentBitMap",
        0x19 => "PrepareTransaction",
        0x1a => "CommitTransaction",
        0x1b => "ForgetTransaction",
        0x1c => "OpenNonresidentAttribute",
        0x1f => "DirtyPageTableDump",
        0x20 => "TransactionTableDump",
        0x21 => "UpdateRecordDataRoot",
        _ => return format!("Op{opcode:#04x}"),
    };

    name.to_string()
}

impl LogRecord {
    /// Parse one record at the start of `data`. A zero LSN marks the free tail
    /// of a page
    pub(crate) fn parse_record(data: &[u8]) -> Option<LogRecord> {
        if data.len() < RECORD_HEADER_SIZE {
            return None;
        }

        let parsed = LogRecord::parse_header(data);
        let (_, mut record) = match parsed {
            Ok(result) => result,
            Err(_err) => return None,
        };
        if record.this_lsn == 0 {
            return None;
        }
        // Anything bigger is not a plausible client payload
        let max_client_data = 0x10000;
        if record.client_data_length > max_client_data {
            return None;
        }

        let client_start = RECORD_HEADER_SIZE;
        let client_end = client_start + record.client_data_length as usize;
        if record.client_data_length > 0 && client_end <= data.len() {
            record.scavenge_client_data(&data[client_start..client_end]);
        }

        Some(record)
    }

    fn parse_header(data: &[u8]) -> nom::IResult<&[u8], LogRecord> {
        let (input, this_lsn) = nom_unsigned_eight_bytes(data, Endian::Le)?;
        let (input, previous_lsn) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, client_undo_lsn) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, client_data_length) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, _client_id) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, record_type) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, transaction_id) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, flags) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _reserved) = nom_data(input, 6)?;
        let (input, redo_op) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, undo_op) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, redo_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, redo_length) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, undo_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, undo_length) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, target_attribute) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _lcns_to_follow) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _record_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _attribute_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _reserved) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, target_vcn) = nom_unsigned_eight_bytes(input, Endian::Le)?;

        let record = LogRecord {
            this_lsn,
            previous_lsn,
            client_undo_lsn,
            client_data_length,
            record_type,
            transaction_id,
            flags,
            redo_op,
            undo_op,
            redo_offset,
            redo_length,
            undo_offset,
            undo_length,
            target_attribute,
            target_vcn,
            filename: String::new(),
            file_reference: 0,
            parent_reference: 0,
            timestamp: String::new(),
            file_attributes: Vec::new(),
        };

        Ok((input, record))
    }

    /// Index-entry operations embed a $FILE_NAME after a 16 byte entry header,
    /// other operations may embed one anywhere. Try the redo payload, the undo
    /// payload, then scan the whole client data at 8 byte steps
    fn scavenge_client_data(&mut self, data: &[u8]) {
        let index_entry_ops = [0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x12];

        if index_entry_ops.contains(&self.redo_op) {
            let start = self.redo_offset as usize;
            let end = start + self.redo_length as usize;
            if self.redo_length > 0 && end <= data.len() {
                self.scavenge_index_entry(&data[start..end]);
            }
            if self.filename.is_empty() {
                self.scavenge_index_entry(data);
            }
        }

        if self.filename.is_empty() && index_entry_ops.contains(&self.undo_op) {
            let start = self.undo_offset as usize;
            let end = start + self.undo_length as usize;
            if self.undo_length > 0 && end <= data.len() {
                self.scavenge_index_entry(&data[start..end]);
            }
        }

        if self.filename.is_empty() {
            self.scan_for_filename(data);
        }
    }

    /// Client data shaped like a directory index entry: file reference,
    /// lengths, then the $FILE_NAME content at offset 16
    fn scavenge_index_entry(&mut self, data: &[u8]) {
        let entry_header = 16;
        let filename_min = 0x42;
        if data.len() < entry_header + filename_min {
            self.parse_filename_at(data, 0);
            return;
        }

        let reference = u64::from_le_bytes(data[0..8].try_into().unwrap_or_default());
        let entry_length = u16::from_le_bytes([data[8], data[9]]);
        let key_length = u16::from_le_bytes([data[10], data[11]]);

        let plausible_entry = 0x10_0000_0000;
        if reference & 0xffff_ffff_ffff < plausible_entry && entry_length > 0x10 && key_length > 0 {
            if self.parse_filename_at(data, entry_header) {
                self.file_reference = reference;
                return;
            }
        }

        self.parse_filename_at(data, 0);
    }

    /// Try to read a $FILE_NAME value at the offset. True when a plausible
    /// name was recovered
    fn parse_filename_at(&mut self, data: &[u8], offset: usize) -> bool {
        let name_length_offset = 0x40;
        let header = 0x42;
        if offset + header > data.len() {
            return false;
        }

        let value = &data[offset..];
        let name_length = value[name_length_offset] as usize;
        let namespace = value[name_length_offset + 1];
        if name_length == 0 || namespace > 3 {
            return false;
        }
        let name_end = header + name_length * 2;
        if name_end > value.len() {
            return false;
        }

        let name = extract_utf16_chars(&value[header..name_end], name_length);
        if name.is_empty() || name.chars().any(|c| c.is_control()) {
            return false;
        }

        self.filename = name;
        self.parent_reference = u64::from_le_bytes(value[0..8].try_into().unwrap_or_default());

        let created = u64::from_le_bytes(value[8..16].try_into().unwrap_or_default());
        if created > 0 {
            self.timestamp = filetime_to_iso(&created);
        }
        let attributes = u32::from_le_bytes(value[0x38..0x3c].try_into().unwrap_or_default());
        self.file_attributes = file_attribute_flags(&attributes);

        true
    }

    /// Last resort: look for a $FILE_NAME shape at every 8 byte offset
    fn scan_for_filename(&mut self, data: &[u8]) {
        let header = 0x42;
        if data.len() < header {
            return;
        }

        let step = 8;
        let plausible_entry = 0x10_0000_0000;
        let mut offset = 0;
        while offset + header <= data.len() {
            let parent = u64::from_le_bytes(
                data[offset..offset + 8].try_into().unwrap_or_default(),
            );
            if parent & 0xffff_ffff_ffff < plausible_entry && self.parse_filename_at(data, offset) {
                return;
            }
            offset += step;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{opcode_name, LogRecord, RECORD_HEADER_SIZE};

    /// $FILE_NAME value bytes for the scavenger
    pub(crate) fn filename_value(parent: u64, name: &str) -> Vec<u8> {
        let name_units: Vec<u16> = name.encode_utf16().collect();
        let mut value = vec![0u8; 0x42 + name_units.len() * 2];
        value[0..8].copy_from_slice(&parent.to_le_bytes());
        value[8..16].copy_from_slice(&132244766418940254u64.to_le_bytes());
        value[0x38..0x3c].copy_from_slice(&0x20u32.to_le_bytes());
        value[0x40] = name_units.len() as u8;
        value[0x41] = 3;
        for (index, unit) in name_units.iter().enumerate() {
            value[0x42 + index * 2..0x44 + index * 2].copy_from_slice(&unit.to_le_bytes());
        }
        value
    }

    /// Log record bytes: header + client data
    pub(crate) fn build_log_record(lsn: u64, redo_op: u16, client_data: &[u8]) -> Vec<u8> {
        let mut record = vec![0u8; RECORD_HEADER_SIZE];
        record[0..8].copy_from_slice(&lsn.to_le_bytes());
        record[0x18..0x1c].copy_from_slice(&(client_data.len() as u32).to_le_bytes());
        record[0x20..0x24].copy_from_slice(&1u32.to_le_bytes());
        record[0x24..0x28].copy_from_slice(&7u32.to_le_bytes());
        record[0x30..0x32].copy_from_slice(&redo_op.to_le_bytes());
        record[0x32..0x34].copy_from_slice(&0x14u16.to_le_bytes());
        if !client_data.is_empty() {
            record[0x36..0x38].copy_from_slice(&(client_data.len() as u16).to_le_bytes());
        }
        record.extend_from_slice(client_data);
        record
    }

    #[test]
    fn test_parse_record() {
        let record_bytes = build_log_record(0x5000, 0x02, &[]);
        let record = LogRecord::parse_record(&record_bytes).unwrap();

        assert_eq!(record.this_lsn, 0x5000);
        assert_eq!(record.redo_op, 0x02);
        assert_eq!(record.undo_op, 0x14);
        assert_eq!(record.transaction_id, 7);
        assert!(record.filename.is_empty());
    }

    #[test]
    fn test_parse_record_zero_lsn() {
        let record_bytes = vec![0u8; RECORD_HEADER_SIZE];
        assert!(LogRecord::parse_record(&record_bytes).is_none());
    }

    #[test]
    fn test_scavenge_filename() {
        // InitializeFileRecordSegment whose payload embeds a $FILE_NAME
        let mut client = vec![0u8; 16];
        client.append(&mut filename_value(5, "dropper.exe"));

        let record_bytes = build_log_record(0x5000, 0x02, &client);
        let record = LogRecord::parse_record(&record_bytes).unwrap();

        assert_eq!(record.filename, "dropper.exe");
        assert_eq!(record.parent_reference & 0xffff_ffff_ffff, 5);
        assert!(!record.timestamp.is_empty());
    }

    #[test]
    fn test_opcode_name() {
        assert_eq!(opcode_name(0x02), "InitializeFileRecordSegment");
        assert_eq!(opcode_name(0x1a), "CommitTransaction");
        assert_eq!(opcode_name(0x99), "Op0x99");
    }
}
