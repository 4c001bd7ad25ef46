use crate::utils::nom_helper::{
    nom_unsigned_eight_bytes, nom_unsigned_four_bytes, nom_unsigned_sixteen_bytes,
    nom_unsigned_two_bytes, Endian,
};
use crate::utils::strings::{extract_utf16_chars, parse_file_reference};
use common::ntfs::{Reason, Source};

/// Smallest possible v2 record: the 60 byte header with an empty name
pub(crate) const MIN_RECORD_SIZE: u32 = 60;
/// Anything larger than this is treated as corruption
pub(crate) const MAX_RECORD_SIZE: u32 = 1024 * 1024;

/// One on-disk change journal record (USN_RECORD v2, v3 or v4)
#[derive(Debug, Clone)]
pub(crate) struct UsnRecord {
    pub(crate) record_length: u32,
    pub(crate) major_version: u16,
    pub(crate) minor_version: u16,
    pub(crate) mft_entry: u64,
    pub(crate) mft_sequence: u16,
    pub(crate) parent_mft_entry: u64,
    pub(crate) parent_mft_sequence: u16,
    pub(crate) usn: u64,
    pub(crate) timestamp: u64,
    pub(crate) reason: u32,
    pub(crate) source_info: u32,
    pub(crate) security_id: u32,
    pub(crate) file_attributes: u32,
    pub(crate) name: String,
}

impl UsnRecord {
    /// Decode one record. `data` must hold at least `record_length` bytes.
    /// v2 uses 8 byte file references, v3 and v4 use 16 bytes (the upper half
    /// of an extended reference is preserved in the low 48/16 split only).
    /// v4 trails extent data that event emission does not need, the caller's
    /// cursor advance skips it via the record length
    pub(crate) fn parse_record(data: &[u8]) -> nom::IResult<&[u8], UsnRecord> {
        let (input, record_length) = nom_unsigned_four_bytes(data, Endian::Le)?;
        let (input, major_version) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, minor_version) = nom_unsigned_two_bytes(input, Endian::Le)?;

        let references_large = major_version >= 3;
        let (input, (mft_entry, mft_sequence)) = nom_reference(input, references_large)?;
        let (input, (parent_mft_entry, parent_mft_sequence)) =
            nom_reference(input, references_large)?;

        let (input, usn) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, timestamp) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, reason) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, source_info) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, security_id) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, file_attributes) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, name_size) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, name_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;

        // The name offset is relative to the record start
        let name_start = name_offset as usize;
        let name_end = name_start + name_size as usize;
        let name = if name_size > 0 && name_end <= data.len() {
            extract_utf16_chars(&data[name_start..name_end], name_size as usize / 2)
        } else {
            String::new()
        };

        let record = UsnRecord {
            record_length,
            major_version,
            minor_version,
            mft_entry,
            mft_sequence,
            parent_mft_entry,
            parent_mft_sequence,
            usn,
            timestamp,
            reason,
            source_info,
            security_id,
            file_attributes,
            name,
        };

        Ok((input, record))
    }

    /// The set reason bits in ascending bit order. Event emission produces one
    /// row per entry. Unknown-only reason masks map to a single `Unknown`
    pub(crate) fn reason_list(&self) -> Vec<Reason> {
        let values = [
            (0x1, Reason::Overwrite),
            (0x2, Reason::Extend),
            (0x4, Reason::Truncation),
            (0x10, Reason::NamedOverwrite),
            (0x20, Reason::NamedExtend),
            (0x40, Reason::NamedTruncation),
            (0x100, Reason::FileCreate),
            (0x200, Reason::FileDelete),
            (0x400, Reason::EaChange),
            (0x800, Reason::SecurityChange),
            (0x1000, Reason::RenameOldName),
            (0x2000, Reason::RenameNewName),
            (0x4000, Reason::IndexableChange),
            (0x8000, Reason::BasicInfoChange),
            (0x10000, Reason::HardLinkChange),
            (0x20000, Reason::CompressionChange),
            (0x40000, Reason::EncryptionChange),
            (0x80000, Reason::ObjectIdChange),
            (0x100000, Reason::ReparsePointChange),
            (0x200000, Reason::StreamChange),
            (0x400000, Reason::TransactedChange),
            (0x800000, Reason::IntegrityChange),
            (0x80000000, Reason::Close),
        ];

        let mut reasons = Vec::new();
        for (bit, reason) in values {
            if (self.reason & bit) == bit {
                reasons.push(reason);
            }
        }
        if reasons.is_empty() {
            reasons.push(Reason::Unknown);
        }

        reasons
    }

    /// Source info flags (rarely anything but none)
    pub(crate) fn source(&self) -> Source {
        match self.source_info {
            0x1 => Source::DataManagement,
            0x2 => Source::AuxiliaryData,
            0x4 => Source::ReplicationManagement,
            0x8 => Source::ClientReplicationManagement,
            _ => Source::None,
        }
    }
}

/// File reference: 8 bytes (6+2) on v2, 16 bytes on v3/v4 with the entry in
/// the low 48 bits and the sequence in the following 16
fn nom_reference(data: &[u8], large: bool) -> nom::IResult<&[u8], (u64, u16)> {
    if large {
        let (input, raw) = nom_unsigned_sixteen_bytes(data, Endian::Le)?;
        let (entry, sequence) = parse_file_reference(raw as u64);
        return Ok((input, (entry, sequence)));
    }

    let (input, raw) = nom_unsigned_eight_bytes(data, Endian::Le)?;
    Ok((input, parse_file_reference(raw)))
}
