use crate::utils::nom_helper::{
    nom_unsigned_eight_bytes, nom_unsigned_four_bytes, nom_unsigned_two_bytes, Endian,
};
use crate::utils::strings::parse_file_reference;

pub(crate) const FILE_SIGNATURE: u32 = 0x454c_4946;
pub(crate) const BAAD_SIGNATURE: u32 = 0x4441_4142;

/// The 48 byte header in front of every MFT entry
#[derive(Debug)]
pub(crate) struct MftHeader {
    pub(crate) sig: u32,
    pub(crate) fix_up_offset: u16,
    pub(crate) fix_up_count: u16,
    pub(crate) logfile_sequence: u64,
    pub(crate) sequence: u16,
    pub(crate) hard_links: u16,
    pub(crate) attrib_offset: u16,
    pub(crate) entry_flags: u16,
    pub(crate) used_size: u32,
    pub(crate) total_size: u32,
    pub(crate) base_entry: u64,
    pub(crate) base_sequence: u16,
    pub(crate) next_attrib_id: u16,
    pub(crate) index: u32,
}

impl MftHeader {
    pub(crate) fn parse_header(data: &[u8]) -> nom::IResult<&[u8], MftHeader> {
        let (input, sig) = nom_unsigned_four_bytes(data, Endian::Le)?;
        let (input, fix_up_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, fix_up_count) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, logfile_sequence) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, sequence) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, hard_links) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, attrib_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, entry_flags) = nom_unsigned_two_bytes(input, Endian::Le)?;

        let (input, used_size) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, total_size) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, base_reference) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, next_attrib_id) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _align) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, index) = nom_unsigned_four_bytes(input, Endian::Le)?;

        let (base_entry, base_sequence) = parse_file_reference(base_reference);
        let header = MftHeader {
            sig,
            fix_up_offset,
            fix_up_count,
            logfile_sequence,
            sequence,
            hard_links,
            attrib_offset,
            entry_flags,
            used_size,
            total_size,
            base_entry,
            base_sequence,
            next_attrib_id,
            index,
        };

        Ok((input, header))
    }

    pub(crate) fn is_in_use(&self) -> bool {
        self.entry_flags & 0x1 != 0
    }

    pub(crate) fn is_directory(&self) -> bool {
        self.entry_flags & 0x2 != 0
    }

    /// Extension records point back at their base record
    pub(crate) fn is_extension(&self) -> bool {
        self.base_entry != 0
    }
}
