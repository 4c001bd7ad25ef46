use super::header::{AttributeHeader, AttributeType};
use crate::utils::nom_helper::{
    nom_unsigned_eight_bytes, nom_unsigned_four_bytes, nom_unsigned_one_byte,
    nom_unsigned_two_bytes, Endian,
};
use crate::utils::strings::extract_utf16_chars;
use log::warn;
use nom::bytes::complete::take;
use serde::Serialize;

/// One entry of a `$ATTRIBUTE_LIST` (0x20) value. Each entry points at the MFT
/// record that actually holds the attribute instance
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AttributeListEntry {
    pub(crate) attrib_type: AttributeType,
    pub(crate) entry_size: u16,
    pub(crate) first_vcn: u64,
    pub(crate) mft_entry: u64,
    pub(crate) mft_sequence: u16,
    pub(crate) attrib_id: u16,
    pub(crate) name: String,
}

/// Walk all entries of an attribute list value
pub(crate) fn parse_attribute_list(data: &[u8]) -> nom::IResult<&[u8], Vec<AttributeListEntry>> {
    let min_entry_size = 26;
    let mut remaining = data;

    let mut entries = Vec::new();
    while remaining.len() >= min_entry_size {
        let (input, type_data) = nom_unsigned_four_bytes(remaining, Endian::Le)?;
        let (input, entry_size) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, name_size) = nom_unsigned_one_byte(input, Endian::Le)?;
        let (input, name_offset) = nom_unsigned_one_byte(input, Endian::Le)?;
        let (input, first_vcn) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, mft_entry_low) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, mft_entry_high) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, mft_sequence) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (_, attrib_id) = nom_unsigned_two_bytes(input, Endian::Le)?;

        if entry_size as usize > remaining.len() || (entry_size as usize) < min_entry_size {
            warn!("[mft] Attribute list entry size {entry_size} exceeds the value bounds");
            break;
        }

        // Name lives inside the entry at its own offset
        let name = if name_size > 0 {
            let start = name_offset as usize;
            let end = start + name_size as usize * 2;
            if end <= entry_size as usize {
                extract_utf16_chars(&remaining[start..end], name_size as usize)
            } else {
                String::new()
            }
        } else {
            String::new()
        };

        let entry = AttributeListEntry {
            attrib_type: AttributeHeader::get_type(&type_data),
            entry_size,
            first_vcn,
            mft_entry: (mft_entry_high as u64) << 32 | mft_entry_low as u64,
            mft_sequence,
            attrib_id,
            name,
        };
        entries.push(entry);

        let (input, _entry_data) = take(entry_size)(remaining)?;
        remaining = input;
    }

    Ok((remaining, entries))
}

#[cfg(test)]
mod tests {
    use super::parse_attribute_list;
    use crate::artifacts::mft::attributes::header::AttributeType;

    /// Build one list entry pointing a named attribute at another MFT record
    fn build_entry(attrib_type: u32, mft_entry: u32, sequence: u16, name: &str) -> Vec<u8> {
        let name_units: Vec<u16> = name.encode_utf16().collect();
        let mut size = 26 + name_units.len() * 2;
        // Entries are 8-aligned on disk
        size = (size + 7) & !7;

        let mut entry = vec![0u8; size];
        entry[0..4].copy_from_slice(&attrib_type.to_le_bytes());
        entry[4..6].copy_from_slice(&(size as u16).to_le_bytes());
        entry[6] = name_units.len() as u8;
        entry[7] = 26;
        entry[16..20].copy_from_slice(&mft_entry.to_le_bytes());
        entry[22..24].copy_from_slice(&sequence.to_le_bytes());
        for (index, unit) in name_units.iter().enumerate() {
            entry[26 + index * 2..28 + index * 2].copy_from_slice(&unit.to_le_bytes());
        }
        entry
    }

    #[test]
    fn test_parse_attribute_list() {
        let mut value = build_entry(0x10, 40, 2, "");
        value.append(&mut build_entry(0x80, 41, 3, "$J"));

        let (_, entries) = parse_attribute_list(&value).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].attrib_type, AttributeType::StandardInformation);
        assert_eq!(entries[0].mft_entry, 40);
        assert_eq!(entries[1].attrib_type, AttributeType::Data);
        assert_eq!(entries[1].mft_entry, 41);
        assert_eq!(entries[1].mft_sequence, 3);
        assert_eq!(entries[1].name, "$J");
    }

    #[test]
    fn test_parse_attribute_list_truncated() {
        let mut value = build_entry(0x80, 41, 3, "$J");
        // Claim a size larger than the value
        value[4..6].copy_from_slice(&200u16.to_le_bytes());

        let (_, entries) = parse_attribute_list(&value).unwrap();
        assert!(entries.is_empty());
    }
}
