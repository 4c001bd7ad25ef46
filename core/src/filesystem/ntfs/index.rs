use crate::artifacts::mft::attributes::attribute::{raw_attributes, AttributeForm};
use crate::artifacts::mft::attributes::header::AttributeType;
use crate::filesystem::error::FileSystemError;
use crate::filesystem::ntfs::{
    fixup::apply_fixup,
    reader::MftReader,
    runs::read_run_bytes,
    volume::NtfsVolume,
};
use crate::utils::nom_helper::{
    nom_unsigned_four_bytes, nom_unsigned_two_bytes, nom_unsigned_eight_bytes, Endian,
};
use crate::utils::strings::{extract_utf16_chars, parse_file_reference};
use log::warn;
use std::io::{Read, Seek};

const INDX_SIGNATURE: &[u8] = b"INDX";
/// Index header flag: entries continue in `$INDEX_ALLOCATION`
const LARGE_INDEX: u8 = 0x1;
/// Index entry flag: last entry of a node
const LAST_ENTRY: u32 = 0x2;

/// Find a child of a directory entry by name, via `$INDEX_ROOT` and, for
/// large directories, the `$I30` `$INDEX_ALLOCATION` records. Returns the
/// child's MFT entry number. Name compare is case-insensitive
pub(crate) fn find_in_directory<T: Read + Seek>(
    reader: &MftReader,
    volume: &mut NtfsVolume<T>,
    directory_entry: u64,
    target_name: &str,
) -> Result<Option<u64>, FileSystemError> {
    let (header, entry) = reader.read_entry(volume, directory_entry)?;
    let attributes = raw_attributes(&entry, header.attrib_offset, header.used_size);

    let mut large_index = false;
    for attribute in &attributes {
        if attribute.attrib_type != AttributeType::IndexRoot {
            continue;
        }
        let value = match &attribute.form {
            AttributeForm::Resident { value } => value,
            AttributeForm::NonResident { .. } => continue,
        };
        if value.len() < 32 {
            continue;
        }

        // INDEX_ROOT header is 16 bytes, the index node header follows
        let node = &value[16..];
        let result = parse_node_header(node);
        let (entries_offset, flags) = match result {
            Ok((_, values)) => values,
            Err(_err) => continue,
        };

        if let Some(found) = walk_entries(node, entries_offset as usize, target_name) {
            return Ok(Some(found));
        }
        if flags & LARGE_INDEX == LARGE_INDEX {
            large_index = true;
        }
    }

    if !large_index {
        return Ok(None);
    }

    // Entries continue in INDX records
    for attribute in &attributes {
        if attribute.attrib_type != AttributeType::IndexAllocation
            || !attribute.name.eq_ignore_ascii_case("$I30")
        {
            continue;
        }
        let runs = match &attribute.form {
            AttributeForm::NonResident { runs, .. } => runs,
            AttributeForm::Resident { .. } => continue,
        };

        let default_record_size = 4096;
        let record_size = if volume.index_entry_size != 0 {
            volume.index_entry_size as u64
        } else {
            default_record_size
        };
        let total = crate::filesystem::ntfs::runs::total_clusters(runs) * volume.cluster_size;
        let mut offset = 0;
        while offset < total {
            let mut record = read_run_bytes(volume, runs, offset, record_size)?;
            offset += record_size;
            if record.len() < 64 || &record[0..4] != INDX_SIGNATURE {
                continue;
            }

            let fixup_result = parse_indx_fixup(&record);
            let (usa_offset, usa_count) = match fixup_result {
                Ok((_, values)) => values,
                Err(_err) => continue,
            };
            if apply_fixup(&mut record, usa_offset, usa_count, volume.bytes_per_sector).is_err() {
                warn!("[ntfs] INDX record fixup mismatch, skipping record");
                continue;
            }

            // Index node header at offset 24
            let node = &record[24..];
            let result = parse_node_header(node);
            let (entries_offset, _flags) = match result {
                Ok((_, values)) => values,
                Err(_err) => continue,
            };
            if let Some(found) = walk_entries(node, entries_offset as usize, target_name) {
                return Ok(Some(found));
            }
        }
    }

    Ok(None)
}

/// Index node header: entries offset, total size, allocated size, flags
fn parse_node_header(data: &[u8]) -> nom::IResult<&[u8], (u32, u8)> {
    let (input, entries_offset) = nom_unsigned_four_bytes(data, Endian::Le)?;
    let (input, _total_size) = nom_unsigned_four_bytes(input, Endian::Le)?;
    let (input, _allocated_size) = nom_unsigned_four_bytes(input, Endian::Le)?;
    let (input, flags) = nom_unsigned_four_bytes(input, Endian::Le)?;

    Ok((input, (entries_offset, flags as u8)))
}

/// INDX record update sequence fields at offsets 4 and 6
fn parse_indx_fixup(data: &[u8]) -> nom::IResult<&[u8], (u16, u16)> {
    let (input, _signature) = nom_unsigned_four_bytes(data, Endian::Le)?;
    let (input, usa_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
    let (input, usa_count) = nom_unsigned_two_bytes(input, Endian::Le)?;

    Ok((input, (usa_offset, usa_count)))
}

/// Walk index entries looking for a `$FILE_NAME` key with the target name.
/// Entry layout: file reference, entry length, key length, flags, key
fn walk_entries(node: &[u8], entries_offset: usize, target_name: &str) -> Option<u64> {
    let entry_header = 16;
    let mut offset = entries_offset;

    while offset + entry_header <= node.len() {
        let entry = &node[offset..];
        let parsed = parse_entry_header(entry);
        let (reference, entry_length, key_length, flags) = match parsed {
            Ok((_, values)) => values,
            Err(_err) => break,
        };
        if entry_length == 0 || flags & LAST_ENTRY == LAST_ENTRY {
            break;
        }

        // Key is a $FILE_NAME value: name length at +64, name at +66
        let key = &entry[entry_header..];
        if key_length as usize >= 66 && key.len() >= 66 {
            let name_size = key[64] as usize;
            let name_end = 66 + name_size * 2;
            if key.len() >= name_end {
                let name = extract_utf16_chars(&key[66..name_end], name_size);
                if name.eq_ignore_ascii_case(target_name) {
                    let (entry_number, _sequence) = parse_file_reference(reference);
                    return Some(entry_number);
                }
            }
        }

        offset += entry_length as usize;
    }

    None
}

fn parse_entry_header(data: &[u8]) -> nom::IResult<&[u8], (u64, u16, u16, u32)> {
    let (input, reference) = nom_unsigned_eight_bytes(data, Endian::Le)?;
    let (input, entry_length) = nom_unsigned_two_bytes(input, Endian::Le)?;
    let (input, key_length) = nom_unsigned_two_bytes(input, Endian::Le)?;
    let (input, flags) = nom_unsigned_four_bytes(input, Endian::Le)?;

    Ok((input, (reference, entry_length, key_length, flags)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::walk_entries;

    /// Index entry holding a $FILE_NAME key for `name` pointing at `entry_number`
    pub(crate) fn build_index_entry(entry_number: u64, name: &str, last: bool) -> Vec<u8> {
        let name_units: Vec<u16> = name.encode_utf16().collect();
        let key_length = 66 + name_units.len() * 2;
        let mut entry_length = 16 + key_length;
        entry_length = (entry_length + 7) & !7;

        let mut entry = vec![0u8; entry_length];
        entry[0..8].copy_from_slice(&entry_number.to_le_bytes());
        entry[8..10].copy_from_slice(&(entry_length as u16).to_le_bytes());
        entry[10..12].copy_from_slice(&(key_length as u16).to_le_bytes());
        if last {
            entry[12..16].copy_from_slice(&2u32.to_le_bytes());
        }
        entry[16 + 64] = name_units.len() as u8;
        for (index, unit) in name_units.iter().enumerate() {
            entry[16 + 66 + index * 2..16 + 68 + index * 2].copy_from_slice(&unit.to_le_bytes());
        }
        entry
    }

    #[test]
    fn test_walk_entries() {
        let mut node = vec![0u8; 16];
        node.append(&mut build_index_entry(2, "$LogFile", false));
        node.append(&mut build_index_entry(11, "$Extend", false));
        node.append(&mut build_index_entry(0, "", true));

        assert_eq!(walk_entries(&node, 16, "$extend"), Some(11));
        assert_eq!(walk_entries(&node, 16, "$LogFile"), Some(2));
        assert_eq!(walk_entries(&node, 16, "$UsnJrnl"), None);
    }
}
