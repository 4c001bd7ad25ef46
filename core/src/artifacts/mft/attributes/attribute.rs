use super::{
    filename::Filename,
    header::{AttributeHeader, AttributeType, ResidentFlag},
    list::{parse_attribute_list, AttributeListEntry},
    nonresident::NonResident,
    resident::Resident,
    standard::Standard,
};
use crate::filesystem::ntfs::runs::{parse_data_runs, DataRun};
use log::warn;

/// An attribute lifted out of an MFT entry with its value material
#[derive(Debug)]
pub(crate) struct RawAttribute {
    pub(crate) attrib_type: AttributeType,
    pub(crate) name: String,
    pub(crate) form: AttributeForm,
}

#[derive(Debug)]
pub(crate) enum AttributeForm {
    Resident { value: Vec<u8> },
    NonResident { info: NonResident, runs: Vec<DataRun> },
}

/// The decoded attributes of one MFT entry
#[derive(Debug, Default)]
pub(crate) struct EntryAttributes {
    pub(crate) standard: Vec<Standard>,
    pub(crate) filename: Vec<Filename>,
    pub(crate) attribute_list: Vec<AttributeListEntry>,
    pub(crate) nonresident_attribute_list: bool,
    pub(crate) data_size: u64,
    pub(crate) data_resident: bool,
    pub(crate) has_unnamed_data: bool,
    pub(crate) ads_count: u32,
}

/// Walk the attributes of a fixed-up MFT entry. The walk starts at the
/// header's first-attribute offset and ends at the `0xffffffff` terminator or
/// the used size, whichever comes first. A malformed attribute ends the walk
pub(crate) fn raw_attributes(
    entry: &[u8],
    attrib_offset: u16,
    used_size: u32,
) -> Vec<RawAttribute> {
    let header_size = 16;

    let mut offset = attrib_offset as usize;
    let bound = (used_size as usize).min(entry.len());

    let mut attributes = Vec::new();
    while offset + header_size <= bound {
        let header_result = AttributeHeader::parse_header(&entry[offset..]);
        let (_, header) = match header_result {
            Ok(result) => result,
            Err(_err) => break,
        };

        if header.attrib_type == AttributeType::End {
            break;
        }
        let size = header.size as usize;
        if size < header_size || offset + size > entry.len() {
            warn!("[mft] Attribute at offset {offset} claims {size} bytes, ending walk");
            break;
        }
        if header.attrib_type == AttributeType::Unknown
            || header.attrib_type == AttributeType::Unused
        {
            break;
        }

        let attribute = &entry[offset..offset + size];
        let name = header.attribute_name(attribute);

        let form_result = parse_form(&header, attribute);
        match form_result {
            Some(form) => attributes.push(RawAttribute {
                attrib_type: header.attrib_type,
                name,
                form,
            }),
            None => {
                warn!("[mft] Could not parse attribute form at offset {offset}, ending walk");
                break;
            }
        }

        offset += size;
    }

    attributes
}

/// Parse the resident or non-resident form that follows the common header
fn parse_form(header: &AttributeHeader, attribute: &[u8]) -> Option<AttributeForm> {
    let header_size = 16;

    match header.resident_flag {
        ResidentFlag::Resident => {
            let resident_result = Resident::parse_resident(&attribute[header_size..]);
            let (_, resident) = match resident_result {
                Ok(result) => result,
                Err(_err) => return None,
            };

            Some(AttributeForm::Resident {
                value: resident.value(attribute).to_vec(),
            })
        }
        ResidentFlag::NonResident => {
            let nonresident_result = NonResident::parse_nonresident(&attribute[header_size..]);
            let (_, info) = match nonresident_result {
                Ok(result) => result,
                Err(_err) => return None,
            };

            let runs_start = info.data_runs_offset as usize;
            if runs_start > attribute.len() {
                return None;
            }
            let runs = match parse_data_runs(&attribute[runs_start..]) {
                Ok((_, result)) => result,
                Err(_err) => Vec::new(),
            };

            Some(AttributeForm::NonResident { info, runs })
        }
        ResidentFlag::Unknown => None,
    }
}

/// Interpret the attributes a record decoder cares about
pub(crate) fn grab_attributes(entry: &[u8], attrib_offset: u16, used_size: u32) -> EntryAttributes {
    let mut entry_attributes = EntryAttributes::default();

    for attribute in raw_attributes(entry, attrib_offset, used_size) {
        match attribute.attrib_type {
            AttributeType::StandardInformation => {
                if let AttributeForm::Resident { value } = &attribute.form {
                    if let Ok((_, standard)) = Standard::parse_standard_info(value) {
                        entry_attributes.standard.push(standard);
                    }
                }
            }
            AttributeType::FileName => {
                if let AttributeForm::Resident { value } = &attribute.form {
                    if let Ok((_, filename)) = Filename::parse_filename(value) {
                        entry_attributes.filename.push(filename);
                    }
                }
            }
            AttributeType::AttributeList => match &attribute.form {
                AttributeForm::Resident { value } => {
                    if let Ok((_, mut entries)) = parse_attribute_list(value) {
                        entry_attributes.attribute_list.append(&mut entries);
                    }
                }
                AttributeForm::NonResident { .. } => {
                    entry_attributes.nonresident_attribute_list = true;
                }
            },
            AttributeType::Data => {
                if !attribute.name.is_empty() {
                    entry_attributes.ads_count += 1;
                    continue;
                }
                match &attribute.form {
                    AttributeForm::Resident { value } => {
                        entry_attributes.data_size = value.len() as u64;
                        entry_attributes.data_resident = true;
                        entry_attributes.has_unnamed_data = true;
                    }
                    AttributeForm::NonResident { info, .. } => {
                        // Only the first instance carries a valid real size
                        if info.first_vcn == 0 {
                            entry_attributes.data_size = info.real_size;
                        }
                        entry_attributes.data_resident = false;
                        entry_attributes.has_unnamed_data = true;
                    }
                }
            }
            _ => {}
        }
    }

    entry_attributes
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{grab_attributes, raw_attributes, AttributeForm};
    use crate::artifacts::mft::attributes::header::AttributeType;

    /// Resident attribute bytes: common header + resident form + value
    pub(crate) fn build_resident_attribute(attrib_type: u32, value: &[u8]) -> Vec<u8> {
        let value_offset = 24u16;
        let mut size = value_offset as usize + value.len();
        size = (size + 7) & !7;

        let mut attribute = vec![0u8; size];
        attribute[0..4].copy_from_slice(&attrib_type.to_le_bytes());
        attribute[4..8].copy_from_slice(&(size as u32).to_le_bytes());
        attribute[16..20].copy_from_slice(&(value.len() as u32).to_le_bytes());
        attribute[20..22].copy_from_slice(&value_offset.to_le_bytes());
        attribute[24..24 + value.len()].copy_from_slice(value);
        attribute
    }

    /// Non-resident attribute bytes with mapping pairs, optionally named
    pub(crate) fn build_nonresident_attribute(
        attrib_type: u32,
        name: &str,
        allocated: u64,
        real: u64,
        mapping_pairs: &[u8],
    ) -> Vec<u8> {
        let name_units: Vec<u16> = name.encode_utf16().collect();
        let name_offset = 64usize;
        let runs_offset = name_offset + name_units.len() * 2;
        let mut size = runs_offset + mapping_pairs.len();
        size = (size + 7) & !7;

        let mut attribute = vec![0u8; size];
        attribute[0..4].copy_from_slice(&attrib_type.to_le_bytes());
        attribute[4..8].copy_from_slice(&(size as u32).to_le_bytes());
        attribute[8] = 1;
        attribute[9] = name_units.len() as u8;
        attribute[10..12].copy_from_slice(&(name_offset as u16).to_le_bytes());
        // Non-resident form
        let clusters = allocated.div_ceil(4096);
        attribute[24..32].copy_from_slice(&clusters.saturating_sub(1).to_le_bytes());
        attribute[32..34].copy_from_slice(&(runs_offset as u16).to_le_bytes());
        attribute[40..48].copy_from_slice(&allocated.to_le_bytes());
        attribute[48..56].copy_from_slice(&real.to_le_bytes());
        attribute[56..64].copy_from_slice(&real.to_le_bytes());
        for (index, unit) in name_units.iter().enumerate() {
            attribute[name_offset + index * 2..name_offset + index * 2 + 2]
                .copy_from_slice(&unit.to_le_bytes());
        }
        attribute[runs_offset..runs_offset + mapping_pairs.len()].copy_from_slice(mapping_pairs);
        attribute
    }

    /// A 1024 byte MFT entry from attribute parts (no fixup array for tests
    /// that bypass fixup)
    pub(crate) fn build_entry(attributes: &[Vec<u8>]) -> Vec<u8> {
        let attrib_offset = 56usize;
        let mut entry = vec![0u8; 1024];
        entry[0..4].copy_from_slice(b"FILE");
        entry[20..22].copy_from_slice(&(attrib_offset as u16).to_le_bytes());

        let mut offset = attrib_offset;
        for attribute in attributes {
            entry[offset..offset + attribute.len()].copy_from_slice(attribute);
            offset += attribute.len();
        }
        entry[offset..offset + 4].copy_from_slice(&0xffff_ffffu32.to_le_bytes());
        entry[24..28].copy_from_slice(&((offset + 8) as u32).to_le_bytes());
        entry[22..24].copy_from_slice(&1u16.to_le_bytes());
        entry
    }

    #[test]
    fn test_raw_attributes() {
        let standard = build_resident_attribute(0x10, &vec![0u8; 48]);
        let data = build_nonresident_attribute(0x80, "", 4096, 4000, &[0x11, 0x01, 0x05, 0x00]);
        let entry = build_entry(&[standard, data]);

        let attributes = raw_attributes(&entry, 56, 1024);
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].attrib_type, AttributeType::StandardInformation);
        assert_eq!(attributes[1].attrib_type, AttributeType::Data);

        match &attributes[1].form {
            AttributeForm::NonResident { info, runs } => {
                assert_eq!(info.real_size, 4000);
                assert_eq!(runs.len(), 1);
                assert_eq!(runs[0].lcn, 5);
            }
            AttributeForm::Resident { .. } => panic!("expected non-resident data"),
        }
    }

    #[test]
    fn test_grab_attributes() {
        let test = [
            16, 0, 0, 0, 96, 0, 0, 0, 0, 0, 24, 0, 0, 0, 0, 0, 72, 0, 0, 0, 24, 0, 0, 0, 172, 119,
            65, 126, 194, 223, 218, 1, 172, 119, 65, 126, 194, 223, 218, 1, 172, 119, 65, 126, 194,
            223, 218, 1, 172, 119, 65, 126, 194, 223, 218, 1, 6, 0, 0, 32, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ];

        let mut entry = vec![0u8; 256];
        let attrib_offset = 16;
        entry[attrib_offset..attrib_offset + test.len()].copy_from_slice(&test);
        entry[attrib_offset + test.len()..attrib_offset + test.len() + 4]
            .copy_from_slice(&0xffff_ffffu32.to_le_bytes());

        let result = grab_attributes(&entry, attrib_offset as u16, 256);
        assert_eq!(result.standard.len(), 1);
        assert_eq!(result.standard[0].created, 133665165395720108);
        assert_eq!(result.standard[0].sid_id, 257);
    }

    #[test]
    fn test_grab_attributes_ads() {
        let unnamed = build_nonresident_attribute(0x80, "", 8192, 8000, &[0x11, 0x02, 0x09, 0x00]);
        let named = build_nonresident_attribute(0x80, "$J", 4096, 4096, &[0x11, 0x01, 0x20, 0x00]);
        let entry = build_entry(&[unnamed, named]);

        let result = grab_attributes(&entry, 56, 1024);
        assert!(result.has_unnamed_data);
        assert!(!result.data_resident);
        assert_eq!(result.data_size, 8000);
        assert_eq!(result.ads_count, 1);
    }
}
