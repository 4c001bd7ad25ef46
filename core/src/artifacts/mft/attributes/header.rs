use crate::utils::nom_helper::{
    nom_unsigned_four_bytes, nom_unsigned_one_byte, nom_unsigned_two_bytes, Endian,
};
use crate::utils::strings::extract_utf16_chars;
use log::warn;
use serde::Serialize;

/// Common 16 byte header shared by every attribute form
#[derive(Debug)]
pub(crate) struct AttributeHeader {
    pub(crate) attrib_type: AttributeType,
    /**Includes the type code and the size field itself */
    pub(crate) size: u32,
    pub(crate) resident_flag: ResidentFlag,
    pub(crate) name_size: u8,
    pub(crate) name_offset: u16,
    pub(crate) data_flags: u16,
    pub(crate) attrib_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) enum AttributeType {
    Unused,
    StandardInformation,
    AttributeList,
    FileName,
    ObjectId,
    SecurityDescriptor,
    VolumeName,
    VolumeInformation,
    Data,
    IndexRoot,
    IndexAllocation,
    Bitmap,
    ReparsePoint,
    ExtendedInfo,
    Extended,
    PropertySet,
    LoggedStream,
    UserDefined,
    End,
    Unknown,
}

#[derive(Debug, PartialEq)]
pub(crate) enum ResidentFlag {
    Resident,
    NonResident,
    Unknown,
}

impl AttributeHeader {
    pub(crate) fn parse_header(data: &[u8]) -> nom::IResult<&[u8], AttributeHeader> {
        let (input, type_data) = nom_unsigned_four_bytes(data, Endian::Le)?;
        let (input, size) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, resident_data) = nom_unsigned_one_byte(input, Endian::Le)?;
        let (input, name_size) = nom_unsigned_one_byte(input, Endian::Le)?;
        let (input, name_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, data_flags) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, attrib_id) = nom_unsigned_two_bytes(input, Endian::Le)?;

        let header = AttributeHeader {
            attrib_type: AttributeHeader::get_type(&type_data),
            size,
            resident_flag: AttributeHeader::get_resident(&resident_data),
            name_size,
            name_offset,
            data_flags,
            attrib_id,
        };

        Ok((input, header))
    }

    /// Attribute name from the full attribute bytes. Unnamed attributes return
    /// the empty string
    pub(crate) fn attribute_name(&self, attribute: &[u8]) -> String {
        if self.name_size == 0 {
            return String::new();
        }

        let start = self.name_offset as usize;
        let end = start + self.name_size as usize * 2;
        if end > attribute.len() {
            warn!("[mft] Attribute name exceeds attribute bounds");
            return String::new();
        }

        extract_utf16_chars(&attribute[start..end], self.name_size as usize)
    }

    /// Determine attribute type
    pub(crate) fn get_type(data: &u32) -> AttributeType {
        match data {
            0x0 => AttributeType::Unused,
            0x10 => AttributeType::StandardInformation,
            0x20 => AttributeType::AttributeList,
            0x30 => AttributeType::FileName,
            0x40 => AttributeType::ObjectId,
            0x50 => AttributeType::SecurityDescriptor,
            0x60 => AttributeType::VolumeName,
            0x70 => AttributeType::VolumeInformation,
            0x80 => AttributeType::Data,
            0x90 => AttributeType::IndexRoot,
            0xa0 => AttributeType::IndexAllocation,
            0xb0 => AttributeType::Bitmap,
            0xc0 => AttributeType::ReparsePoint,
            0xd0 => AttributeType::ExtendedInfo,
            0xe0 => AttributeType::Extended,
            0xf0 => AttributeType::PropertySet,
            0x100 => AttributeType::LoggedStream,
            0x1000 => AttributeType::UserDefined,
            0xffffffff => AttributeType::End,
            _ => {
                warn!("[mft] Got unknown attribute type {data:#x}");
                AttributeType::Unknown
            }
        }
    }

    /// Determine if the attribute value is resident or non-resident
    fn get_resident(data: &u8) -> ResidentFlag {
        match data {
            0x0 => ResidentFlag::Resident,
            0x1 => ResidentFlag::NonResident,
            _ => ResidentFlag::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeHeader, AttributeType, ResidentFlag};

    #[test]
    fn test_parse_header() {
        let test = [16, 0, 0, 0, 96, 0, 0, 0, 0, 0, 24, 0, 0, 0, 0, 0];
        let (_, result) = AttributeHeader::parse_header(&test).unwrap();

        assert_eq!(result.attrib_type, AttributeType::StandardInformation);
        assert_eq!(result.size, 96);
        assert_eq!(result.name_offset, 24);
        assert_eq!(result.resident_flag, ResidentFlag::Resident);
        assert_eq!(result.attrib_id, 0);
    }

    #[test]
    fn test_attribute_name() {
        // $DATA attribute named $J, name at offset 16
        let mut test = vec![
            0x80, 0, 0, 0, 24, 0, 0, 0, 0, 2, 16, 0, 0, 0, 1, 0,
        ];
        test.extend_from_slice(&[36, 0, 74, 0]);

        let (_, header) = AttributeHeader::parse_header(&test).unwrap();
        assert_eq!(header.name_size, 2);
        assert_eq!(header.attribute_name(&test), "$J");
    }

    #[test]
    fn test_get_type() {
        let test = [
            0x0u32, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80, 0x90, 0xa0, 0xb0, 0xc0, 0xd0,
            0xe0, 0xf0, 0x100, 0x1000, 0xffffffff,
        ];
        for entry in test {
            let result = AttributeHeader::get_type(&entry);
            assert_ne!(result, AttributeType::Unknown);
        }
    }
}
