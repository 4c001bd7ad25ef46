use crate::utils::nom_helper::{nom_unsigned_eight_bytes, nom_unsigned_four_bytes, Endian};
use common::ntfs::AttributeFlags;
use serde::Serialize;

/// `$STANDARD_INFORMATION` (0x10). Mainly the four timestamps
#[derive(Debug, Serialize)]
pub(crate) struct Standard {
    pub(crate) created: u64,
    pub(crate) modified: u64,
    pub(crate) changed: u64,
    pub(crate) accessed: u64,
    pub(crate) file_attributes: Vec<AttributeFlags>,
    pub(crate) file_attributes_data: u32,
    pub(crate) owner_id: u32,
    pub(crate) sid_id: u32,
    pub(crate) quota: u64,
    pub(crate) usn: u64,
}

impl Standard {
    pub(crate) fn parse_standard_info(data: &[u8]) -> nom::IResult<&[u8], Standard> {
        let (input, created) = nom_unsigned_eight_bytes(data, Endian::Le)?;
        let (input, modified) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, changed) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, accessed) = nom_unsigned_eight_bytes(input, Endian::Le)?;

        let (input, flag_data) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, _max_versions) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, _version) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, _class_id) = nom_unsigned_four_bytes(input, Endian::Le)?;

        let mut standard = Standard {
            created,
            modified,
            changed,
            accessed,
            file_attributes: file_attribute_flags(&flag_data),
            file_attributes_data: flag_data,
            owner_id: 0,
            sid_id: 0,
            quota: 0,
            usn: 0,
        };
        // NTFS versions below 3.0 only carry 48 bytes
        if input.len() < 24 {
            return Ok((input, standard));
        }

        let (input, owner_id) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, sid_id) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, quota) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, usn) = nom_unsigned_eight_bytes(input, Endian::Le)?;

        standard.owner_id = owner_id;
        standard.sid_id = sid_id;
        standard.quota = quota;
        standard.usn = usn;

        Ok((input, standard))
    }
}

/// Map the DOS attribute bits to flags
pub(crate) fn file_attribute_flags(attributes: &u32) -> Vec<AttributeFlags> {
    let values = [
        (0x1, AttributeFlags::ReadOnly),
        (0x2, AttributeFlags::Hidden),
        (0x4, AttributeFlags::System),
        (0x10, AttributeFlags::Directory),
        (0x20, AttributeFlags::Archive),
        (0x40, AttributeFlags::Device),
        (0x80, AttributeFlags::Normal),
        (0x100, AttributeFlags::Temporary),
        (0x200, AttributeFlags::SparseFile),
        (0x400, AttributeFlags::ReparsePoint),
        (0x800, AttributeFlags::Compressed),
        (0x1000, AttributeFlags::Offline),
        (0x2000, AttributeFlags::NotContentIndexed),
        (0x4000, AttributeFlags::Encrypted),
        (0x10000, AttributeFlags::Virtual),
    ];

    let mut flags = Vec::new();
    for (bit, flag) in values {
        if (attributes & bit) == bit {
            flags.push(flag);
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::{file_attribute_flags, Standard};
    use common::ntfs::AttributeFlags;

    #[test]
    fn test_parse_standard_info() {
        let test = [
            172, 119, 65, 126, 194, 223, 218, 1, 172, 119, 65, 126, 194, 223, 218, 1, 172, 119, 65,
            126, 194, 223, 218, 1, 172, 119, 65, 126, 194, 223, 218, 1, 6, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0,
        ];

        let (_, result) = Standard::parse_standard_info(&test).unwrap();
        assert_eq!(result.created, 133665165395720108);
        assert_eq!(result.modified, 133665165395720108);
        assert_eq!(result.changed, 133665165395720108);
        assert_eq!(result.accessed, 133665165395720108);
        assert_eq!(result.sid_id, 256);
        assert_eq!(
            result.file_attributes,
            vec![AttributeFlags::Hidden, AttributeFlags::System]
        );
    }

    #[test]
    fn test_parse_standard_info_short() {
        let mut test = vec![0u8; 48];
        test[32] = 0x20;

        let (_, result) = Standard::parse_standard_info(&test).unwrap();
        assert_eq!(result.file_attributes, vec![AttributeFlags::Archive]);
        assert_eq!(result.usn, 0);
    }

    #[test]
    fn test_file_attribute_flags() {
        let result = file_attribute_flags(&0x6);
        assert_eq!(result, vec![AttributeFlags::Hidden, AttributeFlags::System]);
    }
}
