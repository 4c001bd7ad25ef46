use super::standard::file_attribute_flags;
use crate::utils::nom_helper::{
    nom_unsigned_eight_bytes, nom_unsigned_four_bytes, nom_unsigned_one_byte,
    nom_unsigned_two_bytes, Endian,
};
use crate::utils::strings::extract_utf16_chars;
use common::ntfs::{AttributeFlags, Namespace};
use nom::bytes::complete::take;
use serde::Serialize;

/// `$FILE_NAME` (0x30). Contains timestamps and the filename
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Filename {
    pub(crate) parent_mft: u64,
    pub(crate) parent_sequence: u16,
    pub(crate) created: u64,
    pub(crate) modified: u64,
    pub(crate) changed: u64,
    pub(crate) accessed: u64,
    pub(crate) allocated_size: u64,
    pub(crate) real_size: u64,
    pub(crate) file_attributes: Vec<AttributeFlags>,
    pub(crate) file_attributes_data: u32,
    pub(crate) name_size: u8,
    pub(crate) namespace: Namespace,
    /**UTF16 (but not strict UTF16) */
    pub(crate) name: String,
}

impl Filename {
    pub(crate) fn parse_filename(data: &[u8]) -> nom::IResult<&[u8], Filename> {
        let (input, parent_mft_low) = nom_unsigned_four_bytes(data, Endian::Le)?;
        let (input, parent_mft_high) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, parent_sequence) = nom_unsigned_two_bytes(input, Endian::Le)?;

        let (input, created) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, modified) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, changed) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, accessed) = nom_unsigned_eight_bytes(input, Endian::Le)?;

        let (input, allocated_size) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, real_size) = nom_unsigned_eight_bytes(input, Endian::Le)?;

        let (input, flag_data) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, _reparse_value) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, name_size) = nom_unsigned_one_byte(input, Endian::Le)?;
        let (input, namespace_data) = nom_unsigned_one_byte(input, Endian::Le)?;

        // Name is UTF16, double the unit count
        let adjust = 2;
        let (input, name_data) = take(name_size as u16 * adjust)(input)?;
        let name = extract_utf16_chars(name_data, name_size as usize);

        let parent_mft = (parent_mft_high as u64) << 32 | parent_mft_low as u64;
        let filename = Filename {
            parent_mft,
            parent_sequence,
            created,
            modified,
            changed,
            accessed,
            allocated_size,
            real_size,
            file_attributes: file_attribute_flags(&flag_data),
            file_attributes_data: flag_data,
            name_size,
            namespace: Filename::get_namespace(&namespace_data),
            name,
        };

        Ok((input, filename))
    }

    /// Determine namespace associated with the name
    fn get_namespace(space: &u8) -> Namespace {
        match space {
            0 => Namespace::Posix,
            1 => Namespace::Windows,
            2 => Namespace::Dos,
            3 => Namespace::WindowsDos,
            _ => Namespace::Unknown,
        }
    }

    /// Selection order when an entry carries several names:
    /// Win32&DOS, then Win32, then POSIX, then DOS
    pub(crate) fn namespace_rank(&self) -> u8 {
        match self.namespace {
            Namespace::WindowsDos => 0,
            Namespace::Windows => 1,
            Namespace::Posix => 2,
            Namespace::Dos => 3,
            Namespace::Unknown => 4,
        }
    }
}

/// Pick the best `$FILE_NAME` instance per the namespace precedence
pub(crate) fn select_filename(filenames: &[Filename]) -> Option<&Filename> {
    filenames.iter().min_by_key(|value| value.namespace_rank())
}
