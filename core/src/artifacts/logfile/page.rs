use crate::filesystem::ntfs::fixup::apply_fixup;
use crate::utils::nom_helper::{
    nom_unsigned_eight_bytes, nom_unsigned_four_bytes, nom_unsigned_two_bytes, Endian,
};

const RCRD_SIGNATURE: &[u8] = b"RCRD";
/// Log records start after the page header
pub(crate) const PAGE_HEADER_SIZE: usize = 0x30;

/// `$LogFile` record page (`RCRD`), reconstituted and ready to walk
#[derive(Debug)]
pub(crate) struct RecordPage {
    pub(crate) last_lsn: u64,
    pub(crate) flags: u32,
    pub(crate) page_count: u16,
    pub(crate) page_position: u16,
    pub(crate) next_record_offset: u16,
    pub(crate) last_end_lsn: u64,
    pub(crate) data: Vec<u8>,
}

impl RecordPage {
    /// Parse one page. `None` for non-RCRD pages and torn pages
    pub(crate) fn parse_page(data: &[u8]) -> Option<RecordPage> {
        if data.len() < PAGE_HEADER_SIZE || &data[0..4] != RCRD_SIGNATURE {
            return None;
        }

        let usa_offset = u16::from_le_bytes([data[4], data[5]]);
        let usa_count = u16::from_le_bytes([data[6], data[7]]);

        let mut fixed = data.to_vec();
        if usa_count > 1 && apply_fixup(&mut fixed, usa_offset, usa_count, 512).is_err() {
            return None;
        }

        let parsed = RecordPage::parse_fields(&fixed);
        let (_, (last_lsn, flags, page_count, page_position, next_record_offset, last_end_lsn)) =
            match parsed {
                Ok(result) => result,
                Err(_err) => return None,
            };

        Some(RecordPage {
            last_lsn,
            flags,
            page_count,
            page_position,
            next_record_offset,
            last_end_lsn,
            data: fixed,
        })
    }

    #[allow(clippy::type_complexity)]
    fn parse_fields(data: &[u8]) -> nom::IResult<&[u8], (u64, u32, u16, u16, u16, u64)> {
        let (input, _signature) = nom_unsigned_four_bytes(data, Endian::Le)?;
        let (input, _usa_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _usa_count) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, last_lsn) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, flags) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, page_count) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, page_position) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, next_record_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _word_align) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _dword_align) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, last_end_lsn) = nom_unsigned_eight_bytes(input, Endian::Le)?;

        Ok((
            input,
            (last_lsn, flags, page_count, page_position, next_record_offset, last_end_lsn),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::RecordPage;

    /// 4096 byte RCRD page without fixup words
    pub(crate) fn build_record_page(last_lsn: u64) -> Vec<u8> {
        let mut page = vec![0u8; 4096];
        page[0..4].copy_from_slice(b"RCRD");
        page[0x08..0x10].copy_from_slice(&last_lsn.to_le_bytes());
        page[0x14..0x16].copy_from_slice(&1u16.to_le_bytes());
        page[0x16..0x18].copy_from_slice(&1u16.to_le_bytes());
        page[0x18..0x1a].copy_from_slice(&0x58u16.to_le_bytes());
        page[0x20..0x28].copy_from_slice(&last_lsn.to_le_bytes());
        page
    }

    #[test]
    fn test_parse_page() {
        let page = build_record_page(0x3000);
        let result = RecordPage::parse_page(&page).unwrap();

        assert_eq!(result.last_lsn, 0x3000);
        assert_eq!(result.page_count, 1);
        assert_eq!(result.page_position, 1);
        assert_eq!(result.next_record_offset, 0x58);
        assert_eq!(result.last_end_lsn, 0x3000);
        assert_eq!(result.flags, 0);
    }

    #[test]
    fn test_parse_page_wrong_signature() {
        let page = vec![0u8; 4096];
        assert!(RecordPage::parse_page(&page).is_none());
    }
}
