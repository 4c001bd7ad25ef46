use crate::filesystem::ntfs::fixup::apply_fixup;
use crate::utils::nom_helper::{
    nom_unsigned_eight_bytes, nom_unsigned_four_bytes, nom_unsigned_two_bytes, Endian,
};

const RSTR_SIGNATURE: &[u8] = b"RSTR";
/// A restart page left by a failed chkdsk
const CHKD_SIGNATURE: &[u8] = b"CHKD";

/// `$LogFile` restart page (`RSTR`). Two copies sit at the head of the file
#[derive(Debug)]
pub(crate) struct RestartPage {
    pub(crate) system_page_size: u32,
    pub(crate) log_page_size: u32,
    pub(crate) restart_offset: u16,
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) current_lsn: u64,
    pub(crate) log_clients: u16,
}

impl RestartPage {
    /// Parse and reconstitute one restart page. `None` when the signature is
    /// absent or the sectors are torn
    pub(crate) fn parse_restart(data: &[u8]) -> Option<RestartPage> {
        let header_size = 0x40;
        if data.len() < header_size {
            return None;
        }
        if &data[0..4] != RSTR_SIGNATURE && &data[0..4] != CHKD_SIGNATURE {
            return None;
        }

        let usa_offset = u16::from_le_bytes([data[4], data[5]]);
        let usa_count = u16::from_le_bytes([data[6], data[7]]);

        let mut fixed = data.to_vec();
        if usa_count > 1 && apply_fixup(&mut fixed, usa_offset, usa_count, 512).is_err() {
            return None;
        }

        match RestartPage::parse_fields(&fixed) {
            Ok((_, result)) => Some(result),
            Err(_err) => None,
        }
    }

    fn parse_fields(data: &[u8]) -> nom::IResult<&[u8], RestartPage> {
        let (input, _signature) = nom_unsigned_four_bytes(data, Endian::Le)?;
        let (input, _usa_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _usa_count) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _check_disk_lsn) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, system_page_size) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, log_page_size) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, restart_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, minor_version) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, major_version) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _padding) = nom_unsigned_two_bytes(input, Endian::Le)?;
        // Update sequence array slot
        let (input, _usa) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, _usa) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, current_lsn) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, log_clients) = nom_unsigned_two_bytes(input, Endian::Le)?;

        let page = RestartPage {
            system_page_size,
            log_page_size,
            restart_offset,
            minor_version,
            major_version,
            current_lsn,
            log_clients,
        };

        Ok((input, page))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::RestartPage;

    /// 4096 byte RSTR page without fixup words
    pub(crate) fn build_restart_page() -> Vec<u8> {
        let mut page = vec![0u8; 4096];
        page[0..4].copy_from_slice(b"RSTR");
        page[0x10..0x14].copy_from_slice(&4096u32.to_le_bytes());
        page[0x14..0x18].copy_from_slice(&4096u32.to_le_bytes());
        page[0x18..0x1a].copy_from_slice(&0x30u16.to_le_bytes());
        page[0x1a..0x1c].copy_from_slice(&1u16.to_le_bytes());
        page[0x1c..0x1e].copy_from_slice(&2u16.to_le_bytes());
        page[0x30..0x38].copy_from_slice(&0x2000u64.to_le_bytes());
        page[0x38..0x3a].copy_from_slice(&1u16.to_le_bytes());
        page
    }

    #[test]
    fn test_parse_restart() {
        let page = build_restart_page();
        let result = RestartPage::parse_restart(&page).unwrap();

        assert_eq!(result.system_page_size, 4096);
        assert_eq!(result.log_page_size, 4096);
        assert_eq!(result.restart_offset, 0x30);
        assert_eq!(result.minor_version, 1);
        assert_eq!(result.major_version, 2);
        assert_eq!(result.current_lsn, 0x2000);
        assert_eq!(result.log_clients, 1);
    }

    #[test]
    fn test_parse_restart_bad_signature() {
        let mut page = build_restart_page();
        page[0..4].copy_from_slice(b"XXXX");
        assert!(RestartPage::parse_restart(&page).is_none());
    }
}
