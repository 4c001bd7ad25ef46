use crate::filesystem::error::FileSystemError;
use crate::utils::nom_helper::{nom_unsigned_two_bytes, Endian};
use log::warn;

/// Apply the update sequence array of a multi-sector structure (`FILE`,
/// `INDX`, `RSTR`, `RCRD`). The last two bytes of every sector must match the
/// check value (word zero of the array) and are restored from the array.
/// A mismatched sector means the structure was torn mid-write
pub(crate) fn apply_fixup(
    data: &mut [u8],
    usa_offset: u16,
    usa_count: u16,
    bytes_per_sector: u16,
) -> Result<(), FileSystemError> {
    let sector_size = bytes_per_sector as usize;
    if usa_count < 2 || sector_size == 0 {
        return Err(FileSystemError::FixupMismatch);
    }

    let usa = read_usa(data, usa_offset, usa_count)?;
    let check_value = usa[0];

    let sectors = usa_count as usize - 1;
    if sectors * sector_size > data.len() {
        warn!("[ntfs] Update sequence array covers {sectors} sectors but the structure is smaller");
        return Err(FileSystemError::FixupMismatch);
    }

    for sector in 1..=sectors {
        let tail = sector * sector_size - 2;
        let stored = u16::from_le_bytes([data[tail], data[tail + 1]]);
        if stored != check_value {
            warn!(
                "[ntfs] Fixup mismatch in sector {sector}: expected {check_value:#06x} found {stored:#06x}"
            );
            return Err(FileSystemError::FixupMismatch);
        }

        let original = usa[sector].to_le_bytes();
        data[tail] = original[0];
        data[tail + 1] = original[1];
    }

    Ok(())
}

/// Read the update sequence array words
fn read_usa(data: &[u8], usa_offset: u16, usa_count: u16) -> Result<Vec<u16>, FileSystemError> {
    let start = usa_offset as usize;
    let end = start + usa_count as usize * 2;
    if end > data.len() {
        return Err(FileSystemError::FixupMismatch);
    }

    let mut remaining = &data[start..end];
    let mut usa = Vec::with_capacity(usa_count as usize);
    while usa.len() < usa_count as usize {
        let value_result = nom_unsigned_two_bytes(remaining, Endian::Le);
        let (input, value) = match value_result {
            Ok(result) => result,
            Err(_err) => return Err(FileSystemError::FixupMismatch),
        };
        usa.push(value);
        remaining = input;
    }

    Ok(usa)
}
