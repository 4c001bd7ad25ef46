use crate::filesystem::{error::FileSystemError, image::DiskImage};
use crate::utils::nom_helper::{
    nom_data, nom_unsigned_eight_bytes, nom_unsigned_four_bytes, nom_unsigned_one_byte, Endian,
};
use log::{info, warn};
use std::io::{Read, Seek};

const SECTOR_SIZE: u64 = 512;
const NTFS_OEM: &[u8] = b"NTFS    ";
const GPT_SIGNATURE: &[u8] = b"EFI PART";
/// Protective MBR entry in front of a GPT
const MBR_TYPE_GPT: u8 = 0xee;

/// A partition whose first sector carries the NTFS boot signature.
/// `index` counts NTFS partitions in enumeration order
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Partition {
    pub(crate) index: usize,
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

/// Enumerate NTFS partitions from the MBR or GPT. Images without a partition
/// table are probed as a single volume at offset zero
pub(crate) fn find_ntfs_partitions<T: Read + Seek>(
    image: &mut DiskImage<T>,
) -> Result<Vec<Partition>, FileSystemError> {
    let mbr = image.read_at(0, SECTOR_SIZE)?;

    let boot_signature = 0x1fe;
    if mbr.len() < SECTOR_SIZE as usize || mbr[boot_signature..boot_signature + 2] != [0x55, 0xaa] {
        // No partition table. The whole image may be a single NTFS volume
        let mut partitions = Vec::new();
        if is_ntfs_volume(image, 0)? {
            partitions.push(Partition {
                index: 0,
                offset: 0,
                size: image.size(),
            });
        }
        return Ok(partitions);
    }

    let mut candidates = mbr_candidates(&mbr, image.size());

    let has_protective = mbr
        .get(0x1be + 4)
        .map(|value| *value == MBR_TYPE_GPT)
        .unwrap_or(false);
    if has_protective || candidates.is_empty() {
        let mut gpt = gpt_candidates(image)?;
        candidates.append(&mut gpt);
    }

    let mut partitions = Vec::new();
    for (offset, size) in candidates {
        if !is_ntfs_volume(image, offset)? {
            continue;
        }
        partitions.push(Partition {
            index: partitions.len(),
            offset,
            size,
        });
    }

    // A bare NTFS volume image also ends sector 0 with 55 AA. If the tables
    // yielded nothing, probe the image itself
    if partitions.is_empty() && is_ntfs_volume(image, 0)? {
        partitions.push(Partition {
            index: 0,
            offset: 0,
            size: image.size(),
        });
    }

    info!("[partitions] Found {} NTFS partition(s)", partitions.len());
    Ok(partitions)
}

/// Pick one NTFS partition by index or return the full list
pub(crate) fn select_partitions(
    partitions: Vec<Partition>,
    target: Option<usize>,
) -> Result<Vec<Partition>, FileSystemError> {
    if partitions.is_empty() {
        return Err(FileSystemError::NoNtfsPartition);
    }

    match target {
        Some(index) => {
            let count = partitions.len();
            let selected = partitions.into_iter().find(|value| value.index == index);
            match selected {
                Some(result) => Ok(vec![result]),
                None => {
                    warn!("[partitions] Partition {index} requested but only {count} NTFS partition(s) exist");
                    Err(FileSystemError::NoNtfsPartition)
                }
            }
        }
        None => Ok(partitions),
    }
}

/// Classic MBR table, four 16-byte entries at 0x1be. Type zero entries are unused
fn mbr_candidates(mbr: &[u8], image_size: u64) -> Vec<(u64, u64)> {
    let table_offset = 0x1be;
    let entry_size = 16;
    let entry_count = 4;

    let mut candidates = Vec::new();
    for index in 0..entry_count {
        let start = table_offset + index * entry_size;
        let entry = &mbr[start..start + entry_size];

        let result = parse_mbr_entry(entry);
        let (partition_type, lba_start, sector_count) = match result {
            Ok((_, values)) => values,
            Err(_err) => continue,
        };

        if partition_type == 0 || partition_type == MBR_TYPE_GPT || lba_start == 0 {
            continue;
        }

        let offset = lba_start as u64 * SECTOR_SIZE;
        let size = sector_count as u64 * SECTOR_SIZE;
        if offset >= image_size {
            warn!("[partitions] MBR entry {index} starts beyond the image, skipping");
            continue;
        }
        candidates.push((offset, size.min(image_size - offset)));
    }

    candidates
}

/// Entry layout: status, CHS start, type, CHS end, LBA start, sector count.
/// CHS values are ignored
fn parse_mbr_entry(data: &[u8]) -> nom::IResult<&[u8], (u8, u32, u32)> {
    let (input, _status) = nom_unsigned_one_byte(data, Endian::Le)?;
    let (input, _chs_start) = nom_data(input, 3)?;
    let (input, partition_type) = nom_unsigned_one_byte(input, Endian::Le)?;
    let (input, _chs_end) = nom_data(input, 3)?;
    let (input, lba_start) = nom_unsigned_four_bytes(input, Endian::Le)?;
    let (input, sector_count) = nom_unsigned_four_bytes(input, Endian::Le)?;

    Ok((input, (partition_type, lba_start, sector_count)))
}

/// GPT header at LBA 1. Entries with an all-zero type GUID are unused
fn gpt_candidates<T: Read + Seek>(
    image: &mut DiskImage<T>,
) -> Result<Vec<(u64, u64)>, FileSystemError> {
    let header = image.read_at(SECTOR_SIZE, SECTOR_SIZE)?;
    if header.len() < 96 || &header[0..8] != GPT_SIGNATURE {
        return Ok(Vec::new());
    }

    let result = parse_gpt_header(&header);
    let (entry_lba, num_entries, entry_size) = match result {
        Ok((_, values)) => values,
        Err(_err) => {
            warn!("[partitions] Malformed GPT header");
            return Ok(Vec::new());
        }
    };

    let max_entries = 128;
    let mut candidates = Vec::new();
    for index in 0..num_entries.min(max_entries) {
        let offset = entry_lba * SECTOR_SIZE + index as u64 * entry_size as u64;
        let entry = image.read_at(offset, entry_size as u64)?;
        if entry.len() < 48 {
            break;
        }

        let zero_guid = [0u8; 16];
        if entry[0..16] == zero_guid {
            continue;
        }

        let result = parse_gpt_entry(&entry);
        let (first_lba, last_lba) = match result {
            Ok((_, values)) => values,
            Err(_err) => continue,
        };
        if first_lba == 0 {
            continue;
        }

        let start = first_lba * SECTOR_SIZE;
        let size = last_lba.saturating_sub(first_lba).saturating_add(1) * SECTOR_SIZE;
        candidates.push((start, size));
    }

    Ok(candidates)
}

/// Header fields used: partition entry LBA (+72), entry count (+80), entry size (+84)
fn parse_gpt_header(data: &[u8]) -> nom::IResult<&[u8], (u64, u32, u32)> {
    let (input, _signature_and_meta) = nom_data(data, 72)?;
    let (input, entry_lba) = nom_unsigned_eight_bytes(input, Endian::Le)?;
    let (input, num_entries) = nom_unsigned_four_bytes(input, Endian::Le)?;
    let (input, entry_size) = nom_unsigned_four_bytes(input, Endian::Le)?;

    Ok((input, (entry_lba, num_entries, entry_size)))
}

/// Entry fields used: first LBA (+32) and last LBA (+40)
fn parse_gpt_entry(data: &[u8]) -> nom::IResult<&[u8], (u64, u64)> {
    let (input, _type_guid) = nom_data(data, 16)?;
    let (input, _unique_guid) = nom_data(input, 16)?;
    let (input, first_lba) = nom_unsigned_eight_bytes(input, Endian::Le)?;
    let (input, last_lba) = nom_unsigned_eight_bytes(input, Endian::Le)?;

    Ok((input, (first_lba, last_lba)))
}

/// A partition is NTFS iff its first sector carries `NTFS    ` at offset 3
fn is_ntfs_volume<T: Read + Seek>(
    image: &mut DiskImage<T>,
    offset: u64,
) -> Result<bool, FileSystemError> {
    let sector = image.read_at(offset, SECTOR_SIZE)?;
    if sector.len() < 11 {
        return Ok(false);
    }

    Ok(&sector[3..11] == NTFS_OEM)
}
