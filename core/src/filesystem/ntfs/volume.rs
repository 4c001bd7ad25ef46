use crate::filesystem::{error::FileSystemError, image::DiskImage, partitions::Partition};
use crate::utils::nom_helper::{
    nom_data, nom_unsigned_eight_bytes, nom_unsigned_one_byte, nom_unsigned_two_bytes, Endian,
};
use log::{error, info};
use std::io::{Read, Seek};

/// NTFS volume geometry parsed from the boot sector plus a cluster-addressed
/// read interface over the backing image
pub(crate) struct NtfsVolume<T: Read + Seek> {
    pub(crate) image: DiskImage<T>,
    pub(crate) offset: u64,
    pub(crate) bytes_per_sector: u16,
    pub(crate) sectors_per_cluster: u8,
    pub(crate) cluster_size: u64,
    pub(crate) total_sectors: u64,
    pub(crate) mft_cluster: u64,
    pub(crate) mft_entry_size: u32,
    pub(crate) index_entry_size: u32,
    pub(crate) serial_number: u64,
}

struct BootSector {
    bytes_per_sector: u16,
    sectors_per_cluster: u8,
    total_sectors: u64,
    mft_cluster: u64,
    mft_mirror_cluster: u64,
    clusters_per_mft_record: i8,
    clusters_per_index_record: i8,
    serial_number: u64,
}

impl<T: Read + Seek> NtfsVolume<T> {
    /// Parse the boot sector at the partition start and validate its geometry
    pub(crate) fn open(
        mut image: DiskImage<T>,
        partition: &Partition,
    ) -> Result<NtfsVolume<T>, FileSystemError> {
        let sector = image.read_at(partition.offset, 512)?;
        if sector.len() < 512 {
            error!("[ntfs] Partition {} boot sector is truncated", partition.index);
            return Err(FileSystemError::BadBootSector);
        }

        let boot_result = parse_boot_sector(&sector);
        let boot = match boot_result {
            Ok((_, result)) => result,
            Err(_err) => {
                error!("[ntfs] Partition {} has no valid NTFS boot sector", partition.index);
                return Err(FileSystemError::BadBootSector);
            }
        };

        if !boot.bytes_per_sector.is_power_of_two() || boot.bytes_per_sector < 256 {
            error!("[ntfs] Implausible sector size {}", boot.bytes_per_sector);
            return Err(FileSystemError::BadBootSector);
        }
        if boot.sectors_per_cluster == 0 {
            error!("[ntfs] Zero sectors per cluster");
            return Err(FileSystemError::BadBootSector);
        }

        let cluster_size = boot.bytes_per_sector as u64 * boot.sectors_per_cluster as u64;
        let mft_entry_size = record_size(boot.clusters_per_mft_record, cluster_size);
        let index_entry_size = record_size(boot.clusters_per_index_record, cluster_size);

        // Fixup requires whole sectors per MFT entry
        if mft_entry_size == 0 || mft_entry_size % boot.bytes_per_sector as u32 != 0 {
            error!("[ntfs] MFT entry size {mft_entry_size} is not a multiple of the sector size");
            return Err(FileSystemError::BadBootSector);
        }

        info!(
            "[ntfs] Volume serial {:016x}: {} total sectors, cluster size {cluster_size}, MFT at cluster {} (mirror at {})",
            boot.serial_number, boot.total_sectors, boot.mft_cluster, boot.mft_mirror_cluster
        );

        Ok(NtfsVolume {
            image,
            offset: partition.offset,
            bytes_per_sector: boot.bytes_per_sector,
            sectors_per_cluster: boot.sectors_per_cluster,
            cluster_size,
            total_sectors: boot.total_sectors,
            mft_cluster: boot.mft_cluster,
            mft_entry_size,
            index_entry_size,
            serial_number: boot.serial_number,
        })
    }

    /// Read `count` clusters starting at the provided LCN
    pub(crate) fn read_cluster(&mut self, lcn: u64, count: u64) -> Result<Vec<u8>, FileSystemError> {
        self.read_volume(lcn * self.cluster_size, count * self.cluster_size)
    }

    /// Read bytes at a volume-relative offset
    pub(crate) fn read_volume(&mut self, offset: u64, size: u64) -> Result<Vec<u8>, FileSystemError> {
        self.image.read_at(self.offset + offset, size)
    }
}

/// Signed record-size byte: non-negative is clusters per record, negative k is `1 << -k` bytes
fn record_size(value: i8, cluster_size: u64) -> u32 {
    if value >= 0 {
        (value as u64 * cluster_size) as u32
    } else {
        let shift = -(value as i32) as u32;
        if shift > 31 {
            0
        } else {
            1u32 << shift
        }
    }
}

fn parse_boot_sector(data: &[u8]) -> nom::IResult<&[u8], BootSector> {
    let (input, _jump) = nom_data(data, 3)?;
    let (input, oem) = nom_data(input, 8)?;
    if oem != b"NTFS    " {
        return Err(nom::Err::Failure(nom::error::Error::new(
            data,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (input, bytes_per_sector) = nom_unsigned_two_bytes(input, Endian::Le)?;
    let (input, sectors_per_cluster) = nom_unsigned_one_byte(input, Endian::Le)?;
    // Reserved sectors through the media descriptor block, unused on NTFS
    let (input, _bpb) = nom_data(input, 26)?;
    let (input, total_sectors) = nom_unsigned_eight_bytes(input, Endian::Le)?;
    let (input, mft_cluster) = nom_unsigned_eight_bytes(input, Endian::Le)?;
    let (input, mft_mirror_cluster) = nom_unsigned_eight_bytes(input, Endian::Le)?;
    let (input, clusters_per_mft_record) = nom_unsigned_one_byte(input, Endian::Le)?;
    let (input, _reserved) = nom_data(input, 3)?;
    let (input, clusters_per_index_record) = nom_unsigned_one_byte(input, Endian::Le)?;
    let (input, _reserved) = nom_data(input, 3)?;
    let (input, serial_number) = nom_unsigned_eight_bytes(input, Endian::Le)?;

    let boot = BootSector {
        bytes_per_sector,
        sectors_per_cluster,
        total_sectors,
        mft_cluster,
        mft_mirror_cluster,
        clusters_per_mft_record: clusters_per_mft_record as i8,
        clusters_per_index_record: clusters_per_index_record as i8,
        serial_number,
    };

    Ok((input, boot))
}
