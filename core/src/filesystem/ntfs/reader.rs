use crate::artifacts::mft::attributes::attribute::{raw_attributes, AttributeForm, RawAttribute};
use crate::artifacts::mft::attributes::header::AttributeType;
use crate::artifacts::mft::attributes::list::{parse_attribute_list, AttributeListEntry};
use crate::artifacts::mft::header::{MftHeader, BAAD_SIGNATURE, FILE_SIGNATURE};
use crate::filesystem::error::FileSystemError;
use crate::filesystem::ntfs::{
    fixup::apply_fixup,
    runs::{read_run_bytes, total_clusters, DataRun},
    volume::NtfsVolume,
};
use log::{error, info, warn};
use std::collections::HashSet;
use std::io::{Read, Seek};

/// Extension-record fan-out limit per base record
const MAX_EXTENSION_RECORDS: usize = 256;

/// Reads arbitrary MFT entries by record number. Bootstrapped from MFT record
/// zero, which describes the layout of the MFT itself
pub(crate) struct MftReader {
    pub(crate) runs: Vec<DataRun>,
    pub(crate) entry_size: u32,
    pub(crate) data_size: u64,
    pub(crate) total_entries: u64,
}

/// A `$DATA` stream gathered off a record, ready for extraction
#[derive(Debug)]
pub(crate) enum StreamData {
    Resident(Vec<u8>),
    NonResident { runs: Vec<DataRun>, real_size: u64 },
}

impl MftReader {
    /// Read MFT record zero at the boot sector's MFT cluster and walk its
    /// unnamed `$DATA` runs. Record zero is the MFT, its runs locate every
    /// other entry
    pub(crate) fn bootstrap<T: Read + Seek>(
        volume: &mut NtfsVolume<T>,
    ) -> Result<MftReader, FileSystemError> {
        let entry_size = volume.mft_entry_size;
        let offset = volume.mft_cluster * volume.cluster_size;
        let mut entry = volume.read_volume(offset, entry_size as u64)?;
        if entry.len() < entry_size as usize {
            error!("[ntfs] MFT record zero is truncated");
            return Err(FileSystemError::BadMftEntry);
        }

        let header_result = MftHeader::parse_header(&entry);
        let (_, header) = match header_result {
            Ok(result) => result,
            Err(_err) => {
                error!("[ntfs] Could not parse MFT record zero header");
                return Err(FileSystemError::BadMftEntry);
            }
        };
        if header.sig != FILE_SIGNATURE {
            error!("[ntfs] MFT record zero has no FILE signature");
            return Err(FileSystemError::BadMftEntry);
        }

        apply_fixup(
            &mut entry,
            header.fix_up_offset,
            header.fix_up_count,
            volume.bytes_per_sector,
        )?;

        let attributes = raw_attributes(&entry, header.attrib_offset, header.used_size);
        let mut instances = Vec::new();
        let mut data_size = 0;
        for attribute in &attributes {
            if attribute.attrib_type != AttributeType::Data || !attribute.name.is_empty() {
                continue;
            }
            if let AttributeForm::NonResident { info, runs } = &attribute.form {
                if info.first_vcn == 0 {
                    data_size = info.real_size;
                }
                instances.push((info.first_vcn, runs.clone()));
            }
        }

        let mut reader = MftReader {
            runs: Vec::new(),
            entry_size,
            data_size,
            total_entries: 0,
        };

        // Very large volumes scatter the MFT's own runs over extension records
        let list = attribute_list_entries(&attributes, volume)?;
        let mut visited = HashSet::new();
        visited.insert((header.index as u64, header.sequence));
        for entry_ref in list {
            if entry_ref.attrib_type != AttributeType::Data || !entry_ref.name.is_empty() {
                continue;
            }
            if !visited.insert((entry_ref.mft_entry, entry_ref.mft_sequence)) {
                continue;
            }
            if visited.len() > MAX_EXTENSION_RECORDS {
                warn!("[ntfs] MFT attribute list exceeds the extension record limit");
                break;
            }
            if entry_ref.first_vcn == 0 {
                // Base instance, already collected above
                continue;
            }

            // Partial run list collected so far covers the extension entries
            reader.runs = merge_instances(&instances);
            let extension = reader.read_entry(volume, entry_ref.mft_entry);
            let (ext_header, ext_entry) = match extension {
                Ok(result) => result,
                Err(err) => {
                    warn!(
                        "[ntfs] Could not read MFT extension record {}: {err:?}",
                        entry_ref.mft_entry
                    );
                    continue;
                }
            };
            for attribute in raw_attributes(&ext_entry, ext_header.attrib_offset, ext_header.used_size)
            {
                if attribute.attrib_type != AttributeType::Data || !attribute.name.is_empty() {
                    continue;
                }
                if let AttributeForm::NonResident { info, runs } = &attribute.form {
                    instances.push((info.first_vcn, runs.clone()));
                }
            }
        }

        reader.runs = merge_instances(&instances);
        if reader.runs.is_empty() {
            error!("[ntfs] MFT record zero carries no data runs");
            return Err(FileSystemError::BadMftEntry);
        }

        reader.total_entries = if entry_size == 0 {
            0
        } else {
            reader.data_size / entry_size as u64
        };
        info!(
            "[ntfs] MFT spans {} run(s), {} bytes, {} entries",
            reader.runs.len(),
            reader.data_size,
            reader.total_entries
        );
        Ok(reader)
    }

    /// Read entry `n`, verify its signature and reconstitute its sectors.
    /// `BAAD` entries fail with `BadMftEntry`
    pub(crate) fn read_entry<T: Read + Seek>(
        &self,
        volume: &mut NtfsVolume<T>,
        entry_number: u64,
    ) -> Result<(MftHeader, Vec<u8>), FileSystemError> {
        let offset = entry_number * self.entry_size as u64;
        let mut entry = read_run_bytes(volume, &self.runs, offset, self.entry_size as u64)?;
        if entry.len() < self.entry_size as usize {
            return Err(FileSystemError::BadMftEntry);
        }

        let header_result = MftHeader::parse_header(&entry);
        let (_, header) = match header_result {
            Ok(result) => result,
            Err(_err) => return Err(FileSystemError::BadMftEntry),
        };
        if header.sig == BAAD_SIGNATURE {
            warn!("[ntfs] Entry {entry_number} is marked BAAD");
            return Err(FileSystemError::BadMftEntry);
        }
        if header.sig != FILE_SIGNATURE {
            return Err(FileSystemError::BadMftEntry);
        }

        apply_fixup(
            &mut entry,
            header.fix_up_offset,
            header.fix_up_count,
            volume.bytes_per_sector,
        )?;

        Ok((header, entry))
    }

    /// Gather the `$DATA` stream with the provided name (empty for the default
    /// stream) from an entry, following `$ATTRIBUTE_LIST` indirection across
    /// extension records. Name matching is case-insensitive, NTFS canonical
    /// casing comes from `$UpCase`
    pub(crate) fn collect_stream<T: Read + Seek>(
        &self,
        volume: &mut NtfsVolume<T>,
        entry_number: u64,
        stream_name: &str,
    ) -> Result<Option<StreamData>, FileSystemError> {
        let (header, entry) = self.read_entry(volume, entry_number)?;
        let attributes = raw_attributes(&entry, header.attrib_offset, header.used_size);

        let list = attribute_list_entries(&attributes, volume)?;
        if !list.is_empty() {
            let mut instances = Vec::new();
            let mut real_size = 0;
            let mut visited = HashSet::new();
            visited.insert((entry_number, header.sequence));

            for entry_ref in &list {
                if entry_ref.attrib_type != AttributeType::Data
                    || !entry_ref.name.eq_ignore_ascii_case(stream_name)
                {
                    continue;
                }

                let holder = if entry_ref.mft_entry == entry_number {
                    // The instance lives in the base record itself
                    collect_instances(&attributes, stream_name, &mut real_size, &mut instances);
                    continue;
                } else {
                    entry_ref.mft_entry
                };

                // Several list entries may share one extension record, and a
                // corrupt list can loop. Each record is read once
                if !visited.insert((holder, entry_ref.mft_sequence)) {
                    continue;
                }
                if visited.len() > MAX_EXTENSION_RECORDS {
                    warn!("[ntfs] Attribute list exceeds the extension record limit");
                    break;
                }

                let extension = self.read_entry(volume, holder);
                let (ext_header, ext_entry) = match extension {
                    Ok(result) => result,
                    Err(err) => {
                        warn!("[ntfs] Could not read extension record {holder}: {err:?}");
                        continue;
                    }
                };
                let ext_attributes =
                    raw_attributes(&ext_entry, ext_header.attrib_offset, ext_header.used_size);
                collect_instances(&ext_attributes, stream_name, &mut real_size, &mut instances);
            }

            if instances.is_empty() {
                return Ok(None);
            }
            let runs = merge_instances(&instances);
            check_run_coverage(&runs, real_size, volume.cluster_size);
            return Ok(Some(StreamData::NonResident { runs, real_size }));
        }

        // No indirection, the stream lives on this record
        for attribute in &attributes {
            if attribute.attrib_type != AttributeType::Data
                || !attribute.name.eq_ignore_ascii_case(stream_name)
            {
                continue;
            }
            match &attribute.form {
                AttributeForm::Resident { value } => {
                    return Ok(Some(StreamData::Resident(value.clone())));
                }
                AttributeForm::NonResident { info, runs } => {
                    check_run_coverage(runs, info.real_size, volume.cluster_size);
                    return Ok(Some(StreamData::NonResident {
                        runs: runs.clone(),
                        real_size: info.real_size,
                    }));
                }
            }
        }

        Ok(None)
    }
}

/// Pull non-resident instances of the named stream out of an attribute set
fn collect_instances(
    attributes: &[RawAttribute],
    stream_name: &str,
    real_size: &mut u64,
    instances: &mut Vec<(u64, Vec<DataRun>)>,
) {
    for attribute in attributes {
        if attribute.attrib_type != AttributeType::Data
            || !attribute.name.eq_ignore_ascii_case(stream_name)
        {
            continue;
        }
        if let AttributeForm::NonResident { info, runs } = &attribute.form {
            // The real size is only valid on the first instance
            if info.first_vcn == 0 {
                *real_size = info.real_size;
            }
            instances.push((info.first_vcn, runs.clone()));
        }
    }
}

/// The attribute list value, whether it is resident or stored in its own runs
fn attribute_list_entries<T: Read + Seek>(
    attributes: &[RawAttribute],
    volume: &mut NtfsVolume<T>,
) -> Result<Vec<AttributeListEntry>, FileSystemError> {
    for attribute in attributes {
        if attribute.attrib_type != AttributeType::AttributeList {
            continue;
        }
        let value = match &attribute.form {
            AttributeForm::Resident { value } => value.clone(),
            AttributeForm::NonResident { info, runs } => {
                let size = info.real_size.min(total_clusters(runs) * volume.cluster_size);
                read_run_bytes(volume, runs, 0, size)?
            }
        };

        let list_result = parse_attribute_list(&value);
        match list_result {
            Ok((_, entries)) => return Ok(entries),
            Err(_err) => {
                warn!("[ntfs] Could not parse attribute list value");
                return Ok(Vec::new());
            }
        }
    }

    Ok(Vec::new())
}

/// A run list that covers fewer clusters than the stream claims was cut short
/// by a bad mapping pair
fn check_run_coverage(runs: &[DataRun], real_size: u64, cluster_size: u64) {
    let covered = total_clusters(runs) * cluster_size;
    if covered < real_size {
        warn!(
            "[ntfs] Run list covers {covered} bytes but the stream claims {real_size}, output will be short"
        );
    }
}

/// Order stream instances by starting VCN and join their runs
fn merge_instances(instances: &[(u64, Vec<DataRun>)]) -> Vec<DataRun> {
    let mut ordered: Vec<&(u64, Vec<DataRun>)> = instances.iter().collect();
    ordered.sort_by_key(|(first_vcn, _)| *first_vcn);

    let mut runs = Vec::new();
    for (_, instance) in ordered {
        runs.extend_from_slice(instance);
    }
    runs
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{MftReader, StreamData};
    use crate::artifacts::mft::attributes::attribute::tests::{
        build_nonresident_attribute, build_resident_attribute,
    };
    use crate::filesystem::{
        image::DiskImage,
        ntfs::volume::{tests::build_boot_sector, NtfsVolume},
        partitions::Partition,
    };
    use std::io::Cursor;

    /// Wrap attributes into a 1024 byte FILE entry with a valid fixup array
    pub(crate) fn build_mft_entry(entry_number: u32, attributes: &[Vec<u8>]) -> Vec<u8> {
        let attrib_offset = 56usize;
        let mut entry = vec![0u8; 1024];
        entry[0..4].copy_from_slice(b"FILE");
        entry[4..6].copy_from_slice(&48u16.to_le_bytes());
        entry[6..8].copy_from_slice(&3u16.to_le_bytes());
        entry[16..18].copy_from_slice(&1u16.to_le_bytes());
        entry[20..22].copy_from_slice(&(attrib_offset as u16).to_le_bytes());
        entry[22..24].copy_from_slice(&1u16.to_le_bytes());
        entry[28..32].copy_from_slice(&1024u32.to_le_bytes());
        entry[44..48].copy_from_slice(&entry_number.to_le_bytes());

        let mut offset = attrib_offset;
        for attribute in attributes {
            entry[offset..offset + attribute.len()].copy_from_slice(attribute);
            offset += attribute.len();
        }
        entry[offset..offset + 4].copy_from_slice(&0xffff_ffffu32.to_le_bytes());
        entry[24..28].copy_from_slice(&((offset + 8) as u32).to_le_bytes());

        // Fixup: check value 1, originals taken from the sector tails
        let tail_one = [entry[510], entry[511]];
        let tail_two = [entry[1022], entry[1023]];
        entry[48..50].copy_from_slice(&1u16.to_le_bytes());
        entry[50..52].copy_from_slice(&tail_one);
        entry[52..54].copy_from_slice(&tail_two);
        entry[510..512].copy_from_slice(&1u16.to_le_bytes());
        entry[1022..1024].copy_from_slice(&1u16.to_le_bytes());
        entry
    }

    /// Minimal volume: boot sector, MFT of four entries at cluster 1.
    /// Entry 0 describes a one-cluster MFT at LCN 1
    pub(crate) fn build_test_volume() -> Vec<u8> {
        let mut image = vec![0u8; 4096 * 4];
        image[0..512].copy_from_slice(&build_boot_sector(1));

        let data = build_nonresident_attribute(0x80, "", 4096, 4096, &[0x11, 0x01, 0x01, 0x00]);
        let entry0 = build_mft_entry(0, &[data]);
        image[4096..4096 + 1024].copy_from_slice(&entry0);

        let resident = build_resident_attribute(0x80, b"resident payload");
        let entry1 = build_mft_entry(1, &[resident]);
        image[4096 + 1024..4096 + 2048].copy_from_slice(&entry1);
        image
    }

    fn open_volume(image: Vec<u8>) -> NtfsVolume<Cursor<Vec<u8>>> {
        let size = image.len() as u64;
        let disk = DiskImage::new(Cursor::new(image)).unwrap();
        let partition = Partition {
            index: 0,
            offset: 0,
            size,
        };
        NtfsVolume::open(disk, &partition).unwrap()
    }

    #[test]
    fn test_bootstrap() {
        let mut volume = open_volume(build_test_volume());
        let reader = MftReader::bootstrap(&mut volume).unwrap();

        assert_eq!(reader.entry_size, 1024);
        assert_eq!(reader.data_size, 4096);
        assert_eq!(reader.total_entries, 4);
        assert_eq!(reader.runs.len(), 1);
        assert_eq!(reader.runs[0].lcn, 1);
    }

    #[test]
    fn test_read_entry() {
        let mut volume = open_volume(build_test_volume());
        let reader = MftReader::bootstrap(&mut volume).unwrap();

        let (header, entry) = reader.read_entry(&mut volume, 1).unwrap();
        assert_eq!(header.index, 1);
        assert_eq!(entry.len(), 1024);
        // Empty slot has no FILE signature
        assert!(reader.read_entry(&mut volume, 2).is_err());
    }

    #[test]
    fn test_collect_stream_resident() {
        let mut volume = open_volume(build_test_volume());
        let reader = MftReader::bootstrap(&mut volume).unwrap();

        let stream = reader.collect_stream(&mut volume, 1, "").unwrap();
        match stream {
            Some(StreamData::Resident(value)) => assert_eq!(value, b"resident payload"),
            _ => panic!("expected resident stream"),
        }
    }
}
