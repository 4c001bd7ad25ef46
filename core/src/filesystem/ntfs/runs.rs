use crate::filesystem::{error::FileSystemError, ntfs::volume::NtfsVolume};
use crate::utils::nom_helper::{nom_data, nom_unsigned_one_byte, Endian};
use log::warn;
use std::io::{Read, Seek};

/// One extent of a non-resident attribute. Sparse runs have no backing
/// clusters and read as zeros
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DataRun {
    pub(crate) lcn: u64,
    pub(crate) length: u64,
    pub(crate) sparse: bool,
}

/// Decode a mapping-pairs stream. Header byte: low nibble is the size of the
/// length field, high nibble the size of the signed LCN offset field (zero
/// marks a sparse run). Offsets accumulate from run to run. Decoding stops at
/// the zero terminator; a malformed pair ends the list early (the caller
/// counts it as a bad run list but keeps the decoded prefix)
pub(crate) fn parse_data_runs(data: &[u8]) -> nom::IResult<&[u8], Vec<DataRun>> {
    let mut remaining = data;
    let mut runs = Vec::new();
    let mut current_lcn: i64 = 0;

    while !remaining.is_empty() {
        let (input, header) = nom_unsigned_one_byte(remaining, Endian::Le)?;
        if header == 0 {
            remaining = input;
            break;
        }

        let length_size = (header & 0x0f) as u64;
        let offset_size = (header >> 4) as u64;
        if length_size == 0 || length_size > 8 || offset_size > 8 {
            warn!("[ntfs] Malformed mapping pair header {header:#04x}, ending run list");
            break;
        }
        if input.len() < (length_size + offset_size) as usize {
            warn!("[ntfs] Mapping pair exceeds attribute bounds, ending run list");
            break;
        }

        let (input, length_data) = nom_data(input, length_size)?;
        let length = unsigned_varint(length_data);

        if offset_size == 0 {
            runs.push(DataRun {
                lcn: 0,
                length,
                sparse: true,
            });
            remaining = input;
            continue;
        }

        let (input, offset_data) = nom_data(input, offset_size)?;
        current_lcn += signed_varint(offset_data);
        if current_lcn < 0 {
            warn!("[ntfs] Mapping pairs decode to a negative LCN, ending run list");
            break;
        }

        runs.push(DataRun {
            lcn: current_lcn as u64,
            length,
            sparse: false,
        });
        remaining = input;
    }

    Ok((remaining, runs))
}

/// Total clusters covered by a run list
pub(crate) fn total_clusters(runs: &[DataRun]) -> u64 {
    runs.iter().map(|run| run.length).sum()
}

/// Read an arbitrary `(offset, size)` byte range out of a run list, as if the
/// runs were one contiguous stream. Sparse extents read as zeros
pub(crate) fn read_run_bytes<T: Read + Seek>(
    volume: &mut NtfsVolume<T>,
    runs: &[DataRun],
    offset: u64,
    size: u64,
) -> Result<Vec<u8>, FileSystemError> {
    let cluster_size = volume.cluster_size;
    let mut output = Vec::with_capacity(size as usize);

    let mut run_start = 0;
    for run in runs {
        if output.len() as u64 >= size {
            break;
        }

        let run_bytes = run.length * cluster_size;
        let run_end = run_start + run_bytes;
        let want_start = offset + output.len() as u64;
        if want_start >= run_end {
            run_start = run_end;
            continue;
        }

        let within = want_start - run_start;
        let take = (run_bytes - within).min(size - output.len() as u64);
        if run.sparse {
            output.resize(output.len() + take as usize, 0);
        } else {
            let bytes = volume.read_volume(run.lcn * cluster_size + within, take)?;
            if (bytes.len() as u64) < take {
                warn!("[ntfs] Short read inside data run at LCN {}", run.lcn);
                output.extend_from_slice(&bytes);
                break;
            }
            output.extend_from_slice(&bytes);
        }
        run_start = run_end;
    }

    Ok(output)
}

/// Little-endian unsigned value of one to eight bytes
fn unsigned_varint(data: &[u8]) -> u64 {
    let mut value: u64 = 0;
    for (index, byte) in data.iter().enumerate() {
        value |= (*byte as u64) << (8 * index);
    }
    value
}

/// Little-endian signed value of one to eight bytes
fn signed_varint(data: &[u8]) -> i64 {
    let mut value = unsigned_varint(data) as i64;
    let bits = 8 * data.len() as u32;
    if bits < 64 && data.last().map(|byte| byte & 0x80 != 0).unwrap_or(false) {
        value -= 1i64 << bits;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::{parse_data_runs, read_run_bytes, signed_varint, total_clusters, DataRun};
    use crate::filesystem::{
        image::DiskImage,
        ntfs::volume::{tests::build_boot_sector, NtfsVolume},
        partitions::Partition,
    };
    use std::io::Cursor;

    #[test]
    fn test_parse_data_runs() {
        let test = [0x21, 0x18, 0x34, 0x56, 0x00];
        let (_, runs) = parse_data_runs(&test).unwrap();

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].length, 0x18);
        assert_eq!(runs[0].lcn, 0x5634);
        assert!(!runs[0].sparse);
    }

    #[test]
    fn test_parse_data_runs_relative_and_sparse() {
        // 16 clusters at LCN 100, 8 sparse clusters, 4 clusters back at LCN 90
        let test = [0x11, 0x10, 0x64, 0x01, 0x08, 0x11, 0x04, 0xf6, 0x00];
        let (_, runs) = parse_data_runs(&test).unwrap();

        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0], DataRun { lcn: 100, length: 16, sparse: false });
        assert_eq!(runs[1], DataRun { lcn: 0, length: 8, sparse: true });
        assert_eq!(runs[2], DataRun { lcn: 90, length: 4, sparse: false });
        assert_eq!(total_clusters(&runs), 28);
    }

    #[test]
    fn test_parse_data_runs_negative_lcn() {
        // First run cannot be relative to anything, a negative offset is bogus
        let test = [0x11, 0x10, 0xf6, 0x00];
        let (_, runs) = parse_data_runs(&test).unwrap();
        assert!(runs.is_empty());
    }

    #[test]
    fn test_signed_varint() {
        assert_eq!(signed_varint(&[0xf6]), -10);
        assert_eq!(signed_varint(&[0x34, 0x56]), 0x5634);
        assert_eq!(signed_varint(&[0x00, 0x80]), -32768);
    }

    #[test]
    fn test_read_run_bytes() {
        let mut data = vec![0u8; 4096 * 4];
        data[0..512].copy_from_slice(&build_boot_sector(1));
        // Cluster 1 is 0x11, cluster 3 is 0x33
        for value in data.iter_mut().skip(4096).take(4096) {
            *value = 0x11;
        }
        for value in data.iter_mut().skip(4096 * 3).take(4096) {
            *value = 0x33;
        }

        let image = DiskImage::new(Cursor::new(data)).unwrap();
        let partition = Partition { index: 0, offset: 0, size: 4096 * 4 };
        let mut volume = NtfsVolume::open(image, &partition).unwrap();

        let runs = vec![
            DataRun { lcn: 1, length: 1, sparse: false },
            DataRun { lcn: 0, length: 1, sparse: true },
            DataRun { lcn: 3, length: 1, sparse: false },
        ];

        // Straddle the backed/sparse boundary
        let bytes = read_run_bytes(&mut volume, &runs, 4090, 12).unwrap();
        assert_eq!(&bytes[0..6], &[0x11; 6]);
        assert_eq!(&bytes[6..12], &[0; 6]);

        // Read out of the second backed run
        let bytes = read_run_bytes(&mut volume, &runs, 4096 * 2, 8).unwrap();
        assert_eq!(bytes, vec![0x33; 8]);
    }
}
