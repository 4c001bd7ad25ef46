//! End to end flow over a synthetic raw image: locate the partition, extract
//! the artifacts, then parse the extracted MFT into record sinks.

use relic::core::{extract, parse_mft, ArtifactKind};
use relic::structs::options::{ExtractOptions, MftOptions};
use relic::structs::output::Output;
use relic::{CancelToken, SilentProgress};
use std::fs::{create_dir_all, read, read_to_string, write};
use std::path::PathBuf;

/// Boot sector: 512 byte sectors, 8 sector clusters, MFT at cluster 1,
/// 1024 byte entries
fn boot_sector() -> Vec<u8> {
    let mut sector = vec![0u8; 512];
    sector[3..11].copy_from_slice(b"NTFS    ");
    sector[0x0b..0x0d].copy_from_slice(&512u16.to_le_bytes());
    sector[0x0d] = 8;
    sector[0x28..0x30].copy_from_slice(&64u64.to_le_bytes());
    sector[0x30..0x38].copy_from_slice(&1u64.to_le_bytes());
    sector[0x38..0x40].copy_from_slice(&2u64.to_le_bytes());
    sector[0x40] = 0xf6; // 1 << 10 byte records
    sector[0x44] = 1;
    sector[510] = 0x55;
    sector[511] = 0xaa;
    sector
}

fn resident_attribute(attrib_type: u32, value: &[u8]) -> Vec<u8> {
    let value_offset = 24usize;
    let mut size = value_offset + value.len();
    size = (size + 7) & !7;

    let mut attribute = vec![0u8; size];
    attribute[0..4].copy_from_slice(&attrib_type.to_le_bytes());
    attribute[4..8].copy_from_slice(&(size as u32).to_le_bytes());
    attribute[16..20].copy_from_slice(&(value.len() as u32).to_le_bytes());
    attribute[20..22].copy_from_slice(&(value_offset as u16).to_le_bytes());
    attribute[24..24 + value.len()].copy_from_slice(value);
    attribute
}

fn nonresident_data_attribute(allocated: u64, real: u64, mapping_pairs: &[u8]) -> Vec<u8> {
    let runs_offset = 64usize;
    let mut size = runs_offset + mapping_pairs.len();
    size = (size + 7) & !7;

    let mut attribute = vec![0u8; size];
    attribute[0..4].copy_from_slice(&0x80u32.to_le_bytes());
    attribute[4..8].copy_from_slice(&(size as u32).to_le_bytes());
    attribute[8] = 1;
    attribute[32..34].copy_from_slice(&(runs_offset as u16).to_le_bytes());
    attribute[40..48].copy_from_slice(&allocated.to_le_bytes());
    attribute[48..56].copy_from_slice(&real.to_le_bytes());
    attribute[56..64].copy_from_slice(&real.to_le_bytes());
    attribute[runs_offset..runs_offset + mapping_pairs.len()].copy_from_slice(mapping_pairs);
    attribute
}

fn standard_information(filetime: u64) -> Vec<u8> {
    let mut value = vec![0u8; 48];
    for index in 0..4 {
        value[index * 8..index * 8 + 8].copy_from_slice(&filetime.to_le_bytes());
    }
    value[32] = 0x20;
    value
}

fn file_name(parent: u64, parent_seq: u16, namespace: u8, name: &str) -> Vec<u8> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let mut value = vec![0u8; 66 + units.len() * 2];
    value[0..6].copy_from_slice(&parent.to_le_bytes()[0..6]);
    value[6..8].copy_from_slice(&parent_seq.to_le_bytes());
    value[64] = units.len() as u8;
    value[65] = namespace;
    for (index, unit) in units.iter().enumerate() {
        value[66 + index * 2..68 + index * 2].copy_from_slice(&unit.to_le_bytes());
    }
    value
}

/// 1024 byte FILE entry with a valid update sequence array
fn mft_entry(entry_number: u32, sequence: u16, flags: u16, attributes: &[Vec<u8>]) -> Vec<u8> {
    let attrib_offset = 56usize;
    let mut entry = vec![0u8; 1024];
    entry[0..4].copy_from_slice(b"FILE");
    entry[4..6].copy_from_slice(&48u16.to_le_bytes());
    entry[6..8].copy_from_slice(&3u16.to_le_bytes());
    entry[16..18].copy_from_slice(&sequence.to_le_bytes());
    entry[20..22].copy_from_slice(&(attrib_offset as u16).to_le_bytes());
    entry[22..24].copy_from_slice(&flags.to_le_bytes());
    entry[28..32].copy_from_slice(&1024u32.to_le_bytes());
    entry[44..48].copy_from_slice(&entry_number.to_le_bytes());

    let mut offset = attrib_offset;
    for attribute in attributes {
        entry[offset..offset + attribute.len()].copy_from_slice(attribute);
        offset += attribute.len();
    }
    entry[offset..offset + 4].copy_from_slice(&0xffff_ffffu32.to_le_bytes());
    entry[24..28].copy_from_slice(&((offset + 8) as u32).to_le_bytes());

    let tail_one = [entry[510], entry[511]];
    let tail_two = [entry[1022], entry[1023]];
    entry[48..50].copy_from_slice(&0x0042u16.to_le_bytes());
    entry[50..52].copy_from_slice(&tail_one);
    entry[52..54].copy_from_slice(&tail_two);
    entry[510..512].copy_from_slice(&0x0042u16.to_le_bytes());
    entry[1022..1024].copy_from_slice(&0x0042u16.to_le_bytes());
    entry
}

/// Eight clusters: boot sector in cluster 0, an eight entry MFT in clusters
/// 1 and 2, free space beyond
fn build_image() -> Vec<u8> {
    let cluster_size = 4096;
    let mut image = vec![0u8; cluster_size * 8];
    image[0..512].copy_from_slice(&boot_sector());

    let timestamp = 132244766418940254u64;
    let mut entries = Vec::new();

    // Entry 0: the MFT itself, two clusters at LCN 1
    entries.push(mft_entry(
        0,
        1,
        0x1,
        &[
            resident_attribute(0x10, &standard_information(timestamp)),
            resident_attribute(0x30, &file_name(5, 5, 3, "$MFT")),
            nonresident_data_attribute(8192, 8192, &[0x11, 0x02, 0x01, 0x00]),
        ],
    ));
    for number in 1..5u32 {
        if number == 2 {
            // Entry 2: $LogFile with resident data for the walker to find
            entries.push(mft_entry(
                2,
                2,
                0x1,
                &[
                    resident_attribute(0x30, &file_name(5, 5, 3, "$LogFile")),
                    resident_attribute(0x80, &vec![0u8; 64]),
                ],
            ));
        } else {
            entries.push(vec![0u8; 1024]);
        }
    }
    // Entry 5: root directory
    entries.push(mft_entry(
        5,
        5,
        0x3,
        &[
            resident_attribute(0x10, &standard_information(timestamp)),
            resident_attribute(0x30, &file_name(5, 5, 3, ".")),
        ],
    ));
    // Entries 6 and 7: a live file and a deleted file under the root
    entries.push(mft_entry(
        6,
        1,
        0x1,
        &[
            resident_attribute(0x10, &standard_information(timestamp)),
            resident_attribute(0x30, &file_name(5, 5, 3, "evidence.txt")),
            resident_attribute(0x80, b"forensic payload"),
        ],
    ));
    entries.push(mft_entry(
        7,
        4,
        0x0,
        &[
            resident_attribute(0x10, &standard_information(timestamp)),
            resident_attribute(0x30, &file_name(5, 5, 3, "deleted.bin")),
            resident_attribute(0x80, b"gone"),
        ],
    ));

    let mut offset = cluster_size;
    for entry in entries {
        image[offset..offset + entry.len()].copy_from_slice(&entry);
        offset += 1024;
    }
    image
}

fn workspace(name: &str) -> PathBuf {
    let path = PathBuf::from("./tmp").join(name);
    create_dir_all(&path).unwrap();
    path
}

#[test]
fn test_extract_and_parse_mft() {
    let dir = workspace("pipeline");
    let image_path = dir.join("synthetic.dd");
    write(&image_path, build_image()).unwrap();

    let out_dir = dir.join("extracted");
    let options = ExtractOptions {
        image: image_path.display().to_string(),
        out_dir: out_dir.display().to_string(),
        partition: None,
        skip_mft: false,
        skip_logfile: false,
        skip_usnjrnl: true,
    };

    let artifacts = extract(&options, &CancelToken::new(), &mut SilentProgress).unwrap();

    let mft = artifacts
        .iter()
        .find(|artifact| artifact.kind == ArtifactKind::Mft)
        .unwrap();
    let mft_data = read(&mft.path).unwrap();
    assert_eq!(mft_data.len(), 8192);
    assert_eq!(&mft_data[0..4], b"FILE");

    let logfile = artifacts
        .iter()
        .find(|artifact| artifact.kind == ArtifactKind::Logfile)
        .unwrap();
    assert_eq!(read(&logfile.path).unwrap().len(), 64);

    // Parse the extracted MFT to CSV with paths
    let parse_out = dir.join("parsed");
    let mft_options = MftOptions {
        path: mft.path.display().to_string(),
        include_paths: true,
        active_only: false,
    };
    let output = Output::new(&parse_out.display().to_string(), "csv");
    let stats = parse_mft(&mft_options, &output, &CancelToken::new(), &mut SilentProgress).unwrap();

    assert_eq!(stats.records, 5);
    assert_eq!(stats.corrupt, 0);
    assert_eq!(stats.fixup_mismatches, 0);

    let csv = read_to_string(parse_out.join("mft.csv")).unwrap();
    assert!(csv.contains("evidence.txt"));
    assert!(csv.contains("\\evidence.txt"));
    assert!(csv.contains("deleted.bin"));

    // Parsing the same input twice yields byte identical output
    let second_out = dir.join("parsed_again");
    let output = Output::new(&second_out.display().to_string(), "csv");
    parse_mft(&mft_options, &output, &CancelToken::new(), &mut SilentProgress).unwrap();
    let csv_again = read_to_string(second_out.join("mft.csv")).unwrap();
    assert_eq!(csv, csv_again);
}

#[test]
fn test_extract_partition_selection() {
    let dir = workspace("pipeline_selection");
    let image_path = dir.join("missing_partition.dd");
    write(&image_path, build_image()).unwrap();

    let options = ExtractOptions {
        image: image_path.display().to_string(),
        out_dir: dir.join("out").display().to_string(),
        partition: Some(3),
        skip_mft: false,
        skip_logfile: true,
        skip_usnjrnl: true,
    };

    // Only one NTFS partition exists, index 3 is out of range
    let result = extract(&options, &CancelToken::new(), &mut SilentProgress);
    assert!(result.is_err());
}
