use super::attributes::attribute::grab_attributes;
use super::attributes::filename::select_filename;
use super::error::MftError;
use super::header::{MftHeader, BAAD_SIGNATURE, FILE_SIGNATURE};
use super::path::{PathAnomaly, PathResolver};
use crate::filesystem::ntfs::fixup::apply_fixup;
use crate::structs::{options::MftOptions, stats::MftStats};
use crate::utils::cancel::CancelToken;
use crate::utils::progress::ProgressReporter;
use crate::utils::strings::file_extension;
use crate::utils::time::filetime_to_iso;
use common::ntfs::{MftEntry, Namespace};
use log::{info, warn};
use std::io::{Read, Seek, SeekFrom};

/// Entries are almost always 1024 bytes. Standalone `$MFT` files carry no boot
/// sector, so the size is confirmed from the first entry's allocated size
const DEFAULT_ENTRY_SIZE: u32 = 1024;
/// Every entry carries whole sectors of this size for fixup purposes
const SECTOR_SIZE: u16 = 512;

/// Stream a `$MFT` file entry by entry and emit one record per entry. When a
/// resolver is provided each record also carries its reconstructed full path
pub(crate) fn read_mft<R: Read + Seek>(
    reader: &mut R,
    options: &MftOptions,
    resolver: Option<&PathResolver>,
    cancel: &CancelToken,
    progress: &mut dyn ProgressReporter,
    emit: &mut dyn FnMut(MftEntry) -> Result<(), MftError>,
) -> Result<MftStats, MftError> {
    let entry_size = discover_entry_size(reader)?;
    let total_entries = stream_length(reader)? / entry_size as u64;
    info!("[mft] Parsing {total_entries} entries of {entry_size} bytes");

    progress.begin(total_entries);
    let mut stats = MftStats::default();
    let mut entry_number: u64 = 0;
    let mut buffer = vec![0u8; entry_size as usize];

    if reader.seek(SeekFrom::Start(0)).is_err() {
        return Err(MftError::ReadFile);
    }

    loop {
        if cancel.is_cancelled() {
            progress.end();
            return Err(MftError::Cancelled);
        }
        if !fill_entry(reader, &mut buffer)? {
            break;
        }
        let current = entry_number;
        entry_number += 1;
        progress.advance(1);

        let record = decode_entry(&mut buffer, current, options, resolver, &mut stats);
        if let Some(record) = record {
            stats.records += 1;
            emit(record)?;
        }
    }

    progress.end();
    info!(
        "[mft] Parsed {} records ({} corrupt, {} fixup mismatches)",
        stats.records, stats.corrupt, stats.fixup_mismatches
    );
    Ok(stats)
}

/// First pass over the file: collect every entry's name and parent reference
pub(crate) fn build_path_resolver<R: Read + Seek>(
    reader: &mut R,
    cancel: &CancelToken,
) -> Result<PathResolver, MftError> {
    let entry_size = discover_entry_size(reader)?;
    if reader.seek(SeekFrom::Start(0)).is_err() {
        return Err(MftError::ReadFile);
    }

    let mut resolver = PathResolver::new();
    let mut buffer = vec![0u8; entry_size as usize];
    let mut entry_number: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(MftError::Cancelled);
        }
        if !fill_entry(reader, &mut buffer)? {
            break;
        }
        let current = entry_number;
        entry_number += 1;

        let header_result = MftHeader::parse_header(&buffer);
        let (_, header) = match header_result {
            Ok(result) => result,
            Err(_err) => continue,
        };
        if header.sig != FILE_SIGNATURE {
            continue;
        }
        if apply_fixup(
            &mut buffer,
            header.fix_up_offset,
            header.fix_up_count,
            SECTOR_SIZE,
        )
        .is_err()
        {
            continue;
        }

        let attributes = grab_attributes(&buffer, header.attrib_offset, header.used_size);
        if let Some(filename) = select_filename(&attributes.filename) {
            resolver.add_entry(
                current,
                header.sequence,
                filename.parent_mft,
                filename.parent_sequence,
                filename.name.clone(),
            );
        }
    }

    info!("[mft] Path cache holds {} entries", resolver.len());
    Ok(resolver)
}

/// Decode one entry into a record, or count and skip it
fn decode_entry(
    buffer: &mut [u8],
    entry_number: u64,
    options: &MftOptions,
    resolver: Option<&PathResolver>,
    stats: &mut MftStats,
) -> Option<MftEntry> {
    // Never-used slots are zero filled
    if buffer[0..4] == [0, 0, 0, 0] {
        return None;
    }

    let header_result = MftHeader::parse_header(buffer);
    let (_, header) = match header_result {
        Ok(result) => result,
        Err(_err) => return None,
    };

    if header.sig != FILE_SIGNATURE {
        stats.corrupt += 1;
        if header.sig == BAAD_SIGNATURE && !options.active_only {
            // Dumpable header, no trustworthy attribute content
            return Some(corrupt_record(&header, entry_number));
        }
        return None;
    }

    if apply_fixup(
        buffer,
        header.fix_up_offset,
        header.fix_up_count,
        SECTOR_SIZE,
    )
    .is_err()
    {
        stats.fixup_mismatches += 1;
        return None;
    }

    if options.active_only && !header.is_in_use() {
        return None;
    }

    let attributes = grab_attributes(buffer, header.attrib_offset, header.used_size);
    let mut record = MftEntry {
        entry_number,
        sequence_number: header.sequence,
        in_use: header.is_in_use(),
        is_directory: header.is_directory(),
        corrupt: false,
        filename: String::new(),
        extension: String::new(),
        full_path: String::new(),
        parent_entry_number: 0,
        parent_sequence_number: 0,
        file_attributes: Vec::new(),
        si_created: String::new(),
        si_modified: String::new(),
        si_changed: String::new(),
        si_accessed: String::new(),
        fn_created: String::new(),
        fn_modified: String::new(),
        fn_changed: String::new(),
        fn_accessed: String::new(),
        namespace: Namespace::Unknown,
        size: attributes.data_size,
        // Entries without a data stream (directories) report as resident
        is_resident: !attributes.has_unnamed_data || attributes.data_resident,
        ads_count: attributes.ads_count,
        usn: 0,
        note: String::new(),
    };

    if let Some(standard) = attributes.standard.first() {
        record.si_created = filetime_to_iso(&standard.created);
        record.si_modified = filetime_to_iso(&standard.modified);
        record.si_changed = filetime_to_iso(&standard.changed);
        record.si_accessed = filetime_to_iso(&standard.accessed);
        record.file_attributes = standard.file_attributes.clone();
        record.usn = standard.usn;
    }

    if let Some(filename) = select_filename(&attributes.filename) {
        record.filename = filename.name.clone();
        record.parent_entry_number = filename.parent_mft;
        record.parent_sequence_number = filename.parent_sequence;
        record.namespace = filename.namespace;
        record.fn_created = filetime_to_iso(&filename.created);
        record.fn_modified = filetime_to_iso(&filename.modified);
        record.fn_changed = filetime_to_iso(&filename.changed);
        record.fn_accessed = filetime_to_iso(&filename.accessed);
        if record.file_attributes.is_empty() {
            record.file_attributes = filename.file_attributes.clone();
        }
        if !record.is_directory {
            record.extension = file_extension(&filename.name);
        }
    }

    if header.is_extension() {
        record.note = format!("extension of entry {}", header.base_entry);
    } else if attributes.nonresident_attribute_list {
        record.note = String::from("non-resident attribute list");
    } else if !attributes.attribute_list.is_empty() {
        record.note = format!("{} attribute list entries", attributes.attribute_list.len());
    }

    if let Some(resolver) = resolver {
        // The cache was built from this same pass, the record's own sequence
        // always matches; staleness only matters on the parent hops
        if let Some(resolved) = resolver.resolve(entry_number, 0) {
            record.full_path = resolved.path;
            match resolved.anomaly {
                Some(PathAnomaly::Cycle) => {
                    stats.path_cycles += 1;
                    record.note = String::from("path cycle");
                }
                Some(PathAnomaly::StaleParent) => {
                    stats.stale_parents += 1;
                    record.note = String::from("stale parent");
                }
                None => {}
            }
        }
    }

    Some(record)
}

/// Minimal record for a BAAD entry, header fields only
fn corrupt_record(header: &MftHeader, entry_number: u64) -> MftEntry {
    MftEntry {
        entry_number,
        sequence_number: header.sequence,
        in_use: header.is_in_use(),
        is_directory: header.is_directory(),
        corrupt: true,
        filename: String::new(),
        extension: String::new(),
        full_path: String::new(),
        parent_entry_number: 0,
        parent_sequence_number: 0,
        file_attributes: Vec::new(),
        si_created: String::new(),
        si_modified: String::new(),
        si_changed: String::new(),
        si_accessed: String::new(),
        fn_created: String::new(),
        fn_modified: String::new(),
        fn_changed: String::new(),
        fn_accessed: String::new(),
        namespace: Namespace::Unknown,
        size: 0,
        is_resident: false,
        ads_count: 0,
        usn: 0,
        note: String::from("BAAD signature"),
    }
}

/// Entry size from the first header's allocated size when plausible
fn discover_entry_size<R: Read + Seek>(reader: &mut R) -> Result<u32, MftError> {
    if reader.seek(SeekFrom::Start(0)).is_err() {
        return Err(MftError::ReadFile);
    }
    let mut first = vec![0u8; 48];
    let mut total = 0;
    while total < first.len() {
        let bytes_read = match reader.read(&mut first[total..]) {
            Ok(result) => result,
            Err(_err) => return Err(MftError::ReadFile),
        };
        if bytes_read == 0 {
            break;
        }
        total += bytes_read;
    }
    if total < first.len() {
        return Err(MftError::ReadFile);
    }

    let header_result = MftHeader::parse_header(&first);
    if let Ok((_, header)) = header_result {
        let plausible = header.total_size.is_power_of_two()
            && (512..=4096).contains(&header.total_size);
        if plausible {
            return Ok(header.total_size);
        }
        warn!(
            "[mft] First entry claims {} byte entries, using the default",
            header.total_size
        );
    }

    Ok(DEFAULT_ENTRY_SIZE)
}

fn stream_length<R: Read + Seek>(reader: &mut R) -> Result<u64, MftError> {
    match reader.seek(SeekFrom::End(0)) {
        Ok(result) => Ok(result),
        Err(_err) => Err(MftError::ReadFile),
    }
}

/// Read one full entry. False on end of stream
fn fill_entry<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<bool, MftError> {
    let mut total = 0;
    while total < buffer.len() {
        let bytes_read = match reader.read(&mut buffer[total..]) {
            Ok(result) => result,
            Err(_err) => return Err(MftError::ReadFile),
        };
        if bytes_read == 0 {
            break;
        }
        total += bytes_read;
    }

    Ok(total == buffer.len())
}
