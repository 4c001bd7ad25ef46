use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct MftEntry {
    pub entry_number: u64,
    pub sequence_number: u16,
    pub in_use: bool,
    pub is_directory: bool,
    pub corrupt: bool,
    pub filename: String,
    pub extension: String,
    pub full_path: String,
    pub parent_entry_number: u64,
    pub parent_sequence_number: u16,
    pub file_attributes: Vec<AttributeFlags>,
    pub si_created: String,
    pub si_modified: String,
    pub si_changed: String,
    pub si_accessed: String,
    pub fn_created: String,
    pub fn_modified: String,
    pub fn_changed: String,
    pub fn_accessed: String,
    pub namespace: Namespace,
    pub size: u64,
    pub is_resident: bool,
    pub ads_count: u32,
    pub usn: u64,
    pub note: String,
}

/// One row per set reason bit. Rows from the same on-disk record share every
/// field except `update_reason`.
#[derive(Debug, Clone, Serialize)]
pub struct UsnJrnlEntry {
    pub update_sequence_number: u64,
    pub update_time: String,
    pub filename: String,
    pub extension: String,
    pub full_path: String,
    pub update_reason: Reason,
    pub update_source_flags: Source,
    pub mft_entry: u64,
    pub mft_sequence: u16,
    pub parent_mft_entry: u64,
    pub parent_mft_sequence: u16,
    pub security_descriptor_id: u32,
    pub file_attributes: Vec<AttributeFlags>,
    pub major_version: u16,
    pub minor_version: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogfileEntry {
    pub lsn: u64,
    pub previous_lsn: u64,
    pub timestamp: String,
    pub filename: String,
    pub event: String,
    pub redo_operation: String,
    pub undo_operation: String,
    pub transaction_id: u32,
    pub record_type: u32,
    pub target_attribute: u16,
    pub target_vcn: u64,
    pub file_reference: String,
    pub parent_reference: String,
    pub file_attributes: Vec<AttributeFlags>,
}

/// Row of the unified `analyze` timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub timestamp: String,
    pub artifact_source: ArtifactSource,
    pub event: String,
    pub filename: String,
    pub full_path: String,
    pub file_reference: String,
    pub parent_reference: String,
    pub extra_info: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ArtifactSource {
    Mft,
    UsnJrnl,
    Logfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Namespace {
    Posix,
    Windows,
    Dos,
    WindowsDos,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AttributeFlags {
    ReadOnly,
    Hidden,
    System,
    Directory,
    Archive,
    Device,
    Normal,
    Temporary,
    SparseFile,
    ReparsePoint,
    Compressed,
    Offline,
    NotContentIndexed,
    Encrypted,
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Reason {
    Overwrite,
    Extend,
    Truncation,
    NamedOverwrite,
    NamedExtend,
    NamedTruncation,
    FileCreate,
    FileDelete,
    EaChange,
    SecurityChange,
    RenameOldName,
    RenameNewName,
    IndexableChange,
    BasicInfoChange,
    HardLinkChange,
    CompressionChange,
    EncryptionChange,
    ObjectIdChange,
    ReparsePointChange,
    StreamChange,
    TransactedChange,
    IntegrityChange,
    Close,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Source {
    DataManagement,
    AuxiliaryData,
    ReplicationManagement,
    ClientReplicationManagement,
    None,
}
