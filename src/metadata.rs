//! Live file metadata

/// Snapshot of one persisted table file, taken at query time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFileMetadata {
    /// File name relative to its column family directory, e.g. `sstable_000007.sst`
    pub name: String,
    /// Column family the file belongs to
    pub column_family_name: String,
    pub level: u32,
    /// Size on disk in bytes
    pub size: u64,
    pub smallest_key: Vec<u8>,
    pub largest_key: Vec<u8>,
}
