//! MANIFEST
//!
//! Catalogue of column families and their live table files. Rewritten whole
//! after every change to the live set, via a temp file and a rename.
//!
//! ```text
//! ┌─────────┬─────────┬──────────────────────┐
//! │ CRC (4) │ Len (4) │ bincode(Manifest)    │
//! └─────────┴─────────┴──────────────────────┘
//! ```

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::native::{ColumnFamilyId, DEFAULT_COLUMN_FAMILY_ID, DEFAULT_COLUMN_FAMILY_NAME};

pub(crate) const MANIFEST_FILENAME: &str = "MANIFEST";
const MANIFEST_TMP_FILENAME: &str = "MANIFEST.tmp";

/// One column family as recorded on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFamilyRecord {
    pub id: ColumnFamilyId,
    pub name: String,
    /// Live table file ids
    pub files: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub next_file_id: u64,
    pub next_column_family_id: ColumnFamilyId,
    pub column_families: Vec<ColumnFamilyRecord>,
}

impl Manifest {
    /// Catalogue of a brand new database: just the default family
    pub fn new() -> Self {
        Self {
            next_file_id: 1,
            next_column_family_id: DEFAULT_COLUMN_FAMILY_ID + 1,
            column_families: vec![ColumnFamilyRecord {
                id: DEFAULT_COLUMN_FAMILY_ID,
                name: DEFAULT_COLUMN_FAMILY_NAME.to_string(),
                files: Vec::new(),
            }],
        }
    }

    pub fn find(&self, name: &str) -> Option<&ColumnFamilyRecord> {
        self.column_families.iter().find(|cf| cf.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.column_families.iter().map(|cf| cf.name.clone()).collect()
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(MANIFEST_FILENAME).is_file()
    }

    pub fn load(dir: &Path) -> StoreResult<Self> {
        let path = dir.join(MANIFEST_FILENAME);
        let mut bytes = Vec::new();
        File::open(&path)?.read_to_end(&mut bytes)?;

        if bytes.len() < 8 {
            return Err(StoreError::Corruption(format!(
                "{}: too short ({} bytes)",
                path.display(),
                bytes.len()
            )));
        }
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        crc.copy_from_slice(&bytes[0..4]);
        len.copy_from_slice(&bytes[4..8]);
        let crc = u32::from_le_bytes(crc);
        let len = u32::from_le_bytes(len) as usize;

        let payload = bytes.get(8..8 + len).ok_or_else(|| {
            StoreError::Corruption(format!("{}: truncated", path.display()))
        })?;
        if crc32fast::hash(payload) != crc {
            return Err(StoreError::Corruption(format!(
                "{}: checksum mismatch",
                path.display()
            )));
        }
        Ok(bincode::deserialize(payload)?)
    }

    pub fn store(&self, dir: &Path) -> StoreResult<()> {
        let payload = bincode::serialize(self)?;
        let tmp = dir.join(MANIFEST_TMP_FILENAME);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
            file.write_all(&(payload.len() as u32).to_le_bytes())?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, dir.join(MANIFEST_FILENAME))?;
        Ok(())
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}
