//! Write Batch
//!
//! Operations collected on the host side and applied by the engine as one
//! atomic unit.

use crate::column_family::ColumnFamilyHandle;
use crate::native::{ColumnFamilyId, DEFAULT_COLUMN_FAMILY_ID};

/// One operation in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put {
        cf: ColumnFamilyId,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        cf: ColumnFamilyId,
        key: Vec<u8>,
    },
    Merge {
        cf: ColumnFamilyId,
        key: Vec<u8>,
        value: Vec<u8>,
    },
}

/// An ordered list of writes applied atomically by [`Db::write`](crate::Db::write)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.push_put(DEFAULT_COLUMN_FAMILY_ID, key, value);
    }

    pub fn put_cf(&mut self, cf: &ColumnFamilyHandle, key: &[u8], value: &[u8]) {
        self.push_put(cf.id(), key, value);
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.ops.push(BatchOp::Delete {
            cf: DEFAULT_COLUMN_FAMILY_ID,
            key: key.to_vec(),
        });
    }

    pub fn delete_cf(&mut self, cf: &ColumnFamilyHandle, key: &[u8]) {
        self.ops.push(BatchOp::Delete {
            cf: cf.id(),
            key: key.to_vec(),
        });
    }

    pub fn merge(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Merge {
            cf: DEFAULT_COLUMN_FAMILY_ID,
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    pub fn merge_cf(&mut self, cf: &ColumnFamilyHandle, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Merge {
            cf: cf.id(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    fn push_put(&mut self, cf: ColumnFamilyId, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Put {
            cf,
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Operations in insertion order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}
