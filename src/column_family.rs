//! Column family handles

use crate::native::{ColumnFamilyId, DEFAULT_COLUMN_FAMILY_ID, DEFAULT_COLUMN_FAMILY_NAME};

/// Handle to one column family of an open [`Db`](crate::Db).
///
/// Only an id and a name; it does not keep the database alive. Using it after
/// the family was dropped gets an engine error, and after the database was
/// closed a closed error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnFamilyHandle {
    id: ColumnFamilyId,
    name: String,
}

impl ColumnFamilyHandle {
    pub(crate) fn new(id: ColumnFamilyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub(crate) fn default_family() -> Self {
        Self::new(DEFAULT_COLUMN_FAMILY_ID, DEFAULT_COLUMN_FAMILY_NAME)
    }

    /// Opaque id used at the native boundary
    pub fn id(&self) -> ColumnFamilyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
