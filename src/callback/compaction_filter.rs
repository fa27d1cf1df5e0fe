//! Compaction Filter Bridge
//!
//! Host-side compaction filters and the shim the engine calls during
//! compaction.
//!
//! ## Translation Rules
//! | host decision                      | engine verdict          |
//! |------------------------------------|-------------------------|
//! | `remove = true` (any new value)    | `Remove`                |
//! | `remove = false`, `Some(v)`        | `ChangeValue(v)`        |
//! | `remove = false`, `None`           | `Keep`                  |

use std::sync::Arc;

use once_cell::sync::Lazy;

use super::{dispatch, CallbackRegistry};

/// Index of the identity filter, registered before anything else
pub const IDENTITY_FILTER_INDEX: usize = 0;

/// Decides the fate of each key-value pair seen by a compaction.
///
/// With multi-threaded compaction one filter instance may be called from
/// several threads at once. Implementations must not panic.
pub trait CompactionFilter: Send + Sync + 'static {
    /// Inspect one entry.
    ///
    /// Return [`FilterDecision::remove`] to drop it from the compaction
    /// output, [`FilterDecision::change`] to rewrite its value, or
    /// [`FilterDecision::keep`] to leave it alone.
    fn filter(&self, level: u32, key: &[u8], value: &[u8]) -> FilterDecision;

    /// Name used in logs
    fn name(&self) -> &str;
}

impl<F: CompactionFilter + ?Sized> CompactionFilter for Arc<F> {
    fn filter(&self, level: u32, key: &[u8], value: &[u8]) -> FilterDecision {
        (**self).filter(level, key, value)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// What a host filter returns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterDecision {
    /// Drop the entry. When set, `new_value` is ignored.
    pub remove: bool,
    /// Replacement value; `None` keeps the existing value
    pub new_value: Option<Vec<u8>>,
}

impl FilterDecision {
    /// Keep the entry unchanged
    pub fn keep() -> Self {
        Self::default()
    }

    /// Drop the entry
    pub fn remove() -> Self {
        Self {
            remove: true,
            new_value: None,
        }
    }

    /// Keep the entry with a new value
    pub fn change(value: impl Into<Vec<u8>>) -> Self {
        Self {
            remove: false,
            new_value: Some(value.into()),
        }
    }
}

/// What the engine receives back from one filter invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Write the entry through unchanged
    Keep,
    /// Leave the entry out of the output
    Remove,
    /// Write the entry with this value instead
    ChangeValue(Vec<u8>),
}

impl FilterVerdict {
    /// Removal flag
    pub fn is_remove(&self) -> bool {
        matches!(self, FilterVerdict::Remove)
    }

    /// "Value changed" flag
    pub fn value_changed(&self) -> bool {
        matches!(self, FilterVerdict::ChangeValue(_))
    }

    /// Replacement bytes, present only when the value changed
    pub fn new_value(&self) -> Option<&[u8]> {
        match self {
            FilterVerdict::ChangeValue(v) => Some(v),
            _ => None,
        }
    }

    /// Value to write for an entry whose current value is `original`.
    /// `None` means the entry is dropped.
    pub fn apply<'a>(&'a self, original: &'a [u8]) -> Option<&'a [u8]> {
        match self {
            FilterVerdict::Keep => Some(original),
            FilterVerdict::Remove => None,
            FilterVerdict::ChangeValue(v) => Some(v),
        }
    }
}

impl From<FilterDecision> for FilterVerdict {
    fn from(decision: FilterDecision) -> Self {
        if decision.remove {
            return FilterVerdict::Remove;
        }
        match decision.new_value {
            Some(v) => FilterVerdict::ChangeValue(v),
            None => FilterVerdict::Keep,
        }
    }
}

/// The filter used when none is configured: keeps everything
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFilter;

impl CompactionFilter for IdentityFilter {
    fn filter(&self, _level: u32, _key: &[u8], _value: &[u8]) -> FilterDecision {
        FilterDecision::keep()
    }

    fn name(&self) -> &str {
        ""
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Registry payload: the host filter plus its name, captured once so the
/// engine can read it on every compaction without calling into the host.
struct FilterEntry {
    name: Arc<str>,
    filter: Box<dyn CompactionFilter>,
}

static COMPACTION_FILTERS: Lazy<CallbackRegistry<FilterEntry>> = Lazy::new(|| {
    let registry = CallbackRegistry::new();
    registry.register(FilterEntry {
        name: Arc::from(IdentityFilter.name()),
        filter: Box::new(IdentityFilter),
    });
    registry
});

/// Register a filter for the process lifetime and return its index
pub fn register_compaction_filter(filter: impl CompactionFilter) -> usize {
    let name: Arc<str> = Arc::from(filter.name());
    let index = COMPACTION_FILTERS.register(FilterEntry {
        name: Arc::clone(&name),
        filter: Box::new(filter),
    });
    tracing::debug!("Registered compaction filter '{}' at index {}", name, index);
    index
}

// =============================================================================
// Engine Entry Points
// =============================================================================

/// Run the filter registered at `index` against one entry.
///
/// Lookup, invoke and translate happen in that order; there is no special
/// path for "no filter", which is just [`IDENTITY_FILTER_INDEX`].
pub fn compaction_filter_filter(index: usize, level: u32, key: &[u8], value: &[u8]) -> FilterVerdict {
    let decision = dispatch(&COMPACTION_FILTERS, index, |entry| {
        entry.filter.filter(level, key, value)
    });
    FilterVerdict::from(decision)
}

/// Name of the filter registered at `index`
pub fn compaction_filter_name(index: usize) -> Arc<str> {
    dispatch(&COMPACTION_FILTERS, index, |entry| Arc::clone(&entry.name))
}
