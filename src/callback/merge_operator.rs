//! Merge Operator Bridge
//!
//! Host-side merge operators, dispatched through the same registry skeleton
//! as compaction filters.

use std::sync::Arc;

use once_cell::sync::Lazy;

use super::{dispatch, CallbackRegistry};

/// Combines an existing value with merge operands.
///
/// Implementations must not panic.
pub trait MergeOperator: Send + Sync + 'static {
    /// Produce the new value for `key`.
    ///
    /// `existing` is `None` when the key has no live value. Returning `None`
    /// signals that the operands could not be applied.
    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, operands: &[&[u8]]) -> Option<Vec<u8>>;

    /// Name used in logs
    fn name(&self) -> &str;
}

impl<M: MergeOperator + ?Sized> MergeOperator for Arc<M> {
    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, operands: &[&[u8]]) -> Option<Vec<u8>> {
        (**self).full_merge(key, existing, operands)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// What the engine receives back from one merge invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeVerdict {
    /// The merged value to store
    Merged(Vec<u8>),
    /// The operator rejected the operands
    Failed,
}

struct MergeEntry {
    name: Arc<str>,
    operator: Box<dyn MergeOperator>,
}

static MERGE_OPERATORS: Lazy<CallbackRegistry<MergeEntry>> = Lazy::new(CallbackRegistry::new);

/// Register a merge operator for the process lifetime and return its index
pub fn register_merge_operator(operator: impl MergeOperator) -> usize {
    let name: Arc<str> = Arc::from(operator.name());
    let index = MERGE_OPERATORS.register(MergeEntry {
        name: Arc::clone(&name),
        operator: Box::new(operator),
    });
    tracing::debug!("Registered merge operator '{}' at index {}", name, index);
    index
}

/// Run the merge operator registered at `index`
pub fn merge_operator_full_merge(
    index: usize,
    key: &[u8],
    existing: Option<&[u8]>,
    operands: &[&[u8]],
) -> MergeVerdict {
    let merged = dispatch(&MERGE_OPERATORS, index, |entry| {
        entry.operator.full_merge(key, existing, operands)
    });
    match merged {
        Some(value) => MergeVerdict::Merged(value),
        None => MergeVerdict::Failed,
    }
}

/// Name of the merge operator registered at `index`
pub fn merge_operator_name(index: usize) -> Arc<str> {
    dispatch(&MERGE_OPERATORS, index, |entry| Arc::clone(&entry.name))
}
