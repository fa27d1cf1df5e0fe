//! Callback Bridge
//!
//! The engine never holds host closures. It holds small integers, handed out
//! by a [`CallbackRegistry`], and calls back into this module with them.
//!
//! ## Invocation Flow
//! ```text
//!   engine ──(index, raw buffers)──▶ dispatch shim
//!                                        │ lookup  (registry, lock-free)
//!                                        │ invoke  (host callback)
//!                                        │ translate (host result → engine convention)
//!   engine ◀──────── verdict ────────────┘
//! ```
//!
//! Every callback kind (compaction filter, merge operator) reuses
//! [`dispatch`] for the lookup and invoke steps and supplies its own
//! translation.

mod registry;
pub mod compaction_filter;
pub mod merge_operator;

pub use registry::CallbackRegistry;
pub use compaction_filter::{
    compaction_filter_filter, compaction_filter_name, register_compaction_filter, CompactionFilter,
    FilterDecision, FilterVerdict, IdentityFilter, IDENTITY_FILTER_INDEX,
};
pub use merge_operator::{
    merge_operator_full_merge, merge_operator_name, register_merge_operator, MergeOperator,
    MergeVerdict,
};

/// Look up `index` in `registry` and run `invoke` against the entry.
///
/// Host callbacks must not panic: a panic here unwinds through the engine
/// thread that triggered the callback.
pub fn dispatch<T, R>(registry: &CallbackRegistry<T>, index: usize, invoke: impl FnOnce(&T) -> R) -> R {
    let entry = registry.get(index);
    invoke(entry.as_ref())
}
