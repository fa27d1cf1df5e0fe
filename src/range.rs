//! Key Ranges
//!
//! [`Range`] is the caller-facing half-open interval `[start, limit)`.
//! [`KeyBounds`] is how it crosses the native boundary: an empty bound
//! becomes `None` ("unbounded"), which is different from a zero-length key.

use std::ops::Bound;

/// A half-open key interval `[start, limit)`. An empty bound is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Vec<u8>,
    pub limit: Vec<u8>,
}

impl Range {
    /// Create a range from `start` (inclusive) to `limit` (exclusive)
    pub fn new(start: impl Into<Vec<u8>>, limit: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            limit: limit.into(),
        }
    }

    /// The whole key space
    pub fn full() -> Self {
        Self::default()
    }

    /// True if neither end is bounded
    pub fn is_full(&self) -> bool {
        self.start.is_empty() && self.limit.is_empty()
    }

    /// Borrow as boundary bounds
    pub fn bounds(&self) -> KeyBounds<'_> {
        KeyBounds {
            start: non_empty(&self.start),
            limit: non_empty(&self.limit),
        }
    }
}

fn non_empty(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.is_empty() {
        None
    } else {
        Some(bytes)
    }
}

/// Borrowed bounds as the engine sees them. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyBounds<'a> {
    pub start: Option<&'a [u8]>,
    pub limit: Option<&'a [u8]>,
}

impl<'a> KeyBounds<'a> {
    /// No bound on either side
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build from optional raw bounds
    pub fn new(start: Option<&'a [u8]>, limit: Option<&'a [u8]>) -> Self {
        Self { start, limit }
    }

    /// `start <= key < limit`
    pub fn contains(&self, key: &[u8]) -> bool {
        self.start.map_or(true, |s| key >= s) && self.limit.map_or(true, |l| key < l)
    }

    /// True if the closed span `[smallest, largest]` shares a key with these bounds
    pub fn overlaps(&self, smallest: &[u8], largest: &[u8]) -> bool {
        let below = self.start.map_or(false, |s| largest < s);
        let above = self.limit.map_or(false, |l| smallest >= l);
        !below && !above
    }

    /// Bounds usable with `BTreeMap::range`; `None` if the interval is empty
    /// (start past limit), which `range` would reject.
    pub fn as_range(&self) -> Option<(Bound<&'a [u8]>, Bound<&'a [u8]>)> {
        if let (Some(s), Some(l)) = (self.start, self.limit) {
            if s > l {
                return None;
            }
        }
        let lower = self.start.map_or(Bound::Unbounded, Bound::Included);
        let upper = self.limit.map_or(Bound::Unbounded, Bound::Excluded);
        Some((lower, upper))
    }

    /// True if `[smallest, largest]` lies inside `[start, limit]` (limit inclusive)
    pub fn covers_inclusive(&self, smallest: &[u8], largest: &[u8]) -> bool {
        self.start.map_or(true, |s| smallest >= s) && self.limit.map_or(true, |l| largest <= l)
    }
}

/// Convert a list of ranges for a single boundary call
pub fn to_bounds(ranges: &[Range]) -> Vec<KeyBounds<'_>> {
    ranges.iter().map(Range::bounds).collect()
}
