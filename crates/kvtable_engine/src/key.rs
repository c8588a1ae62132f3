//! Engine key and key-range types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Bound;

/// A key as understood by the storage engine.
///
/// Keys are totally ordered: every integer sorts before every string,
/// integers compare numerically and strings compare by their UTF-8 bytes.
/// This matches the native ordering browser-grade engines apply to numeric
/// and string keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Non-negative integer key.
    Integer(u64),
    /// String key.
    Text(String),
}

impl Key {
    /// Returns the integer value, if this is an integer key.
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Key::Integer(n) => Some(*n),
            Key::Text(_) => None,
        }
    }

    /// Returns the string value, if this is a string key.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Key::Integer(_) => None,
            Key::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(n) => write!(f, "{n}"),
            Key::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<u64> for Key {
    fn from(n: u64) -> Self {
        Key::Integer(n)
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Integer(u64::from(n))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

/// Iteration direction for cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending key order.
    Forward,
    /// Descending key order.
    Reverse,
}

/// A contiguous slice of the key space.
///
/// Each side is a [`Bound`]: `Included` for a closed bound, `Excluded` for
/// an open bound, `Unbounded` for no limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    /// Lower bound.
    pub lower: Bound<Key>,
    /// Upper bound.
    pub upper: Bound<Key>,
}

impl KeyRange {
    /// The range covering every key.
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// The range containing exactly `key`.
    pub fn only(key: Key) -> Self {
        Self {
            lower: Bound::Included(key.clone()),
            upper: Bound::Included(key),
        }
    }

    /// Keys above `key`; `open` excludes `key` itself.
    pub fn lower_bound(key: Key, open: bool) -> Self {
        Self {
            lower: bound(key, open),
            upper: Bound::Unbounded,
        }
    }

    /// Keys below `key`; `open` excludes `key` itself.
    pub fn upper_bound(key: Key, open: bool) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: bound(key, open),
        }
    }

    /// Keys between `lower` and `upper`.
    pub fn bound(lower: Key, upper: Key, lower_open: bool, upper_open: bool) -> Self {
        Self {
            lower: bound(lower, lower_open),
            upper: bound(upper, upper_open),
        }
    }

    /// Returns true if no key can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
            (Bound::Included(lo), Bound::Excluded(hi))
            | (Bound::Excluded(lo), Bound::Included(hi))
            | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
            _ => false,
        }
    }

    /// Returns true if `key` lies inside the range.
    pub fn contains(&self, key: &Key) -> bool {
        let above = match &self.lower {
            Bound::Included(lo) => key >= lo,
            Bound::Excluded(lo) => key > lo,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(hi) => key <= hi,
            Bound::Excluded(hi) => key < hi,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Borrowed bounds suitable for `BTreeMap::range`.
    ///
    /// Callers must check [`KeyRange::is_empty`] first; ordered maps panic
    /// on inverted bounds.
    pub fn as_bounds(&self) -> (Bound<&Key>, Bound<&Key>) {
        (self.lower.as_ref(), self.upper.as_ref())
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lower {
            Bound::Included(k) => write!(f, "[{k}")?,
            Bound::Excluded(k) => write!(f, "({k}")?,
            Bound::Unbounded => f.write_str("(-inf")?,
        }
        f.write_str(", ")?;
        match &self.upper {
            Bound::Included(k) => write!(f, "{k}]"),
            Bound::Excluded(k) => write!(f, "{k})"),
            Bound::Unbounded => f.write_str("+inf)"),
        }
    }
}

fn bound(key: Key, open: bool) -> Bound<Key> {
    if open {
        Bound::Excluded(key)
    } else {
        Bound::Included(key)
    }
}
