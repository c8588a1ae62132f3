//! Range construction for the two table layouts.

use kvtable_codec::{validate_key, CodecResult, KeyCodec};
use kvtable_engine::{Key, KeyRange};
use std::ops::Bound;

/// Where a table's rows live inside its container.
///
/// A dedicated container holds nothing but the table, so logical keys are
/// stored verbatim and "the whole table" is the unbounded range. A shared
/// container holds many tables; keys are composite and every range is
/// clamped to the table's sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeySpace {
    Native,
    Shared(KeyCodec),
}

impl KeySpace {
    /// The engine key for a logical key.
    pub(crate) fn encode(&self, key: &Key) -> CodecResult<Key> {
        match self {
            KeySpace::Native => {
                validate_key(key)?;
                Ok(key.clone())
            }
            KeySpace::Shared(codec) => codec.encode(key),
        }
    }

    /// Every row of the table.
    pub(crate) fn whole(&self) -> KeyRange {
        match self {
            KeySpace::Native => KeyRange::all(),
            KeySpace::Shared(codec) => codec.table_range(),
        }
    }

    /// Exactly `key`.
    pub(crate) fn only(&self, key: &Key) -> CodecResult<KeyRange> {
        Ok(KeyRange::only(self.encode(key)?))
    }

    /// Keys `>= key`.
    pub(crate) fn since(&self, key: &Key) -> CodecResult<KeyRange> {
        Ok(KeyRange {
            lower: Bound::Included(self.encode(key)?),
            upper: self.whole().upper,
        })
    }

    /// Keys `<= key`.
    pub(crate) fn until(&self, key: &Key) -> CodecResult<KeyRange> {
        Ok(KeyRange {
            lower: self.whole().lower,
            upper: Bound::Included(self.encode(key)?),
        })
    }

    /// Keys in `[from, to]`.
    pub(crate) fn between(&self, from: &Key, to: &Key) -> CodecResult<KeyRange> {
        Ok(KeyRange::bound(
            self.encode(from)?,
            self.encode(to)?,
            false,
            false,
        ))
    }
}

/// The slice of `range` starting at `edge`, or all of it when the reverse
/// cursor ran off the start.
pub(crate) fn window(range: &KeyRange, edge: Option<Key>) -> KeyRange {
    KeyRange {
        lower: edge.map_or_else(|| range.lower.clone(), Bound::Included),
        upper: range.upper.clone(),
    }
}
