//! Composite keys for tables sharing one physical container.
//!
//! A table `T` owns the keyspace between two sentinels:
//!
//! ```text
//! T^0              before-first sentinel
//! T^1^n000000042   integer key 42
//! T^1^sabc         string key "abc"
//! T^2              after-last sentinel
//! ```
//!
//! Table names never contain `^`, so two tables sharing a container occupy
//! disjoint intervals. Integer payloads are zero-padded to nine digits and
//! tagged `n`, string payloads are tagged `s`; this keeps the native key
//! order (every integer before every string, integers numerically).

use crate::error::{CodecError, CodecResult};
use kvtable_engine::{Key, KeyRange};

/// Separator between the table name, marker and payload.
pub const SEPARATOR: char = '^';

/// Largest integer key that can be stored.
pub const MAX_INTEGER_KEY: u64 = 999_999_999;

const INTEGER_WIDTH: usize = 9;
const BEFORE_FIRST: char = '0';
const DATA: char = '1';
const AFTER_LAST: char = '2';
const INTEGER_TAG: char = 'n';
const TEXT_TAG: char = 's';

/// Checks that `name` can be used as a table name.
///
/// # Errors
///
/// Fails for an empty name or one containing [`SEPARATOR`].
pub fn validate_table_name(name: &str) -> CodecResult<()> {
    if name.is_empty() {
        return Err(CodecError::InvalidTableName {
            name: name.to_owned(),
            reason: "name is empty",
        });
    }
    if name.contains(SEPARATOR) {
        return Err(CodecError::InvalidTableName {
            name: name.to_owned(),
            reason: "name contains the reserved '^' separator",
        });
    }
    Ok(())
}

pub(crate) fn check_integer_key(n: u64) -> CodecResult<()> {
    if n > MAX_INTEGER_KEY {
        return Err(CodecError::invalid_key(format!(
            "integer key {n} exceeds the maximum of {MAX_INTEGER_KEY}"
        )));
    }
    Ok(())
}

/// Checks that `key` lies inside the supported key domain.
///
/// # Errors
///
/// Fails for integer keys above [`MAX_INTEGER_KEY`].
pub fn validate_key(key: &Key) -> CodecResult<()> {
    match key {
        Key::Integer(n) => check_integer_key(*n),
        Key::Text(_) => Ok(()),
    }
}

/// Builds and parses the composite keys of one table.
///
/// # Example
///
/// ```
/// use kvtable_codec::KeyCodec;
/// use kvtable_engine::Key;
///
/// let codec = KeyCodec::new("events").unwrap();
/// let encoded = codec.encode(&Key::Integer(42)).unwrap();
/// assert_eq!(encoded, Key::from("events^1^n000000042"));
/// assert!(codec.before_first() < encoded && encoded < codec.after_last());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    table: String,
}

impl KeyCodec {
    /// Creates the codec for `table`.
    ///
    /// # Errors
    ///
    /// Fails if the table name is invalid.
    pub fn new(table: impl Into<String>) -> CodecResult<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { table })
    }

    /// The table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Encodes a data key.
    ///
    /// # Errors
    ///
    /// Fails for integer keys above [`MAX_INTEGER_KEY`].
    pub fn encode(&self, key: &Key) -> CodecResult<Key> {
        let encoded = match key {
            Key::Integer(n) => {
                check_integer_key(*n)?;
                format!(
                    "{}{SEPARATOR}{DATA}{SEPARATOR}{INTEGER_TAG}{n:0width$}",
                    self.table,
                    width = INTEGER_WIDTH
                )
            }
            Key::Text(s) => format!("{}{SEPARATOR}{DATA}{SEPARATOR}{TEXT_TAG}{s}", self.table),
        };
        Ok(Key::Text(encoded))
    }

    /// The sentinel sorting before every row of the table.
    pub fn before_first(&self) -> Key {
        Key::Text(format!("{}{SEPARATOR}{BEFORE_FIRST}", self.table))
    }

    /// The sentinel sorting after every row of the table.
    pub fn after_last(&self) -> Key {
        Key::Text(format!("{}{SEPARATOR}{AFTER_LAST}", self.table))
    }

    /// The open interval between the two sentinels: every row of the table.
    pub fn table_range(&self) -> KeyRange {
        KeyRange::bound(self.before_first(), self.after_last(), true, true)
    }
}

/// Splits a composite data key into its table name and logical key.
///
/// # Errors
///
/// Fails for sentinels, integer engine keys and anything else that was not
/// produced by [`KeyCodec::encode`].
pub fn decode(encoded: &Key) -> CodecResult<(String, Key)> {
    let raw = encoded
        .as_text()
        .ok_or_else(|| CodecError::malformed(encoded.to_string()))?;
    let malformed = || CodecError::malformed(raw);

    let (table, rest) = raw.split_once(SEPARATOR).ok_or_else(malformed)?;
    validate_table_name(table).map_err(|_| malformed())?;

    let mut marker = rest.chars();
    if marker.next() != Some(DATA) || marker.next() != Some(SEPARATOR) {
        return Err(malformed());
    }
    let payload = marker.as_str();
    let mut tagged = payload.chars();
    let key = match tagged.next() {
        Some(INTEGER_TAG) => {
            let digits = tagged.as_str();
            if digits.len() != INTEGER_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            Key::Integer(digits.parse().map_err(|_| malformed())?)
        }
        Some(TEXT_TAG) => Key::Text(tagged.as_str().to_owned()),
        _ => return Err(malformed()),
    };
    Ok((table.to_owned(), key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_bracket_rows() {
        let codec = KeyCodec::new("t").unwrap();
        assert_eq!(codec.before_first(), Key::from("t^0"));
        assert_eq!(codec.after_last(), Key::from("t^2"));
        let range = codec.table_range();
        assert!(range.contains(&codec.encode(&Key::Integer(0)).unwrap()));
        assert!(range.contains(&codec.encode(&Key::from("")).unwrap()));
        assert!(range.contains(&codec.encode(&Key::from("~~~~")).unwrap()));
        assert!(!range.contains(&codec.before_first()));
        assert!(!range.contains(&codec.after_last()));
    }

    #[test]
    fn padding_keeps_numeric_order() {
        let codec = KeyCodec::new("t").unwrap();
        let nine = codec.encode(&Key::Integer(9)).unwrap();
        let ten = codec.encode(&Key::Integer(10)).unwrap();
        let max = codec.encode(&Key::Integer(MAX_INTEGER_KEY)).unwrap();
        assert!(nine < ten && ten < max);
        assert!(max < codec.encode(&Key::from("0")).unwrap());
    }

    #[test]
    fn oversized_integer_rejected() {
        let codec = KeyCodec::new("t").unwrap();
        let err = codec.encode(&Key::Integer(MAX_INTEGER_KEY + 1)).unwrap_err();
        assert!(matches!(err, CodecError::InvalidKey { .. }));
    }

    #[test]
    fn table_names_validated() {
        assert!(KeyCodec::new("").is_err());
        assert!(KeyCodec::new("a^b").is_err());
        assert!(KeyCodec::new("with space & symbols!").is_ok());
    }

    #[test]
    fn decode_examples() {
        assert_eq!(
            decode(&Key::from("users^1^n000000042")).unwrap(),
            ("users".to_string(), Key::Integer(42))
        );
        assert_eq!(
            decode(&Key::from("users^1^sa^b")).unwrap(),
            ("users".to_string(), Key::from("a^b"))
        );
        for bad in ["users^0", "users^2", "users", "users^1^x1", "users^1^n42", "^1^s"] {
            assert!(decode(&Key::from(bad)).is_err(), "{bad}");
        }
        assert!(decode(&Key::Integer(1)).is_err());
    }
}
