//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data that stays inside
//! the domains kvtable accepts.

use kvtable_core::{Row, Value, MAX_INTEGER_KEY};
use kvtable_engine::Key;
use proptest::prelude::*;

/// Strategy for generating valid table names.
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating integer keys across the whole supported range.
pub fn integer_key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        0u64..1_000,
        0u64..=MAX_INTEGER_KEY,
        Just(MAX_INTEGER_KEY),
    ]
    .prop_map(Key::Integer)
}

/// Strategy for generating string keys, including the empty string and
/// non-ASCII text.
pub fn text_key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        prop::string::string_regex("[a-z0-9_^-]{0,12}").expect("Invalid regex"),
        any::<String>(),
    ]
    .prop_map(Key::Text)
}

/// Strategy for generating any valid key.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![integer_key_strategy(), text_key_strategy()]
}

/// Strategy for generating field values, nested up to three levels.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[a-z ]{0,16}".prop_map(Value::Text),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for generating a row whose `key_column` holds a valid key.
pub fn row_strategy(key_column: &'static str) -> impl Strategy<Value = Row> {
    (
        key_strategy(),
        prop::collection::btree_map("[a-z]{1,8}", value_strategy(), 0..5),
    )
        .prop_map(move |(key, fields)| {
            let mut row = Row::from(fields);
            row.insert(key_column, key_value(&key));
            row
        })
}

/// The row value that stores `key`.
pub fn key_value(key: &Key) -> Value {
    match key {
        Key::Integer(n) => Value::Integer(i64::try_from(*n).unwrap_or(i64::MAX)),
        Key::Text(s) => Value::Text(s.clone()),
    }
}

/// A table operation for sequence testing.
#[derive(Debug, Clone)]
pub enum TableOperation {
    /// Write rows with these keys
    Put {
        /// Keys of the rows
        keys: Vec<Key>,
    },
    /// Delete keys `>= from`
    DeleteSince {
        /// Lower bound
        from: Key,
    },
    /// Delete keys `<= to`
    DeleteUntil {
        /// Upper bound
        to: Key,
    },
    /// Delete keys in `[from, to]`
    DeleteBetween {
        /// Lower bound
        from: Key,
        /// Upper bound
        to: Key,
    },
    /// Delete every row
    Clear,
    /// Read the last rows
    GetUntilLast {
        /// Row limit
        limit: u32,
    },
}

/// Strategy for generating a table operation.
pub fn table_operation_strategy() -> impl Strategy<Value = TableOperation> {
    prop_oneof![
        4 => prop::collection::vec(key_strategy(), 1..10)
            .prop_map(|keys| TableOperation::Put { keys }),
        1 => key_strategy().prop_map(|from| TableOperation::DeleteSince { from }),
        1 => key_strategy().prop_map(|to| TableOperation::DeleteUntil { to }),
        1 => (key_strategy(), key_strategy())
            .prop_map(|(from, to)| TableOperation::DeleteBetween { from, to }),
        1 => Just(TableOperation::Clear),
        2 => (0u32..20).prop_map(|limit| TableOperation::GetUntilLast { limit }),
    ]
}

/// Strategy for generating a sequence of table operations.
pub fn operation_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<TableOperation>> {
    prop::collection::vec(table_operation_strategy(), 1..=max_len)
}
