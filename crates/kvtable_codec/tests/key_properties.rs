//! Property tests for the composite key layout.

use kvtable_codec::{decode, KeyCodec, MAX_INTEGER_KEY};
use kvtable_engine::Key;
use proptest::prelude::*;

fn table_name() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_ .!~-]{1,12}").expect("Invalid regex")
}

fn key() -> impl Strategy<Value = Key> {
    prop_oneof![
        (0..=MAX_INTEGER_KEY).prop_map(Key::Integer),
        prop::string::string_regex("[ -~]{0,16}")
            .expect("Invalid regex")
            .prop_map(Key::Text),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn decode_inverts_encode(table in table_name(), k in key()) {
        let codec = KeyCodec::new(table.clone()).unwrap();
        let encoded = codec.encode(&k).unwrap();
        prop_assert_eq!(decode(&encoded).unwrap(), (table, k));
    }

    #[test]
    fn encoding_preserves_order(table in table_name(), a in key(), b in key()) {
        let codec = KeyCodec::new(table).unwrap();
        let ea = codec.encode(&a).unwrap();
        let eb = codec.encode(&b).unwrap();
        prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
    }

    #[test]
    fn tables_never_overlap(t1 in table_name(), t2 in table_name(), k in key()) {
        prop_assume!(t1 != t2);
        let one = KeyCodec::new(t1).unwrap();
        let two = KeyCodec::new(t2).unwrap();
        let encoded = one.encode(&k).unwrap();
        prop_assert!(!two.table_range().contains(&encoded));
        prop_assert_ne!(&encoded, &two.before_first());
        prop_assert_ne!(&encoded, &two.after_last());
    }
}
