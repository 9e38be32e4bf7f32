use proptest::prelude::*;
use wire::{
    decode_payload, encode_payload, FieldValue, Limits, PayloadHeader, Record, SyncContext,
};

fn value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        any::<bool>().prop_map(FieldValue::Bool),
        any::<i8>().prop_map(FieldValue::I8),
        any::<i16>().prop_map(FieldValue::I16),
        any::<i64>().prop_map(FieldValue::I64),
        any::<u16>().prop_map(FieldValue::U16),
        any::<u64>().prop_map(FieldValue::U64),
        (-1.0e6f32..1.0e6).prop_map(FieldValue::F32),
        "[a-z ]{0,12}".prop_map(FieldValue::Str),
        prop::collection::vec(any::<u8>(), 0..12).prop_map(FieldValue::Bytes),
        prop::array::uniform3(-100.0f32..100.0).prop_map(FieldValue::Vec3),
    ]
}

fn records_strategy() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(("[a-z_]{1,10}", value_strategy(), 0u8..4), 0..32).prop_map(|items| {
        let mut records = Vec::new();
        let mut depth = 0usize;
        for (name, value, action) in items {
            match action {
                0 if depth < 4 => {
                    depth += 1;
                    records.push(Record::GroupBegin { name });
                }
                1 if depth > 0 => {
                    depth -= 1;
                    records.push(Record::GroupEnd);
                }
                _ => records.push(Record::Field { name, value }),
            }
        }
        records.extend(std::iter::repeat(Record::GroupEnd).take(depth));
        records
    })
}

proptest! {
    #[test]
    fn prop_payload_roundtrip(records in records_strategy()) {
        let header = PayloadHeader::new(SyncContext::Network);
        let bytes = encode_payload(&header, &records).unwrap();
        let payload = decode_payload(&bytes, &Limits::default()).unwrap();
        prop_assert_eq!(payload.header, header);
        prop_assert_eq!(payload.records, records);
    }

    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_payload(&bytes, &Limits::for_testing());
    }
}
