#![no_main]
use libfuzzer_sys::fuzz_target;

use bsonschema::{BsonType, ObjectId, Timestamp, Value};

fuzz_target!(|input: (BsonType, ObjectId, Timestamp, i32, i64, f64)| {
    let (bson_type, id, timestamp, int, long, double) = input;

    let values = [
        Value::ObjectId(id),
        Value::Timestamp(timestamp),
        Value::Int32(int),
        Value::Int64(long),
        Value::Double(double),
    ];

    let reparsed: BsonType = bson_type.as_str().parse().unwrap();
    assert_eq!(bson_type, reparsed);

    for value in &values {
        assert_eq!(BsonType::Int.matches(value), BsonType::Long.matches(value));
        assert_eq!(BsonType::Number.matches(value), value.is_number());

        // Every value has exactly one concrete type besides the int/long
        // aliases and the number union.
        let concrete = [
            BsonType::ObjectId,
            BsonType::Double,
            BsonType::Int,
            BsonType::Decimal,
            BsonType::Timestamp,
        ];
        assert_eq!(1, concrete.iter().filter(|t| t.matches(value)).count());
    }
});
