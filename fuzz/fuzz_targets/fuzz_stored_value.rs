#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use radiant_core::{Value, ValueType};

#[derive(Arbitrary, Debug)]
enum FuzzType {
    Any,
    Number,
    Boolean,
    Text,
    Range { lo: i16, span: u16, integer: bool },
    Enum(Vec<String>),
}

impl FuzzType {
    fn to_value_type(&self) -> ValueType {
        match self {
            FuzzType::Any => ValueType::Any,
            FuzzType::Number => ValueType::Number,
            FuzzType::Boolean => ValueType::Boolean,
            FuzzType::Text => ValueType::Text,
            FuzzType::Range { lo, span, integer } => ValueType::Range {
                min: f64::from(*lo),
                max: f64::from(*lo) + f64::from(*span),
                integer: *integer,
            },
            FuzzType::Enum(members) => ValueType::Enum(members.clone()),
        }
    }
}

fn same_stored(a: &Value, b: &Value) -> bool {
    // Negative zero is stored as "0".
    a.same_value(b) || matches!((a, b), (Value::Number(x), Value::Number(y)) if *x == 0.0 && *y == 0.0)
}

fuzz_target!(|input: (FuzzType, String)| {
    let (ty, text) = input;
    let value_type = ty.to_value_type();
    let Some(parsed) = value_type.parse_stored(&text) else {
        return;
    };
    assert!(value_type.check(&parsed));
    let stored = value_type
        .format_stored(&parsed)
        .expect("parsed values are storable");
    let reparsed = value_type
        .parse_stored(&stored)
        .expect("stored form parses back");
    assert!(same_stored(&parsed, &reparsed), "{parsed:?} -> {stored:?} -> {reparsed:?}");
});
