//! Absorption fuzz target: feed arbitrary bytes to an int, an encoded string and a bit field.
//! Absorption must not panic; it returns the consumed span or a ValueError, and a failed
//! attempt leaves the value as it was.
//! Build with: cargo fuzz run absorb_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
use protoval::{
    int::UINT16_BE, try_absorb, Absorb, AbsorbConstraints, BitField, BitFieldConfig, EncoderSpec, IntConfig,
    IntValue, StringConfig, StringValue, SubfieldSpec,
};

#[cfg(fuzzing)]
fn check<V: Absorb>(mut value: V, data: &[u8]) {
    let constraints = if data.first().map_or(false, |b| b & 1 == 1) {
        AbsorbConstraints::full()
    } else {
        AbsorbConstraints::none().with_size(true)
    };
    let before = value.stage();
    match try_absorb(&mut value, data, 0, &constraints, None) {
        Ok((done, snap)) => {
            assert!(done.end() <= data.len());
            value.revert(snap);
            assert!(value.stage() == before);
        }
        Err(_) => assert!(value.stage() == before),
    }
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    if let Ok(v) = IntValue::new(
        UINT16_BE,
        IntConfig {
            min: Some(10),
            max: Some(5000),
            ..IntConfig::default()
        },
    ) {
        check(v, data);
    }
    for encoder in [EncoderSpec::Base64, EncoderSpec::Gsm7Bit, EncoderSpec::Hex] {
        if let Ok(s) = StringValue::new(StringConfig {
            alphabet: Some("abcdef0123".into()),
            min_size: Some(1),
            max_size: Some(16),
            encoder: Some(encoder),
            ..StringConfig::default()
        }) {
            check(s, data);
        }
    }
    if let Ok(bf) = BitField::new(BitFieldConfig {
        sizes: Some(vec![3, 5, 7]),
        subfields: vec![SubfieldSpec::values([1, 4]), SubfieldSpec::range(0, 20), SubfieldSpec::default()],
        ..BitFieldConfig::default()
    }) {
        check(bf, data);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run absorb_fuzz");
}
