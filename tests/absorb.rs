//! Absorption transactions: stage, attempt, revert and cleanup across every value family.

use protoval::int::UINT8;
use protoval::{
    try_absorb, Absorb, AbsorbConstraints, AnyValue, BitField, BitFieldConfig, IntConfig, IntValue,
    StringConfig, StringValue, SubfieldSpec, TypedValue,
};

fn int_list() -> IntValue {
    IntValue::new(
        UINT8,
        IntConfig {
            values: Some(vec![1, 2, 3]),
            ..IntConfig::default()
        },
    )
    .expect("int")
}

fn bitfield() -> BitField {
    BitField::new(BitFieldConfig {
        sizes: Some(vec![4, 4]),
        subfields: vec![SubfieldSpec::values([1, 2]), SubfieldSpec::values([3])],
        ..BitFieldConfig::default()
    })
    .expect("bit field")
}

/// Absorb `blob` optimistically (contents unchecked, so the value mutates), abandon the
/// alternative and check that nothing observable changed.
fn assert_revert_is_exact<V: Absorb>(mut value: V, blob: &[u8]) {
    value.draw();
    let bytes_before = value.current_bytes();
    let exhausted_before = value.is_exhausted();
    let reference = value.stage();

    let snap = value.stage();
    value
        .attempt(&snap, blob, 0, &AbsorbConstraints::none(), None)
        .expect("optimistic absorb");
    assert_ne!(value.stage(), reference, "absorption should have changed the state");
    value.revert(snap);

    assert_eq!(value.stage(), reference);
    assert_eq!(value.current_bytes(), bytes_before);
    assert_eq!(value.is_exhausted(), exhausted_before);
    value.cleanup(reference);
}

#[test]
fn test_revert_restores_int() {
    assert_revert_is_exact(int_list(), &[0x09]);
}

#[test]
fn test_revert_restores_string() {
    let s = StringValue::new(StringConfig::with_values(["alpha", "beta"])).expect("string");
    assert_revert_is_exact(s, b"gamma");
}

#[test]
fn test_revert_restores_bitfield() {
    assert_revert_is_exact(bitfield(), &[0x57]);
}

#[test]
fn test_revert_restores_any_value() {
    assert_revert_is_exact(AnyValue::from(int_list()), &[0x09]);
    assert_revert_is_exact(AnyValue::from(bitfield()), &[0x57]);
}

#[test]
#[should_panic(expected = "snapshot taken from another variant")]
fn test_any_value_rejects_foreign_snapshot() {
    let int = AnyValue::from(int_list());
    let mut bf = AnyValue::from(bitfield());
    let snap = int.stage();
    let _ = bf.attempt(&snap, &[0x57], 0, &AbsorbConstraints::none(), None);
}

#[test]
fn test_failed_attempt_leaves_state_untouched() {
    let mut v = int_list();
    v.draw();
    let reference = v.stage();
    let err = try_absorb(&mut v, &[0x09], 0, &AbsorbConstraints::full(), None).unwrap_err();
    assert!(err.is_content_mismatch());
    assert_eq!(v.stage(), reference);
    v.cleanup(reference);
}

#[test]
fn test_cleanup_keeps_absorbed_value() {
    let mut v = int_list();
    let (done, snap) = try_absorb(&mut v, &[0x00, 0x03], 1, &AbsorbConstraints::full(), None).expect("absorb");
    v.cleanup(snap);
    assert_eq!(done.offset, 1);
    assert_eq!(done.end(), 2);
    assert_eq!(v.current_int(), 3);
}

#[test]
fn test_alternatives_at_the_same_offset() {
    // A grammar trying an int then a string at offset 0; the int alternative is dropped.
    let blob = b"\x02tail";
    let mut number = int_list();
    let mut text = StringValue::new(StringConfig::with_values(["tail"])).expect("string");

    let (first, number_snap) =
        try_absorb(&mut number, blob, 0, &AbsorbConstraints::full(), None).expect("int alternative");
    assert_eq!(first.size, 1);
    let second = try_absorb(&mut text, blob, first.end() + 1, &AbsorbConstraints::full(), None);
    assert!(second.is_err());
    number.revert(number_snap);
    assert_eq!(number.current_int(), 1);

    let (done, text_snap) =
        try_absorb(&mut text, blob, 1, &AbsorbConstraints::full(), None).expect("string alternative");
    text.cleanup(text_snap);
    assert_eq!(done.bytes, b"tail".to_vec());
}

#[test]
fn test_any_value_absorbs_through_its_variant() {
    let mut v = AnyValue::from(bitfield());
    let (done, snap) = try_absorb(&mut v, &[0x32], 0, &AbsorbConstraints::full(), None).expect("absorb");
    v.cleanup(snap);
    assert_eq!(done.size, 1);
    let bf = v.as_bitfield().expect("bit field variant");
    assert_eq!(bf.subfield_values(), vec![2, 3]);
    assert_eq!(v.logical_bytes(), vec![0x32]);
}

#[test]
fn test_constraint_presets() {
    let full = AbsorbConstraints::default();
    assert!(full.contents && full.size && full.regexp && full.structure);
    let none = AbsorbConstraints::none().with_size(true);
    assert!(!none.contents && none.size && !none.regexp && !none.structure);
}
