//! Integer values: enumeration order, encodings, fuzz space and absorption.

use protoval::int::{IntKind, SINT16_LE, SINT8, UINT16_BE, UINT32_BE, UINT8};
use protoval::{
    try_absorb, Absorb, AbsorbConstraints, IntConfig, IntSpace, IntValue, Mode, RawValue, TextFormat,
    TypedValue, ValueError,
};

fn list(kind: IntKind, values: &[i128]) -> IntValue {
    IntValue::new(
        kind,
        IntConfig {
            values: Some(values.to_vec()),
            ..IntConfig::default()
        },
    )
    .expect("int list")
}

fn range(kind: IntKind, min: i128, max: i128) -> IntValue {
    IntValue::new(
        kind,
        IntConfig {
            min: Some(min),
            max: Some(max),
            ..IntConfig::default()
        },
    )
    .expect("int range")
}

#[test]
fn test_list_draws_in_order_then_exhausts() {
    let mut v = list(UINT16_BE, &[0x0102, 7, 300]);
    assert_eq!(v.draw(), vec![0x01, 0x02]);
    assert!(!v.is_exhausted());
    assert_eq!(v.draw(), vec![0x00, 0x07]);
    assert_eq!(v.draw(), vec![0x01, 0x2C]);
    assert!(v.is_exhausted());
    assert_eq!(v.draw(), vec![0x01, 0x02]);
    assert!(!v.is_exhausted());
}

#[test]
fn test_range_visits_every_value_once() {
    let mut v = range(UINT8, 3, 9);
    let drawn: Vec<i128> = (0..7).map(|_| v.draw_int()).collect();
    assert_eq!(drawn, vec![3, 4, 5, 6, 7, 8, 9]);
    assert!(v.is_exhausted());
}

#[test]
fn test_random_round_covers_space_without_repeats() {
    let mut v = IntValue::new(
        UINT8,
        IntConfig {
            min: Some(0),
            max: Some(99),
            mode: Mode::Random,
            seed: Some(42),
            ..IntConfig::default()
        },
    )
    .expect("random int");
    let mut drawn: Vec<i128> = Vec::new();
    for i in 0..100 {
        assert!(!v.is_exhausted(), "exhausted early at draw {}", i);
        drawn.push(v.draw_int());
    }
    assert!(v.is_exhausted());
    drawn.sort_unstable();
    assert_eq!(drawn, (0..100).collect::<Vec<i128>>());
}

#[test]
fn test_same_seed_same_sequence() {
    let config = IntConfig {
        min: Some(0),
        max: Some(1000),
        mode: Mode::Random,
        seed: Some(9),
        ..IntConfig::default()
    };
    let mut a = IntValue::new(UINT16_BE, config.clone()).expect("a");
    let mut b = IntValue::new(UINT16_BE, config).expect("b");
    for _ in 0..50 {
        assert_eq!(a.draw(), b.draw());
    }
}

#[test]
fn test_default_is_drawn_first() {
    let mut r = IntValue::new(
        UINT8,
        IntConfig {
            min: Some(10),
            max: Some(20),
            default: Some(15),
            ..IntConfig::default()
        },
    )
    .expect("range with default");
    assert_eq!(r.current_int(), 15);
    assert_eq!(r.draw_int(), 15);
    assert_eq!(r.draw_int(), 16);

    let mut l = IntValue::new(
        UINT8,
        IntConfig {
            values: Some(vec![1, 2, 3]),
            default: Some(3),
            ..IntConfig::default()
        },
    )
    .expect("list with default");
    assert_eq!(l.draw_int(), 3);
    assert_eq!(l.draw_int(), 1);
}

#[test]
fn test_rewind_restores_value_and_exhaustion() {
    let mut v = list(UINT8, &[1, 2]);
    assert!(!v.rewind(), "nothing to rewind before a draw");
    assert_eq!(v.current_raw_value(), RawValue::Int(1));

    v.draw();
    let before = (v.current_raw_value(), v.is_exhausted());
    v.draw();
    assert!(v.is_exhausted());
    assert!(v.rewind());
    assert_eq!((v.current_raw_value(), v.is_exhausted()), before);
    assert!(!v.rewind(), "only one level of history");
}

#[test]
fn test_reset_state_restarts_enumeration() {
    let mut v = list(UINT8, &[4, 5, 6]);
    v.draw();
    v.draw();
    v.reset_state();
    assert_eq!(v.draw_int(), 4);
}

#[test]
fn test_signed_and_little_endian_encodings() {
    assert_eq!(list(SINT16_LE, &[-2]).draw(), vec![0xFE, 0xFF]);
    assert_eq!(list(SINT8, &[-128]).draw(), vec![0x80]);
    assert_eq!(list(UINT32_BE, &[0xDEADBEEF]).draw(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn test_config_errors() {
    let both = IntValue::new(
        UINT8,
        IntConfig {
            values: Some(vec![1]),
            min: Some(0),
            ..IntConfig::default()
        },
    );
    assert!(matches!(both, Err(ValueError::Config(_))));

    let inverted = IntValue::new(
        UINT8,
        IntConfig {
            min: Some(5),
            max: Some(4),
            ..IntConfig::default()
        },
    );
    assert!(matches!(inverted, Err(ValueError::Config(_))));

    let too_wide = IntValue::new(
        UINT8,
        IntConfig {
            values: Some(vec![256]),
            ..IntConfig::default()
        },
    );
    assert!(matches!(too_wide, Err(ValueError::Config(_))));

    let stray_default = IntValue::new(
        UINT8,
        IntConfig {
            values: Some(vec![1, 2]),
            default: Some(3),
            ..IntConfig::default()
        },
    );
    assert!(matches!(stray_default, Err(ValueError::Config(_))));

    let empty = IntValue::new(
        UINT8,
        IntConfig {
            values: Some(vec![]),
            ..IntConfig::default()
        },
    );
    assert!(matches!(empty, Err(ValueError::Config(_))));
}

#[test]
fn test_fuzzy_presets() {
    let u = IntValue::fuzzy(UINT8, IntConfig::default()).expect("fuzzy uint8");
    assert_eq!(u.space(), &IntSpace::List(vec![255, 0, 1, 128, 127]));

    let s = IntValue::fuzzy(SINT8, IntConfig::default()).expect("fuzzy sint8");
    assert_eq!(s.space(), &IntSpace::List(vec![-1, 0, 1, -128, 127]));

    let bounded = IntValue::fuzzy(
        UINT8,
        IntConfig {
            min: Some(1),
            max: Some(200),
            ..IntConfig::default()
        },
    )
    .expect("bounded fuzzy");
    assert_eq!(bounded.space(), &IntSpace::List(vec![1, 128, 127]));
}

#[test]
fn test_switch_mode_builds_fuzz_space() {
    let mut v = list(UINT8, &[10, 20]);
    assert!(v.switch_mode());
    assert!(v.fuzz_mode());
    assert_eq!(
        v.fuzz_space(),
        Some(&IntSpace::List(vec![11, 9, 19, 21, 0, 255, 127, 128, 138]))
    );
    let mut seen = Vec::new();
    while !v.is_exhausted() {
        seen.push(v.draw_int());
    }
    assert_eq!(seen.len(), 9);
    assert!(!seen.contains(&10));

    assert!(!v.switch_mode());
    assert!(!v.fuzz_mode());
    assert_eq!(v.draw_int(), 10);
}

#[test]
fn test_text_integer_draw_and_absorb() {
    let mut v = IntValue::text(
        TextFormat::DECIMAL,
        IntConfig {
            values: Some(vec![42, -7]),
            ..IntConfig::default()
        },
    )
    .expect("text int");
    assert_eq!(v.draw(), b"42".to_vec());
    assert_eq!(v.draw(), b"-7".to_vec());

    let snap = v.stage();
    let done = v
        .attempt(&snap, b"1234xyz", 0, &AbsorbConstraints::full().with_contents(false), None)
        .expect("absorb digits");
    v.cleanup(snap);
    assert_eq!(done.size, 4);
    assert_eq!(v.current_int(), 1234);

    let bad_base = IntValue::text(
        TextFormat {
            base: 17,
            ..TextFormat::DECIMAL
        },
        IntConfig::default(),
    );
    assert!(matches!(bad_base, Err(ValueError::Config(_))));
}

#[test]
fn test_absorb_moves_value_to_front() {
    let mut v = list(UINT16_BE, &[1, 2, 3]);
    let (done, snap) =
        try_absorb(&mut v, &[0xAA, 0x00, 0x02], 1, &AbsorbConstraints::full(), None).expect("absorb");
    v.cleanup(snap);
    assert_eq!(done.offset, 1);
    assert_eq!(done.size, 2);
    assert_eq!(done.bytes, vec![0x00, 0x02]);
    assert_eq!(v.current_int(), 2);
    assert_eq!(v.space(), &IntSpace::List(vec![2, 1, 3]));
    assert_eq!(v.draw_int(), 1);
}

#[test]
fn test_absorb_content_mismatch_and_admission() {
    let mut v = list(UINT16_BE, &[1, 2, 3]);
    let err = try_absorb(&mut v, &[0x00, 0x09], 0, &AbsorbConstraints::full(), None).unwrap_err();
    assert!(err.is_content_mismatch());
    assert!(err.is_recoverable());
    assert_eq!(v.space(), &IntSpace::List(vec![1, 2, 3]));

    let (_, snap) = try_absorb(&mut v, &[0x00, 0x09], 0, &AbsorbConstraints::none(), None)
        .expect("absorb without contents");
    v.cleanup(snap);
    assert_eq!(v.space(), &IntSpace::List(vec![9, 1, 2, 3]));
    assert_eq!(v.draw_int(), 1);

    let mut r = range(UINT8, 10, 20);
    let (_, snap) = try_absorb(&mut r, &[0x05], 0, &AbsorbConstraints::none(), None).expect("widen");
    r.cleanup(snap);
    assert_eq!(r.space(), &IntSpace::Range { min: 5, max: 20 });
    assert_eq!(r.current_int(), 5);
    assert_eq!(r.draw_int(), 6);
}

#[test]
fn test_absorb_short_buffer_is_insufficient() {
    let mut v = range(UINT32_BE, 0, 10);
    let err = try_absorb(&mut v, &[0x00, 0x01], 0, &AbsorbConstraints::full(), None).unwrap_err();
    assert!(err.is_insufficient());
    assert_eq!(
        err,
        ValueError::Insufficient {
            needed: 4,
            available: 2
        }
    );
}

#[test]
fn test_text_absorb_offset_past_end_is_insufficient() {
    let mut v = IntValue::text(TextFormat::DECIMAL, IntConfig::default()).expect("text int");
    let err = try_absorb(&mut v, b"12", 5, &AbsorbConstraints::full(), Some(0)).unwrap_err();
    assert!(err.is_insufficient());
    let err = try_absorb(&mut v, b"12", 5, &AbsorbConstraints::full(), None).unwrap_err();
    assert!(err.is_insufficient());
}

#[test]
fn test_widening_absorb_keeps_default_first() {
    let mut v = IntValue::new(
        UINT8,
        IntConfig {
            min: Some(10),
            max: Some(20),
            default: Some(15),
            ..IntConfig::default()
        },
    )
    .expect("range with default");
    assert_eq!(v.draw_int(), 15);
    let (_, snap) = try_absorb(&mut v, &[3], 0, &AbsorbConstraints::none(), None).expect("widen");
    v.cleanup(snap);
    assert_eq!(v.space(), &IntSpace::Range { min: 3, max: 20 });
    assert_eq!(v.current_int(), 3);
    assert_eq!(v.draw_int(), 4);

    v.reset_state();
    assert_eq!(v.draw_int(), 15);
}

#[test]
fn test_random_absorb_starts_a_full_round() {
    let mut v = IntValue::new(
        UINT8,
        IntConfig {
            min: Some(0),
            max: Some(9),
            mode: Mode::Random,
            seed: Some(4),
            ..IntConfig::default()
        },
    )
    .expect("random int");
    v.draw();
    let (_, snap) = try_absorb(&mut v, &[5], 0, &AbsorbConstraints::full(), None).expect("absorb");
    v.cleanup(snap);
    assert_eq!(v.current_int(), 5);

    let mut drawn: Vec<i128> = Vec::new();
    for i in 0..10 {
        assert!(!v.is_exhausted(), "exhausted early at draw {}", i);
        drawn.push(v.draw_int());
    }
    assert!(v.is_exhausted());
    drawn.sort_unstable();
    assert_eq!(drawn, (0..10).collect::<Vec<i128>>());
}

#[test]
fn test_registry_and_pretty_print() {
    let kind = IntKind::by_name("SINT16_le").expect("kind");
    assert_eq!(kind, SINT16_LE);
    assert_eq!((kind.min(), kind.max()), (-32768, 32767));

    let v = list(UINT16_BE, &[258]);
    let s = v.pretty_print(None);
    assert!(s.contains("258"), "{}", s);
    assert!(s.contains("0102"), "{}", s);
    assert!(v.pretty_print(Some(6)).chars().count() <= 6);
}

#[test]
fn test_config_from_json() {
    let config: IntConfig =
        serde_json::from_str(r#"{"values": [5, 6], "mode": "Random", "seed": 7}"#).expect("json");
    assert_eq!(config.mode, Mode::Random);
    let mut v = IntValue::new(UINT8, config).expect("from json");
    let mut drawn = vec![v.draw_int(), v.draw_int()];
    drawn.sort_unstable();
    assert_eq!(drawn, vec![5, 6]);
    assert!(v.is_exhausted());
}
