//! String values: candidates, alphabets, charsets, encoders, fuzz cases and absorption.

use protoval::{
    try_absorb, Absorb, AbsorbConstraints, Charset, EncoderSpec, Mode, StringConfig, StringValue,
    TypedValue, ValueError,
};

fn strings(values: &[&str]) -> StringValue {
    StringValue::new(StringConfig::with_values(values.iter().copied())).expect("string values")
}

#[test]
fn test_values_draw_in_order() {
    let mut s = strings(&["abc", "de"]);
    assert_eq!(s.current_logical(), b"abc".to_vec());
    assert_eq!(s.draw(), b"abc".to_vec());
    assert_eq!(s.draw(), b"de".to_vec());
    assert!(s.is_exhausted());
    let b = s.bounds();
    assert_eq!((b.min, b.max), (2, 3));
}

#[test]
fn test_generated_values_respect_alphabet() {
    let mut s = StringValue::new(StringConfig {
        alphabet: Some("AB".into()),
        min_size: Some(2),
        max_size: Some(6),
        seed: Some(3),
        ..StringConfig::default()
    })
    .expect("alphabet string");
    assert_eq!(s.values()[0].len(), 6);
    assert_eq!(s.values()[1].len(), 2);
    let n = s.values().len();
    assert!((2..=5).contains(&n));
    for _ in 0..n {
        let v = s.draw();
        assert!(v.iter().all(|c| *c == b'A' || *c == b'B'), "{:?}", v);
        assert!((2..=6).contains(&v.len()));
    }
    assert!(s.is_exhausted());
}

#[test]
fn test_alphabet_rejection_reports_valid_prefix() {
    let mut s = StringValue::new(StringConfig {
        alphabet: Some("abc".into()),
        size: Some(6),
        seed: Some(1),
        ..StringConfig::default()
    })
    .expect("alphabet string");

    let err = try_absorb(&mut s, b"abcxab", 0, &AbsorbConstraints::full(), None).unwrap_err();
    match err {
        ValueError::ContentMismatch { valid_prefix, .. } => assert_eq!(valid_prefix, 3),
        other => panic!("unexpected {:?}", other),
    }

    let err = try_absorb(&mut s, b"abxabc", 0, &AbsorbConstraints::full(), Some(6)).unwrap_err();
    match err {
        ValueError::ContentMismatch { valid_prefix, .. } => assert_eq!(valid_prefix, 2),
        other => panic!("unexpected {:?}", other),
    }

    let (done, snap) = try_absorb(&mut s, b"cabbac!", 0, &AbsorbConstraints::full(), None).expect("valid run");
    s.cleanup(snap);
    assert_eq!(done.size, 6);
    assert_eq!(s.current_logical(), b"cabbac".to_vec());
}

#[test]
fn test_absorb_longest_candidate_prefix() {
    let mut s = strings(&["ab", "abcd"]);
    let (done, snap) = try_absorb(&mut s, b"abcdz", 0, &AbsorbConstraints::full(), None).expect("absorb");
    s.cleanup(snap);
    assert_eq!(done.size, 4);
    assert_eq!(s.current_logical(), b"abcd".to_vec());
    assert_eq!(s.values()[0], b"abcd".to_vec());
    assert_eq!(s.draw(), b"ab".to_vec());
}

#[test]
fn test_absorb_searches_forward_without_structure_constraint() {
    let mut s = strings(&["foo", "bar"]);
    let err = try_absorb(&mut s, b"xxbarfoo", 0, &AbsorbConstraints::full(), None).unwrap_err();
    assert!(err.is_content_mismatch());

    let loose = AbsorbConstraints::full().with_structure(false);
    let (done, snap) = try_absorb(&mut s, b"xxbarfoo", 0, &loose, None).expect("search");
    s.cleanup(snap);
    assert_eq!(done.offset, 2);
    assert_eq!(done.size, 3);
    assert_eq!(done.bytes, b"bar".to_vec());
    assert_eq!(done.end(), 5);
}

#[test]
fn test_case_insensitive_absorb() {
    let mut s = StringValue::new(StringConfig {
        case_sensitive: false,
        ..StringConfig::with_values(["Hello"])
    })
    .expect("case insensitive");
    let (_, snap) = try_absorb(&mut s, b"HELLO world", 0, &AbsorbConstraints::full(), None).expect("absorb");
    s.cleanup(snap);
    assert_eq!(s.current_logical(), b"HELLO".to_vec());

    let mut strict = strings(&["Hello"]);
    assert!(try_absorb(&mut strict, b"HELLO", 0, &AbsorbConstraints::full(), None).is_err());
}

#[test]
fn test_absorb_regex_is_anchored() {
    let mut s = StringValue::new(StringConfig {
        max_size: Some(10),
        absorb_regex: Some("[0-9]+".into()),
        seed: Some(2),
        ..StringConfig::default()
    })
    .expect("regex string");
    let (done, snap) = try_absorb(&mut s, b"123abc", 0, &AbsorbConstraints::full(), None).expect("regex");
    s.cleanup(snap);
    assert_eq!(done.size, 3);
    assert!(try_absorb(&mut s, b"abc123", 0, &AbsorbConstraints::full(), None).is_err());

    let bad = StringValue::new(StringConfig {
        size: Some(3),
        absorb_regex: Some("(".into()),
        ..StringConfig::default()
    });
    assert!(matches!(bad, Err(ValueError::Config(_))));
}

#[test]
fn test_base64_encoder_draw_and_absorb() {
    let mut s = StringValue::new(StringConfig {
        encoder: Some(EncoderSpec::Base64),
        ..StringConfig::with_values(["hi", "yo"])
    })
    .expect("base64 string");
    assert_eq!(s.draw(), b"aGk=".to_vec());
    assert_eq!(s.current_logical(), b"hi".to_vec());

    let (done, snap) = try_absorb(&mut s, b"eW8=rest", 0, &AbsorbConstraints::full(), None).expect("absorb");
    s.cleanup(snap);
    assert_eq!(done.size, 4);
    assert_eq!(s.current_logical(), b"yo".to_vec());
    assert_eq!(s.current_bytes(), b"eW8=".to_vec());
}

#[test]
fn test_gsm7_packing() {
    let mut s = StringValue::new(StringConfig {
        encoder: Some(EncoderSpec::Gsm7Bit),
        ..StringConfig::with_values(["hellohello"])
    })
    .expect("gsm7 string");
    assert_eq!(hex::encode(s.draw()), "e8329bfd4697d9ec37");
}

#[test]
fn test_encoded_size_bounds() {
    let s = StringValue::new(StringConfig {
        encoder: Some(EncoderSpec::Hex),
        ..StringConfig::with_values(["a", "abc"])
    })
    .expect("hex string");
    let b = s.bounds();
    assert_eq!((b.min, b.max, b.min_encoded, b.max_encoded), (1, 3, 2, 6));

    let excluded = StringValue::new(StringConfig {
        encoder: Some(EncoderSpec::Hex),
        min_encoded_size: Some(4),
        ..StringConfig::with_values(["a", "abc"])
    });
    assert!(matches!(excluded, Err(ValueError::Config(_))));
}

#[test]
fn test_utf16_charset() {
    let mut s = StringValue::new(StringConfig {
        charset: Charset::Utf16Le,
        ..StringConfig::with_values(["hé"])
    })
    .expect("utf16 string");
    assert_eq!(s.draw(), vec![0x68, 0x00, 0xE9, 0x00]);
    assert_eq!(s.bounds().max, 2);
    assert_eq!(s.current_text().as_deref(), Some("hé"));
}

#[test]
fn test_config_errors() {
    let inverted = StringValue::new(StringConfig {
        min_size: Some(4),
        max_size: Some(2),
        ..StringConfig::default()
    });
    assert!(matches!(inverted, Err(ValueError::Config(_))));

    let outside = StringValue::new(StringConfig {
        alphabet: Some("ab".into()),
        ..StringConfig::with_values(["abc"])
    });
    assert!(matches!(outside, Err(ValueError::Config(_))));

    let ascii = StringValue::new(StringConfig {
        charset: Charset::Ascii,
        ..StringConfig::with_values(["é"])
    });
    assert!(matches!(ascii, Err(ValueError::Config(_))));

    let no_size = StringValue::new(StringConfig::default());
    assert!(matches!(no_size, Err(ValueError::Config(_))));

    let too_long = StringValue::new(StringConfig {
        max_size: Some(2),
        ..StringConfig::with_values(["abc"])
    });
    assert!(matches!(too_long, Err(ValueError::Config(_))));

    let not_digits = StringValue::new(StringConfig {
        encoder: Some(EncoderSpec::GsmPhoneNumber),
        ..StringConfig::with_values(["abc"])
    });
    assert!(matches!(not_digits, Err(ValueError::Config(_))));

    let not_septets = StringValue::new(StringConfig {
        encoder: Some(EncoderSpec::Gsm7Bit),
        ..StringConfig::with_values(["café"])
    });
    assert!(matches!(not_septets, Err(ValueError::Config(_))));

    let bad_default = StringValue::new(StringConfig {
        encoder: Some(EncoderSpec::GsmPhoneNumber),
        default: Some("12x".into()),
        ..StringConfig::with_values(["123"])
    });
    assert!(matches!(bad_default, Err(ValueError::Config(_))));
}

#[test]
fn test_random_absorb_starts_a_full_round() {
    let mut s = StringValue::new(StringConfig {
        mode: Mode::Random,
        seed: Some(3),
        ..StringConfig::with_values(["aa", "bb", "cc", "dd"])
    })
    .expect("random string");
    s.draw();
    let (_, snap) = try_absorb(&mut s, b"cc", 0, &AbsorbConstraints::full(), None).expect("absorb");
    s.cleanup(snap);
    assert_eq!(s.current_logical(), b"cc".to_vec());

    let mut drawn = Vec::new();
    for i in 0..4 {
        assert!(!s.is_exhausted(), "exhausted early at draw {}", i);
        drawn.push(s.draw());
    }
    assert!(s.is_exhausted());
    drawn.sort();
    assert_eq!(drawn, vec![b"aa".to_vec(), b"bb".to_vec(), b"cc".to_vec(), b"dd".to_vec()]);
}

#[test]
fn test_fuzz_cases() {
    let mut s = strings(&["abcd"]);
    assert!(s.switch_mode());
    let mut cases = Vec::new();
    while !s.is_exhausted() {
        cases.push(s.draw());
    }
    assert!(!cases.contains(&b"abcd".to_vec()));
    assert!(cases.contains(&b"`bcd".to_vec()), "bit flip");
    assert!(cases.contains(&b"abcdd".to_vec()), "one past max size");
    assert!(cases.contains(&Vec::new()), "empty");
    assert!(cases.contains(&b"abc".to_vec()), "below min size");
    assert!(cases.iter().any(|c| c.len() >= 32), "oversized");
    assert!(cases.contains(&vec![0u8; 4]), "nulls");
    assert!(cases.contains(&b"%s%s".to_vec()));
    assert!(cases.contains(&b"%n%n".to_vec()));
    assert!(cases.contains(&b"\r\n\r\n".to_vec()));

    assert!(!s.switch_mode());
    s.reset_state();
    assert_eq!(s.draw(), b"abcd".to_vec());
}

#[test]
fn test_encoder_malformed_cases_are_emitted_raw() {
    let mut s = StringValue::new(StringConfig {
        encoder: Some(EncoderSpec::Wrap {
            prefix: b"<".to_vec(),
            suffix: b">".to_vec(),
        }),
        ..StringConfig::with_values(["x"])
    })
    .expect("wrapped string");
    assert_eq!(s.draw(), b"<x>".to_vec());
    assert!(s.switch_mode());
    let mut cases = Vec::new();
    while !s.is_exhausted() {
        cases.push(s.draw());
    }
    assert!(cases.contains(&b"<x".to_vec()));
    assert!(cases.contains(&b"x>".to_vec()));
}

#[test]
fn test_rewind_and_clone_independence() {
    let mut s = strings(&["one", "two", "three"]);
    s.draw();
    let before = s.current_raw_value();
    let mut copy = s.clone();
    s.draw();
    assert!(s.rewind());
    assert_eq!(s.current_raw_value(), before);

    copy.draw();
    copy.draw();
    assert_eq!(s.current_raw_value(), before);
    assert_eq!(copy.current_logical(), b"three".to_vec());
}

#[test]
fn test_pretty_print_shows_charset() {
    let s = strings(&["hello"]);
    let p = s.pretty_print(None);
    assert!(p.contains("hello"), "{}", p);
    assert!(p.contains(Charset::Latin1.name()), "{}", p);
    assert_eq!(s.pretty_print(Some(5)).chars().count(), 5);
}

#[test]
fn test_config_from_json() {
    let config: StringConfig =
        serde_json::from_str(r#"{"values": ["x", "yz"], "charset": "Utf8", "encoder": "Hex"}"#).expect("json");
    let mut s = StringValue::new(config).expect("from json");
    assert_eq!(s.draw(), b"78".to_vec());
    assert_eq!(s.draw(), b"797a".to_vec());
}
