//! End-to-end reading and writing of small layouts.

use flatfile_rs::{
    BooleanConverter, Composite, ConstantField, DecodeError, Descriptor, FixedField, FlatError,
    Multiplicity, ObservableField, Optional, Sequence, TextSource,
};

fn bar() -> Descriptor {
    ConstantField::new("bar", "BAR").unwrap().into()
}

#[test]
fn test_fixed_field_strips_and_pads() {
    let name: Descriptor = FixedField::new("name", 5)
        .unwrap()
        .with_default("     ")
        .unwrap()
        .into();
    let entity = name.read_str("Foo  ").unwrap();
    assert_eq!(entity.as_field().unwrap().value(), "Foo");
    assert_eq!(entity.to_text().unwrap(), "Foo  ");
}

#[test]
fn test_constant_mismatch_and_short_input() {
    let foo: Descriptor = ConstantField::new("foo", "FOO").unwrap().into();
    let err = foo.read_str("BAR").unwrap_err();
    assert!(matches!(err, FlatError::Decode(DecodeError::ConstantMismatch { .. })));
    assert!(err.to_string().contains("FOO != BAR"));

    let err = foo.read_str("FO").unwrap_err();
    assert!(matches!(
        err,
        FlatError::Decode(DecodeError::ShortRead { expected: 3, found: 2, .. })
    ));
}

#[test]
fn test_trial_sequence_discards_partial_match() {
    let bars: Descriptor = Sequence::new("bars", bar()).unwrap().into();
    let entity = bars.read_str("BARBARBARBAL").unwrap();
    assert_eq!(entity.as_sequence().unwrap().len(), 3);
    assert_eq!(entity.to_text().unwrap(), "BARBARBAR");
}

#[test]
fn test_trial_sequence_over_multiplicity() {
    let bars: Descriptor = Sequence::new("bars", bar())
        .unwrap()
        .with_multiplicity(Multiplicity::new(1, 2).unwrap())
        .into();
    let err = bars.read_str("BARBARBARBAL").unwrap_err();
    assert!(matches!(
        &err,
        FlatError::Decode(DecodeError::Multiplicity { item, count: 3, .. }) if item == "bars"
    ));
    assert!(err.to_string().contains("1..2"));
}

#[test]
fn test_trial_sequence_under_multiplicity() {
    let bars: Descriptor = Sequence::new("bars", bar())
        .unwrap()
        .with_multiplicity(Multiplicity::new(2, 5).unwrap())
        .into();
    assert!(bars.read_str("BAR").is_err());
    assert_eq!(bars.read_str("BARBAR").unwrap().length(), 6);
}

#[test]
fn test_false_flag_leaves_target_unread() {
    let mut flag = ObservableField::new(FixedField::new("flag", 1).unwrap().into()).unwrap();
    let present = flag.correlate(BooleanConverter::yes_no());
    let note: Descriptor = Optional::new("note", bar())
        .unwrap()
        .flagged_by(present)
        .into();
    let rec: Descriptor = Composite::new("rec", vec![flag.into(), note]).unwrap().into();

    let mut source = TextSource::new("NBAR");
    let entity = rec.read_entity(&mut source).unwrap();
    let optional = entity.as_composite().unwrap().get("note").unwrap();
    assert!(optional.as_optional().unwrap().target().is_none());
    assert_eq!(optional.length(), 0);
    assert_eq!(source.remaining(), "BAR");
}

#[test]
fn test_composite_round_trip() {
    let rec: Descriptor = Composite::new(
        "rec",
        vec![
            ConstantField::new("tag", "FOO").unwrap().into(),
            FixedField::new("a", 5).unwrap().into(),
            FixedField::new("b", 9).unwrap().into(),
        ],
    )
    .unwrap()
    .into();
    assert_eq!(rec.min_length(), 17);
    let entity = rec.read_str("FOOTest1123456789").unwrap();
    assert_eq!(entity.length(), 17);
    assert_eq!(entity.to_text().unwrap(), "FOOTest1123456789");

    let mut out = Vec::new();
    entity.write_to(&mut out).unwrap();
    assert_eq!(out, b"FOOTest1123456789");
}

#[test]
fn test_entities_are_independent() {
    let rec: Descriptor = Composite::new("rec", vec![FixedField::new("a", 3).unwrap().into()])
        .unwrap()
        .into();
    let mut first = rec.read_str("abc").unwrap();
    let second = rec.read_str("xyz").unwrap();
    first
        .as_composite_mut()
        .unwrap()
        .get_mut("a")
        .unwrap()
        .as_field_mut()
        .unwrap()
        .set_value("q")
        .unwrap();
    assert_eq!(first.to_text().unwrap(), "q  ");
    assert_eq!(second.to_text().unwrap(), "xyz");
}
