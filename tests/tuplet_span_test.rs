// Tuplet flattening and reconstruction through the public API

use lychee_mei::models::{
    Accidental, Denomination, Duration, Event, LayerItem, Note, Pitch, PitchName, TupletRatio,
};
use lychee_mei::tuplets::{decode, decode_layer, encode, encode_voice, TupletSpec, TupletTree, VoiceItem};
use lychee_mei::ConversionError;

fn note(name: PitchName, denomination: Denomination) -> Event {
    Event::Note(Note::new(
        Pitch::new(name, Accidental::Natural, 4),
        Duration::new(denomination, 0),
    ))
}

fn quintuplet() -> TupletTree {
    let mut tree = TupletTree::new(TupletSpec::Ratio(TupletRatio::new(4, 5)));
    let root = tree.root();
    for name in [PitchName::C, PitchName::D, PitchName::E, PitchName::F, PitchName::G] {
        tree.push_event(root, note(name, Denomination::N16));
    }
    tree
}

#[test]
fn test_quintuplet_span_wire_values() {
    let flattened = encode(&quintuplet()).unwrap();
    let span = flattened.items[0].as_tuplet_span().unwrap();
    assert_eq!(span.num(), Some(5));
    assert_eq!(span.num_base(), Some(4));
    // 4/5 of five sixteenths is a quarter
    assert_eq!(span.duration, Some(Duration::new(Denomination::Quarter, 0)));
    assert_eq!(span.plist.len(), 5);
}

#[test]
fn test_decode_recovers_tree_and_consumed_count() {
    let tree = quintuplet();
    let mut items = encode(&tree).unwrap().items;
    items.push(LayerItem::Event(note(PitchName::A, Denomination::Quarter)));

    let (decoded, consumed) = decode(&items).unwrap();
    assert_eq!(consumed, 6);
    let written: Vec<Event> = decoded.events().into_iter().map(Event::without_ids).collect();
    let original: Vec<Event> = tree.events().into_iter().map(Event::without_ids).collect();
    assert_eq!(written, original);
}

#[test]
fn test_voice_with_two_tuplets_keeps_order() {
    let voice = vec![
        VoiceItem::Tuplet(quintuplet()),
        VoiceItem::Event(note(PitchName::A, Denomination::Quarter)),
        VoiceItem::Tuplet(quintuplet()),
    ];
    let flattened = encode_voice(&voice).unwrap();
    assert_eq!(flattened.items.len(), 13);

    let decoded = decode_layer(&flattened.items).unwrap();
    assert_eq!(decoded.len(), 3);
    assert!(matches!(decoded[0], VoiceItem::Tuplet(_)));
    assert!(matches!(decoded[1], VoiceItem::Event(_)));
    assert!(matches!(decoded[2], VoiceItem::Tuplet(_)));
}

#[test]
fn test_span_without_participants_is_malformed() {
    let mut items = encode(&quintuplet()).unwrap().items;
    items.truncate(3);
    assert!(matches!(
        decode(&items),
        Err(ConversionError::MalformedTupletSpan { .. })
    ));
}

/// 3:4 { c8, 4:5 { five sixteenth rests }, d8 }
fn quintuplet_inside_quadruplet() -> TupletTree {
    let mut tree = TupletTree::new(TupletSpec::Ratio(TupletRatio::new(3, 4)));
    let root = tree.root();
    tree.push_event(root, note(PitchName::C, Denomination::Eighth));
    let inner = tree.push_tuplet(root, TupletSpec::Ratio(TupletRatio::new(4, 5)));
    for _ in 0..5 {
        tree.push_event(inner, Event::rest(Duration::new(Denomination::N16, 0)));
    }
    tree.push_event(root, note(PitchName::D, Denomination::Eighth));
    tree
}

#[test]
fn test_nested_tuplet_round_trip() {
    let tree = quintuplet_inside_quadruplet();
    let flattened = encode(&tree).unwrap();
    assert!(flattened.warnings.is_empty());

    let items = flattened.items;
    assert_eq!(items.len(), 9);
    let outer = items[0].as_tuplet_span().unwrap();
    let inner = items[2].as_tuplet_span().unwrap();
    assert_eq!(outer.plist.len(), 8);
    assert_eq!(outer.plist[1], inner.id.clone().unwrap());
    assert_eq!(inner.plist[..], outer.plist[2..7]);
    // 3/4 of (1/8 + 1/4 + 1/8)
    assert_eq!(outer.duration, Some(Duration::new(Denomination::Quarter, 1)));
    assert_eq!(inner.duration, Some(Duration::new(Denomination::Quarter, 0)));

    let (decoded, consumed) = decode(&items).unwrap();
    assert_eq!(consumed, 9);
    assert_eq!(decoded.without_ids(), tree.without_ids());
}

#[test]
fn test_nested_span_overrunning_its_parent_is_malformed() {
    let mut items = encode(&quintuplet_inside_quadruplet()).unwrap().items;
    if let LayerItem::TupletSpan(outer) = &mut items[0] {
        // The outer span now stops two items into the nested one's participants
        outer.plist.truncate(6);
        outer.endid = outer.plist.last().cloned();
    }
    match decode(&items) {
        Err(ConversionError::MalformedTupletSpan { reason, .. }) => {
            assert!(reason.contains("claims 6 items but only 5 remain"), "{}", reason)
        }
        other => panic!("expected MalformedTupletSpan, got {:?}", other),
    }
}
