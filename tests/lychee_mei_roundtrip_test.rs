// Parse, convert and emit Lychee-MEI text

use lychee_mei::converters::{emit_section, parse_section};
use lychee_mei::identity::{MemoryRepository, SequentialBlocks};
use lychee_mei::models::LayerItem;
use lychee_mei::{convert, ConversionSettings, ConversionWarning, IdPath};

const UNMEASURED: &str = r#"<section>
  <scoreDef>
    <staffGrp>
      <staffDef n="1" clef.shape="G" clef.line="2" meter.count="2" meter.unit="4"/>
      <staffDef n="2" clef.shape="F" clef.line="4" meter.count="2" meter.unit="4"/>
    </staffGrp>
  </scoreDef>
  <staff n="1">
    <layer n="1">
      <tupletSpan xml:id="s1" dur="4" num="3" numBase="2" startid="a" endid="c" plist="a b c" n="1"/>
      <note xml:id="a" pname="c" oct="5" dur="8"/>
      <note xml:id="b" pname="d" oct="5" dur="8"/>
      <note xml:id="c" pname="e" oct="5" dur="8"/>
      <note pname="f" oct="5" dur="4"/>
      <note pname="g" oct="5" dur="2"/>
    </layer>
  </staff>
  <staff n="2">
    <layer n="1">
      <note pname="c" oct="3" dur="2"/>
      <note pname="g" oct="2" dur="2"/>
    </layer>
  </staff>
</section>"#;

#[test]
fn test_unmeasured_text_to_measured_text() {
    let section = parse_section(UNMEASURED).unwrap();
    let mut repository = MemoryRepository::new();
    let outcome = convert(
        section,
        &ConversionSettings::default(),
        &mut repository,
        "piece",
        &mut SequentialBlocks::new(),
    )
    .unwrap();
    assert!(outcome.warnings.is_empty());

    let measures = outcome.section.measures();
    assert_eq!(measures.len(), 2);
    assert_eq!(measures[0].staffs.len(), 2);

    let first = &measures[0].staff(1).unwrap().layer(1).unwrap().items;
    let span = first[0].as_tuplet_span().unwrap();
    assert_eq!(span.plist.len(), 3);
    assert!(span.plist.iter().all(|id| IdPath::is_valid(id)));
    let participants: Vec<&str> = first[1..4].iter().filter_map(LayerItem::id).collect();
    assert_eq!(span.plist, participants);

    let text = emit_section(&outcome.section).unwrap();
    assert!(text.starts_with("<section"));
    assert!(text.contains("<measure n=\"2\""));
    assert_eq!(parse_section(&text).unwrap(), outcome.section);
}

#[test]
fn test_overfull_measure_is_reported() {
    let text = r#"<section>
  <scoreDef><staffDef n="1" meter.count="2" meter.unit="4"/></scoreDef>
  <staff n="1"><layer n="1"><note pname="c" oct="4" dur="2" dots="1"/></layer></staff>
</section>"#;
    let outcome = convert(
        parse_section(text).unwrap(),
        &ConversionSettings::default(),
        &mut MemoryRepository::new(),
        "piece",
        &mut SequentialBlocks::new(),
    )
    .unwrap();
    assert!(outcome
        .warnings
        .iter()
        .any(|w| matches!(w, ConversionWarning::MeasureOverflow { .. })));
}
