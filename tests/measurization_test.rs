// Segmentation of unmeasured staffs into measures

use lychee_mei::ir::measurize_section;
use lychee_mei::models::{
    Denomination, Duration, Event, Layer, LayerItem, Meter, ScoreDef, Section, SectionBody, Staff,
    StaffDefinition, StaffGroupItem,
};
use lychee_mei::settings::ConversionSettings;
use lychee_mei::ConversionWarning;

fn rest(denomination: Denomination) -> LayerItem {
    LayerItem::Event(Event::rest(Duration::new(denomination, 0)))
}

fn score_def(meter: Meter) -> ScoreDef {
    let mut score_def = ScoreDef::default();
    score_def.staff_group.items.push(StaffGroupItem::Staff(StaffDefinition {
        meter: Some(meter),
        ..StaffDefinition::for_staff(1)
    }));
    score_def
}

fn unmeasured(score_def: ScoreDef, items: Vec<LayerItem>) -> Section {
    Section {
        id: None,
        score_def,
        body: SectionBody::Staffs(vec![Staff::with_layers(1, vec![Layer::with_items(1, items)])]),
    }
}

fn layer_sizes(section: &Section) -> Vec<usize> {
    section
        .measures()
        .iter()
        .map(|measure| measure.staff(1).and_then(|s| s.layer(1)).map_or(0, |l| l.items.len()))
        .collect()
}

#[test]
fn test_waltz_rests_fill_three_measures() {
    let items = vec![
        rest(Denomination::Half),
        rest(Denomination::Quarter),
        rest(Denomination::Quarter),
        rest(Denomination::Half),
        rest(Denomination::Half),
        rest(Denomination::Quarter),
    ];
    let (section, warnings) =
        measurize_section(unmeasured(score_def(Meter::new(3, 4)), items), &ConversionSettings::default());
    assert!(warnings.is_empty());
    assert_eq!(layer_sizes(&section), vec![2, 2, 2]);
    let numbers: Vec<u32> = section.measures().iter().map(|m| m.n).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn test_missing_meter_uses_default_and_warns() {
    let items = vec![rest(Denomination::Whole), rest(Denomination::Half)];
    let settings = ConversionSettings {
        default_meter: Meter::new(2, 4),
        ..ConversionSettings::default()
    };
    let (section, warnings) = measurize_section(unmeasured(ScoreDef::default(), items), &settings);
    assert_eq!(
        warnings,
        vec![ConversionWarning::MissingMeter {
            staff: 1,
            count: 2,
            unit: 4
        }]
    );
    // A whole note opening a measure claims it outright
    assert_eq!(layer_sizes(&section), vec![1, 1]);
}

#[test]
fn test_already_measured_section_is_untouched() {
    let items = vec![rest(Denomination::Whole)];
    let settings = ConversionSettings::default();
    let (once, _) = measurize_section(unmeasured(score_def(Meter::default()), items), &settings);
    let (twice, warnings) = measurize_section(once.clone(), &settings);
    assert!(warnings.is_empty());
    assert_eq!(once, twice);
}
