//! Measurization Layer
//!
//! This module groups unsegmented (staff × layer) event streams into
//! numbered measures, using exact fractions of a whole note.
//!
//! # Architecture
//!
//! ```text
//! Staff { layers: [flat items] } + Meter → MEASURIZATION → Measure { staff { layer } }
//! ```
//!
//! # Key Features
//!
//! - Closes a measure exactly when the running total reaches meter capacity
//! - Scales tuplet participants by every enclosing `tupletSpan` ratio
//! - A plain whole note (or measure rest) opening a measure fills it
//! - Staffs declared with the same `n` continue each other's numbering
//! - Inline staff definitions become per-measure overrides

use crate::errors::ConversionWarning;
use crate::models::{
    Event, Fraction, Layer, LayerItem, Measure, Meter, ScoreDef, Section, SectionBody, Staff,
    StaffContent, StaffDefinition,
};
use crate::settings::ConversionSettings;
use crate::tuplets::TupletRatioTable;
use std::collections::{BTreeMap, HashMap, HashSet};

/// True for events that fill a measure when they open it
fn claims_whole_measure(event: &Event) -> bool {
    matches!(event, Event::MeasureRest { .. }) || event.duration().is_plain_whole()
}

/// Duration an event occupies at `beat_count` in a measure of `capacity`
///
/// Consumes the event's entry in `ratios`, if any.
pub(crate) fn occupied_duration(
    event: &Event,
    beat_count: Fraction,
    capacity: Fraction,
    ratios: &mut TupletRatioTable,
) -> Fraction {
    let in_tuplet = event.id().map_or(false, |id| ratios.contains(id));
    if beat_count == Fraction::from_integer(0) && !in_tuplet && claims_whole_measure(event) {
        // Take the entry out anyway so it cannot leak into a later event
        if let Some(id) = event.id() {
            ratios.take(id);
        }
        return capacity;
    }
    ratios.scaled(event)
}

/// Total scaled duration of one measure's layer
pub fn layer_duration(layer: &Layer, meter: Meter) -> Fraction {
    let capacity = meter.capacity();
    let mut ratios = TupletRatioTable::new();
    let mut total = Fraction::from_integer(0);
    for item in &layer.items {
        match item {
            LayerItem::TupletSpan(span) => ratios.register(span),
            LayerItem::Event(event) => {
                total += occupied_duration(event, total, capacity, &mut ratios);
            }
            LayerItem::BeamSpan(_) | LayerItem::StaffDef(_) => {}
        }
    }
    total
}

/// Accumulates measures across every staff of a section
#[derive(Debug, Default)]
pub struct Measurizer {
    measures: BTreeMap<u32, Measure>,
    /// Highest measure number reached per declared staff index
    staff_progress: HashMap<u32, u32>,
    warnings: Vec<ConversionWarning>,
}

impl Measurizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest measure number produced so far for staff index `n`
    pub fn measures_reached(&self, n: u32) -> u32 {
        self.staff_progress.get(&n).copied().unwrap_or(0)
    }

    fn layer_mut(&mut self, measure: u32, staff: u32, layer: u32) -> &mut Layer {
        self.measures
            .entry(measure)
            .or_insert_with(|| Measure::new(measure))
            .staff_mut(staff)
            .layer_mut(layer)
    }

    fn measure_mut(&mut self, measure: u32) -> &mut Measure {
        self.measures
            .entry(measure)
            .or_insert_with(|| Measure::new(measure))
    }

    /// Segment one staff; numbering continues from earlier staffs with the same `n`
    pub fn add_staff(&mut self, staff: &Staff, meter: Meter) {
        let offset = self.measures_reached(staff.n);
        let mut highest = offset;

        match &staff.content {
            StaffContent::Layers(layers) => {
                for layer in layers {
                    let reached = self.measurize_layer(staff.n, layer, offset, meter);
                    highest = highest.max(reached);
                }
            }
            StaffContent::Measures(measured) => {
                for (index, measure_staff) in measured.iter().enumerate() {
                    let number = offset + index as u32 + 1;
                    let target = self.measure_mut(number).staff_mut(staff.n);
                    if target.id.is_none() {
                        target.id = measure_staff.id.clone();
                    }
                    target.layers.extend(measure_staff.layers.iter().cloned());
                    highest = number;
                }
            }
        }

        log::debug!(
            "Staff {} covers measures {}..={}",
            staff.n,
            offset + 1,
            highest
        );
        self.staff_progress.insert(staff.n, highest);
    }

    /// Segment one layer starting after measure `offset`; returns the
    /// highest measure number opened
    fn measurize_layer(&mut self, staff_n: u32, layer: &Layer, offset: u32, meter: Meter) -> u32 {
        let zero = Fraction::from_integer(0);
        let mut capacity = meter.capacity();
        let mut measure_number = offset + 1;
        let mut beat_count = zero;
        let mut things_in_this_measure = 0usize;
        let mut highest = offset;
        let mut ratios = TupletRatioTable::new();
        let mut pending_def: Option<StaffDefinition> = None;

        for item in &layer.items {
            if let LayerItem::StaffDef(def) = item {
                let mut def = def.clone();
                def.n = Some(staff_n);
                if things_in_this_measure == 0 {
                    pending_def.get_or_insert_with(|| StaffDefinition::for_staff(staff_n)).merge(&def);
                } else {
                    // Clef, key and label apply mid-measure; meter waits for the barline
                    if let Some(new_meter) = def.meter.take() {
                        let warning = ConversionWarning::DeferredMeterChange {
                            staff: staff_n,
                            measure: measure_number,
                        };
                        log::warn!("{}", warning);
                        self.warnings.push(warning);
                        pending_def
                            .get_or_insert_with(|| StaffDefinition::for_staff(staff_n))
                            .meter = Some(new_meter);
                    }
                    if def.clef.is_some() || def.key.is_some() || def.label.is_some() {
                        self.measure_mut(measure_number).add_staff_def(def);
                    }
                }
                continue;
            }

            // Step 1: open (or reuse) the measure/staff/layer container
            if things_in_this_measure == 0 {
                if let Some(def) = pending_def.take() {
                    if let Some(new_meter) = def.meter {
                        capacity = new_meter.capacity();
                    }
                    self.measure_mut(measure_number).add_staff_def(def);
                }
                self.layer_mut(measure_number, staff_n, layer.n);
                highest = highest.max(measure_number);
            }

            // Step 2: items without a duration are placed as they are
            let event = match item {
                LayerItem::Event(event) => event,
                LayerItem::TupletSpan(span) => {
                    if !span.plist.is_empty() {
                        ratios.register(span);
                    }
                    self.layer_mut(measure_number, staff_n, layer.n).items.push(item.clone());
                    things_in_this_measure += 1;
                    continue;
                }
                LayerItem::BeamSpan(_) | LayerItem::StaffDef(_) => {
                    self.layer_mut(measure_number, staff_n, layer.n).items.push(item.clone());
                    things_in_this_measure += 1;
                    continue;
                }
            };

            // Step 3: accumulate the scaled duration
            beat_count += occupied_duration(event, beat_count, capacity, &mut ratios);
            self.layer_mut(measure_number, staff_n, layer.n).items.push(item.clone());
            things_in_this_measure += 1;

            // Step 4: close the measure once it is full
            if beat_count >= capacity {
                let excess = beat_count - capacity;
                if excess > zero {
                    let warning = ConversionWarning::MeasureOverflow {
                        staff: staff_n,
                        layer: layer.n,
                        measure: measure_number,
                        excess,
                    };
                    log::warn!("{}", warning);
                    self.warnings.push(warning);
                }
                log::debug!(
                    "Closed measure {} (staff {}, layer {}, {} items)",
                    measure_number,
                    staff_n,
                    layer.n,
                    things_in_this_measure
                );
                beat_count = excess;
                things_in_this_measure = 0;
                measure_number += 1;
            }
        }

        if let Some(def) = pending_def {
            log::debug!(
                "Staff {} definition after the last event attached to measure {}",
                staff_n,
                measure_number
            );
            self.measure_mut(measure_number).add_staff_def(def);
        }

        highest
    }

    /// Measures in ascending order, plus warnings raised while building them
    pub fn finish(self) -> (Vec<Measure>, Vec<ConversionWarning>) {
        (self.measures.into_values().collect(), self.warnings)
    }
}

/// Meter declared for staff `n` in the score definition
fn declared_meter(score_def: &ScoreDef, n: u32) -> Option<Meter> {
    score_def.staff_def(n).and_then(|def| def.meter)
}

/// Main entry point: segment every staff of a section into measures
///
/// Sections whose body is already measured are returned unchanged.
pub fn measurize_section(
    section: Section,
    settings: &ConversionSettings,
) -> (Section, Vec<ConversionWarning>) {
    let staffs = match section.body {
        SectionBody::Staffs(staffs) => staffs,
        body @ SectionBody::Measures(_) => return (Section { body, ..section }, Vec::new()),
    };

    let mut warnings = Vec::new();
    let mut warned: HashSet<u32> = HashSet::new();
    let mut measurizer = Measurizer::new();

    for staff in &staffs {
        let meter = match declared_meter(&section.score_def, staff.n) {
            Some(meter) => meter,
            None => {
                let fallback = settings.default_meter;
                if warned.insert(staff.n) {
                    let warning = ConversionWarning::MissingMeter {
                        staff: staff.n,
                        count: fallback.count,
                        unit: fallback.unit,
                    };
                    log::warn!("{}", warning);
                    warnings.push(warning);
                }
                fallback
            }
        };
        measurizer.add_staff(staff, meter);
    }

    let (measures, segment_warnings) = measurizer.finish();
    warnings.extend(segment_warnings);
    log::info!("Measurized {} staffs into {} measures", staffs.len(), measures.len());

    (
        Section {
            id: section.id,
            score_def: section.score_def,
            body: SectionBody::Measures(measures),
        },
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Accidental, Clef, Denomination, Duration, MeasureStaff, Note, Pitch, PitchName,
        StaffGroup, StaffGroupItem,
    };

    /// Helper to create a rest event
    fn make_rest(dur: &str, dots: u8) -> LayerItem {
        LayerItem::Event(Event::rest(Duration::parse(dur, dots).unwrap()))
    }

    /// Helper to create a note event
    fn make_note(dur: &str, id: &str) -> LayerItem {
        LayerItem::Event(
            Event::Note(Note::new(
                Pitch::new(PitchName::C, Accidental::Natural, 4),
                Duration::parse(dur, 0).unwrap(),
            ))
            .with_id(id),
        )
    }

    fn single_layer_staff(n: u32, items: Vec<LayerItem>) -> Staff {
        Staff::with_layers(n, vec![Layer::with_items(1, items)])
    }

    fn event_counts(measures: &[Measure], staff: u32, layer: u32) -> Vec<usize> {
        measures
            .iter()
            .filter_map(|m| m.staff(staff))
            .filter_map(|s| s.layer(layer))
            .map(|l| l.events().count())
            .collect()
    }

    fn segment(staff: Staff, meter: Meter) -> Vec<Measure> {
        let mut measurizer = Measurizer::new();
        measurizer.add_staff(&staff, meter);
        measurizer.finish().0
    }

    #[test]
    fn test_rests_split_into_four_measures() {
        let staff = single_layer_staff(
            1,
            vec![
                make_rest("4", 0),
                make_rest("2", 0),
                make_rest("4", 0),
                make_rest("1", 0),
                make_rest("2", 0),
                make_rest("4", 0),
                make_rest("4", 0),
                make_rest("1", 0),
            ],
        );
        let measures = segment(staff, Meter::new(4, 4));
        assert_eq!(measures.len(), 4);
        assert_eq!(event_counts(&measures, 1, 1), vec![3, 1, 3, 1]);
        assert_eq!(
            measures.iter().map(|m| m.n).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_whole_note_fills_compound_measure() {
        let staff = single_layer_staff(1, vec![make_rest("1", 0), make_rest("8", 0)]);
        let measures = segment(staff, Meter::new(6, 8));
        assert_eq!(event_counts(&measures, 1, 1), vec![1, 1]);
        let layer = measures[0].staff(1).unwrap().layer(1).unwrap();
        assert_eq!(layer_duration(layer, Meter::new(6, 8)), Fraction::new(3, 4));
    }

    #[test]
    fn test_whole_note_mid_measure_counts_literally() {
        // 3/2: half + whole closes the measure; a leading whole fills it
        let staff = single_layer_staff(
            1,
            vec![
                make_rest("2", 0),
                make_rest("1", 0),
                make_rest("1", 0),
                make_rest("4", 0),
            ],
        );
        let measures = segment(staff, Meter::new(3, 2));
        assert_eq!(event_counts(&measures, 1, 1), vec![2, 1, 1]);
    }

    #[test]
    fn test_triplets_scale_by_ratio() {
        let span = LayerItem::TupletSpan(crate::models::TupletSpan {
            id: Some("s".to_string()),
            duration: Some(Duration::parse("4", 0).unwrap()),
            ratio: Some(crate::models::TupletRatio::new(2, 3)),
            startid: Some("a".to_string()),
            endid: Some("c".to_string()),
            plist: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            n: 1,
        });
        let staff = single_layer_staff(
            1,
            vec![
                make_note("2", "x"),
                make_note("4", "y"),
                span,
                make_note("8", "a"),
                make_note("8", "b"),
                make_note("8", "c"),
                make_note("4", "z"),
            ],
        );
        let measures = segment(staff, Meter::new(4, 4));
        assert_eq!(event_counts(&measures, 1, 1), vec![5, 1]);
        let first = measures[0].staff(1).unwrap().layer(1).unwrap();
        assert_eq!(first.items.len(), 6);
        assert_eq!(layer_duration(first, Meter::new(4, 4)), Fraction::from_integer(1));
    }

    #[test]
    fn test_whole_note_inside_tuplet_is_scaled() {
        let span = LayerItem::TupletSpan(crate::models::TupletSpan {
            id: Some("s".to_string()),
            duration: None,
            ratio: Some(crate::models::TupletRatio::new(1, 2)),
            startid: Some("w".to_string()),
            endid: Some("w".to_string()),
            plist: vec!["w".to_string()],
            n: 1,
        });
        let staff = single_layer_staff(1, vec![span, make_note("1", "w"), make_note("2", "h")]);
        let measures = segment(staff, Meter::new(4, 4));
        assert_eq!(event_counts(&measures, 1, 1), vec![2]);
    }

    #[test]
    fn test_repeated_staff_index_continues_numbering() {
        let mut measurizer = Measurizer::new();
        measurizer.add_staff(
            &single_layer_staff(1, vec![make_rest("1", 0), make_rest("1", 0)]),
            Meter::default(),
        );
        assert_eq!(measurizer.measures_reached(1), 2);
        measurizer.add_staff(
            &Staff::with_layers(
                1,
                vec![
                    Layer::with_items(1, vec![make_rest("2", 0), make_rest("2", 0)]),
                    Layer::with_items(2, vec![make_rest("1", 0)]),
                ],
            ),
            Meter::default(),
        );
        let (measures, warnings) = measurizer.finish();
        assert!(warnings.is_empty());
        assert_eq!(measures.len(), 3);
        assert_eq!(measures[2].n, 3);
        assert_eq!(measures[2].staff(1).unwrap().layers.len(), 2);
        assert_eq!(measures[0].staff(1).unwrap().layers.len(), 1);
    }

    #[test]
    fn test_two_staffs_share_measures() {
        let mut measurizer = Measurizer::new();
        measurizer.add_staff(&single_layer_staff(1, vec![make_rest("1", 0), make_rest("1", 0)]), Meter::default());
        measurizer.add_staff(&single_layer_staff(2, vec![make_rest("2", 0), make_rest("2", 0), make_rest("1", 0)]), Meter::default());
        let (measures, _) = measurizer.finish();
        assert_eq!(measures.len(), 2);
        assert!(measures.iter().all(|m| m.staffs.len() == 2));
    }

    #[test]
    fn test_overflow_carries_remainder() {
        let staff = single_layer_staff(
            1,
            vec![make_rest("2", 1), make_rest("2", 0), make_rest("4", 0), make_rest("2", 0)],
        );
        let mut measurizer = Measurizer::new();
        measurizer.add_staff(&staff, Meter::default());
        let (measures, warnings) = measurizer.finish();
        assert_eq!(event_counts(&measures, 1, 1), vec![2, 2]);
        assert_eq!(
            warnings,
            vec![ConversionWarning::MeasureOverflow {
                staff: 1,
                layer: 1,
                measure: 1,
                excess: Fraction::new(1, 4),
            }]
        );
    }

    #[test]
    fn test_inline_meter_change_applies_from_next_measure() {
        let staff = single_layer_staff(
            1,
            vec![
                make_rest("1", 0),
                LayerItem::StaffDef(StaffDefinition {
                    meter: Some(Meter::new(3, 4)),
                    clef: Some(Clef::bass()),
                    ..StaffDefinition::default()
                }),
                make_rest("4", 0),
                make_rest("4", 0),
                make_rest("4", 0),
                make_rest("4", 0),
            ],
        );
        let measures = segment(staff, Meter::default());
        assert_eq!(event_counts(&measures, 1, 1), vec![1, 3, 1]);
        assert_eq!(measures[1].staff_defs.len(), 1);
        assert_eq!(measures[1].staff_defs[0].meter, Some(Meter::new(3, 4)));
        assert_eq!(measures[1].staff_defs[0].n, Some(1));
    }

    #[test]
    fn test_mid_measure_meter_change_is_deferred() {
        let staff = single_layer_staff(
            1,
            vec![
                make_rest("2", 0),
                LayerItem::StaffDef(StaffDefinition {
                    meter: Some(Meter::new(2, 4)),
                    ..StaffDefinition::default()
                }),
                make_rest("2", 0),
                make_rest("2", 0),
            ],
        );
        let mut measurizer = Measurizer::new();
        measurizer.add_staff(&staff, Meter::default());
        let (measures, warnings) = measurizer.finish();
        assert_eq!(event_counts(&measures, 1, 1), vec![2, 1]);
        assert!(measures[0].staff_defs.is_empty());
        assert_eq!(measures[1].staff_defs[0].meter, Some(Meter::new(2, 4)));
        assert_eq!(
            warnings,
            vec![ConversionWarning::DeferredMeterChange { staff: 1, measure: 1 }]
        );
    }

    #[test]
    fn test_premeasured_staff_is_placed_after_offset() {
        let mut measurizer = Measurizer::new();
        measurizer.add_staff(&single_layer_staff(1, vec![make_rest("1", 0)]), Meter::default());
        let mut measure_staff = MeasureStaff::new(1);
        measure_staff.layers.push(Layer::with_items(1, vec![make_rest("1", 0)]));
        measurizer.add_staff(
            &Staff {
                n: 1,
                id: None,
                content: StaffContent::Measures(vec![measure_staff.clone(), measure_staff]),
            },
            Meter::default(),
        );
        assert_eq!(measurizer.measures_reached(1), 3);
    }

    #[test]
    fn test_section_without_meter_warns_once() {
        let section = Section {
            id: None,
            score_def: ScoreDef {
                id: None,
                staff_group: StaffGroup {
                    items: vec![StaffGroupItem::Staff(StaffDefinition::for_staff(1))],
                    ..StaffGroup::default()
                },
            },
            body: SectionBody::Staffs(vec![
                single_layer_staff(1, vec![make_rest("1", 0)]),
                single_layer_staff(1, vec![make_rest("1", 0)]),
            ]),
        };
        let (section, warnings) = measurize_section(section, &ConversionSettings::default());
        assert_eq!(section.measures().len(), 2);
        assert_eq!(
            warnings,
            vec![ConversionWarning::MissingMeter { staff: 1, count: 4, unit: 4 }]
        );
    }

    #[test]
    fn test_section_meter_from_score_def() {
        let section = Section {
            id: None,
            score_def: ScoreDef {
                id: None,
                staff_group: StaffGroup {
                    items: vec![StaffGroupItem::Staff(StaffDefinition {
                        meter: Some(Meter::new(2, 4)),
                        ..StaffDefinition::for_staff(1)
                    })],
                    ..StaffGroup::default()
                },
            },
            body: SectionBody::Staffs(vec![single_layer_staff(
                1,
                vec![make_rest("4", 0), make_rest("4", 0), make_rest("2", 0)],
            )]),
        };
        let (section, warnings) = measurize_section(section, &ConversionSettings::default());
        assert!(warnings.is_empty());
        assert_eq!(event_counts(section.measures(), 1, 1), vec![2, 1]);
    }

    #[test]
    fn test_denomination_table_used_for_long_values() {
        let staff = single_layer_staff(
            1,
            vec![LayerItem::Event(Event::rest(Duration::new(Denomination::Breve, 0)))],
        );
        // A breve opening a 4/4 measure counts literally and overflows
        let mut measurizer = Measurizer::new();
        measurizer.add_staff(&staff, Meter::default());
        let (_, warnings) = measurizer.finish();
        assert_eq!(warnings.len(), 1);
    }
}
