// Beam groups - partitions a measure's layer into beamable runs

use crate::ir::measurization::occupied_duration;
use crate::models::{BeamSpan, Fraction, Layer, LayerItem, Meter, Section, SectionBody};
use crate::tuplets::TupletRatioTable;
use std::collections::HashMap;

/// Length of one beam subdivision for `meter`
///
/// Compound meters (count divisible by 3, unit shorter than a quarter)
/// group three units together.
pub fn subdivision_unit(meter: Meter) -> Fraction {
    let unit = Fraction::new(1, meter.unit.max(1) as i64);
    if meter.count % 3 == 0 && meter.unit > 4 {
        unit * 3
    } else {
        unit
    }
}

/// Close the current run, keeping it only if it has two or more events
fn flush(current: &mut Vec<usize>, runs: &mut Vec<Vec<usize>>) {
    if current.len() >= 2 {
        runs.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Indices of the events forming each beamable run of a measure's layer
///
/// A run is broken by rests, spaces, quarter-or-longer notes and chords,
/// and by subdivision boundaries. Span markers do not break a run.
/// Only runs of two or more events are returned.
pub fn beam_runs(items: &[LayerItem], meter: Meter) -> Vec<Vec<usize>> {
    beam_runs_with(items, meter, &mut TupletRatioTable::new())
}

/// `beam_runs` with ratios still pending from earlier measures
fn beam_runs_with(
    items: &[LayerItem],
    meter: Meter,
    ratios: &mut TupletRatioTable,
) -> Vec<Vec<usize>> {
    let unit = subdivision_unit(meter);
    let capacity = meter.capacity();
    let mut position = Fraction::from_integer(0);

    let mut runs = vec![];
    let mut current: Vec<usize> = vec![];
    let mut current_cell: Option<i64> = None;

    for (index, item) in items.iter().enumerate() {
        let event = match item {
            LayerItem::Event(event) => event,
            LayerItem::TupletSpan(span) => {
                ratios.register(span);
                continue;
            }
            LayerItem::BeamSpan(_) | LayerItem::StaffDef(_) => continue,
        };

        let start = position;
        position += occupied_duration(event, start, capacity, ratios);

        let cell = (start / unit).floor().to_integer();
        let last_cell = (position / unit).ceil().to_integer() - 1;

        if event.is_beamable() && cell == last_cell {
            if current_cell != Some(cell) {
                flush(&mut current, &mut runs);
                current_cell = Some(cell);
            }
            current.push(index);
        } else {
            flush(&mut current, &mut runs);
            current_cell = None;
        }
    }
    flush(&mut current, &mut runs);

    runs
}

/// Replace the layer's beam spans with freshly computed ones
///
/// Each `beamSpan` goes right after the last member of its run. Members
/// without an identifier get a provisional `b<k>` one. Returns the number
/// of beams inserted.
pub fn insert_beam_spans(layer: &mut Layer, meter: Meter) -> usize {
    insert_beam_spans_with(layer, meter, &mut TupletRatioTable::new())
}

fn insert_beam_spans_with(layer: &mut Layer, meter: Meter, ratios: &mut TupletRatioTable) -> usize {
    layer
        .items
        .retain(|item| !matches!(item, LayerItem::BeamSpan(_)));

    let runs = beam_runs_with(&layer.items, meter, ratios);
    let mut provisional = 0;
    let mut beams = Vec::with_capacity(runs.len());

    for run in &runs {
        let mut plist = Vec::with_capacity(run.len());
        for &index in run {
            if let LayerItem::Event(event) = &mut layer.items[index] {
                if event.id().is_none() {
                    provisional += 1;
                    *event.id_mut() = Some(format!("b{}", provisional));
                }
                plist.extend(event.id().map(str::to_string));
            }
        }
        let last = run.last().copied().unwrap_or_default();
        beams.push((
            last,
            BeamSpan {
                id: None,
                startid: plist.first().cloned(),
                endid: plist.last().cloned(),
                plist,
            },
        ));
    }

    // Back to front so earlier indices stay valid
    for (last, beam) in beams.into_iter().rev() {
        layer.items.insert(last + 1, LayerItem::BeamSpan(beam));
    }
    runs.len()
}

/// Beam every layer of a measured section
///
/// Meters come from the score definition, then from per-measure overrides
/// as they take effect, then `default_meter`. Tuplet ratios carry over
/// barlines within each (staff, layer) stream.
pub fn apply_beams(section: &mut Section, default_meter: Meter) -> usize {
    let Section {
        score_def, body, ..
    } = section;
    let measures = match body {
        SectionBody::Measures(measures) => measures,
        SectionBody::Staffs(_) => return 0,
    };

    let mut meters: HashMap<u32, Meter> = HashMap::new();
    let mut pending: HashMap<(u32, u32), TupletRatioTable> = HashMap::new();
    let mut inserted = 0;
    for measure in measures.iter_mut() {
        for def in &measure.staff_defs {
            if let (Some(n), Some(meter)) = (def.n, def.meter) {
                meters.insert(n, meter);
            }
        }
        for staff in measure.staffs.iter_mut() {
            let meter = meters
                .get(&staff.n)
                .copied()
                .or_else(|| score_def.staff_def(staff.n).and_then(|def| def.meter))
                .unwrap_or(default_meter);
            for layer in staff.layers.iter_mut() {
                let ratios = pending.entry((staff.n, layer.n)).or_default();
                inserted += insert_beam_spans_with(layer, meter, ratios);
            }
        }
    }
    log::debug!("Inserted {} beam spans", inserted);
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Accidental, Denomination, Duration, Event, Measure, Note, Pitch, PitchName, ScoreDef,
        TupletRatio, TupletSpan,
    };

    fn note(denomination: Denomination) -> LayerItem {
        LayerItem::Event(Event::Note(Note::new(
            Pitch::new(PitchName::G, Accidental::Natural, 4),
            Duration::new(denomination, 0),
        )))
    }

    fn rest(denomination: Denomination) -> LayerItem {
        LayerItem::Event(Event::rest(Duration::new(denomination, 0)))
    }

    #[test]
    fn test_subdivision_unit() {
        assert_eq!(subdivision_unit(Meter::new(4, 4)), Fraction::new(1, 4));
        assert_eq!(subdivision_unit(Meter::new(6, 8)), Fraction::new(3, 8));
        assert_eq!(subdivision_unit(Meter::new(9, 16)), Fraction::new(3, 16));
        assert_eq!(subdivision_unit(Meter::new(3, 4)), Fraction::new(1, 4));
        assert_eq!(subdivision_unit(Meter::new(5, 8)), Fraction::new(1, 8));
    }

    #[test]
    fn test_eighths_pair_by_beat_in_common_time() {
        let items = vec![
            note(Denomination::Eighth),
            note(Denomination::Eighth),
            note(Denomination::Eighth),
            note(Denomination::Eighth),
            note(Denomination::Half),
        ];
        assert_eq!(beam_runs(&items, Meter::new(4, 4)), vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_compound_meter_groups_three() {
        let items: Vec<LayerItem> = (0..6).map(|_| note(Denomination::Eighth)).collect();
        assert_eq!(
            beam_runs(&items, Meter::new(6, 8)),
            vec![vec![0, 1, 2], vec![3, 4, 5]]
        );
    }

    #[test]
    fn test_rest_and_quarter_break_runs() {
        let items = vec![
            note(Denomination::N16),
            rest(Denomination::N16),
            note(Denomination::N16),
            note(Denomination::N16),
            note(Denomination::Quarter),
            note(Denomination::Eighth),
            note(Denomination::Quarter),
        ];
        assert_eq!(beam_runs(&items, Meter::new(4, 4)), vec![vec![2, 3]]);
    }

    #[test]
    fn test_single_beamable_event_gets_no_beam() {
        let items = vec![note(Denomination::Eighth), note(Denomination::Quarter)];
        assert!(beam_runs(&items, Meter::new(4, 4)).is_empty());
    }

    #[test]
    fn test_triplet_run_is_one_beat() {
        let span = LayerItem::TupletSpan(TupletSpan {
            id: Some("s".to_string()),
            duration: Some(Duration::new(Denomination::Quarter, 0)),
            ratio: Some(TupletRatio::new(2, 3)),
            startid: Some("a".to_string()),
            endid: Some("c".to_string()),
            plist: vec!["a".into(), "b".into(), "c".into()],
            n: 1,
        });
        let tagged = |id: &str| match note(Denomination::Eighth) {
            LayerItem::Event(event) => LayerItem::Event(event.with_id(id)),
            other => other,
        };
        let items = vec![span, tagged("a"), tagged("b"), tagged("c"), note(Denomination::Eighth), note(Denomination::Eighth)];
        assert_eq!(beam_runs(&items, Meter::new(4, 4)), vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn test_insert_places_beam_after_last_member() {
        let mut layer = Layer::with_items(
            1,
            vec![
                note(Denomination::Eighth),
                note(Denomination::Eighth),
                note(Denomination::Half),
                note(Denomination::Quarter),
            ],
        );
        assert_eq!(insert_beam_spans(&mut layer, Meter::new(4, 4)), 1);
        assert_eq!(layer.items.len(), 5);
        match &layer.items[2] {
            LayerItem::BeamSpan(beam) => {
                assert_eq!(beam.plist, vec!["b1".to_string(), "b2".to_string()]);
                assert_eq!(beam.startid.as_deref(), Some("b1"));
                assert_eq!(beam.endid.as_deref(), Some("b2"));
            }
            other => panic!("expected beam span, got {:?}", other),
        }

        // Recomputing replaces rather than duplicates
        assert_eq!(insert_beam_spans(&mut layer, Meter::new(4, 4)), 1);
        assert_eq!(layer.items.len(), 5);
    }

    #[test]
    fn test_apply_beams_follows_meter_overrides() {
        let mut first = Measure::new(1);
        first.staff_mut(1).layer_mut(1).items = (0..4).map(|_| note(Denomination::Eighth)).collect();
        let mut second = Measure::new(2);
        second.add_staff_def(crate::models::StaffDefinition {
            meter: Some(Meter::new(6, 8)),
            ..crate::models::StaffDefinition::for_staff(1)
        });
        second.staff_mut(1).layer_mut(1).items = (0..6).map(|_| note(Denomination::Eighth)).collect();
        let mut section = Section {
            id: None,
            score_def: ScoreDef::default(),
            body: SectionBody::Measures(vec![first, second]),
        };
        // 2/4 by default: two beams, then 6/8: two beams
        assert_eq!(apply_beams(&mut section, Meter::new(2, 4)), 4);
    }

    #[test]
    fn test_triplet_ratio_carries_over_the_barline() {
        let span = LayerItem::TupletSpan(TupletSpan {
            id: Some("s".to_string()),
            duration: Some(Duration::new(Denomination::Quarter, 0)),
            ratio: Some(TupletRatio::new(2, 3)),
            startid: Some("a".to_string()),
            endid: Some("c".to_string()),
            plist: vec!["a".into(), "b".into(), "c".into()],
            n: 1,
        });
        let tagged = |denomination: Denomination, id: &str| match note(denomination) {
            LayerItem::Event(event) => LayerItem::Event(event.with_id(id)),
            other => other,
        };
        let mut first = Measure::new(1);
        first.staff_mut(1).layer_mut(1).items =
            vec![note(Denomination::Quarter), span, tagged(Denomination::Eighth, "a")];
        let mut second = Measure::new(2);
        // b and c take 1/12 each, so the sixteenth still lands in the first beat
        second.staff_mut(1).layer_mut(1).items = vec![
            tagged(Denomination::Eighth, "b"),
            tagged(Denomination::Eighth, "c"),
            tagged(Denomination::N16, "f"),
            note(Denomination::Quarter),
        ];
        let mut section = Section {
            id: None,
            score_def: ScoreDef::default(),
            body: SectionBody::Measures(vec![first, second]),
        };
        apply_beams(&mut section, Meter::new(2, 4));

        let items = &section.measures()[1].staffs[0].layers[0].items;
        match &items[3] {
            LayerItem::BeamSpan(beam) => assert_eq!(beam.plist, vec!["b", "c", "f"]),
            other => panic!("expected beam span, got {:?}", other),
        }
    }
}
