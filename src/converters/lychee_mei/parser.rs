//! Lychee-MEI reader
//!
//! Builds a `Section` from Lychee-MEI text using roxmltree. Elements a
//! layer may not contain are skipped.

use crate::errors::{ConversionError, ConversionResult};
use crate::models::{
    Accidental, AccidentalDisplay, BeamSpan, Chord, Clef, ClefShape, Duration, Event, KeySignature,
    Layer, LayerItem, Measure, MeasureStaff, Meter, Note, NoteHead, Pitch, PitchName, ScoreDef,
    Section, SectionBody, Slur, SpanPosition, Staff, StaffContent, StaffDefinition, StaffGroup,
    StaffGroupItem, TupletRatio, TupletSpan,
};
use roxmltree::{Document as XmlDocument, Node};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.is_element())
}

fn xml_id(node: Node) -> Option<String> {
    node.attribute((XML_NAMESPACE, "id")).map(str::to_string)
}

fn required<'a>(node: Node<'a, '_>, name: &str) -> ConversionResult<&'a str> {
    node.attribute(name).ok_or_else(|| {
        ConversionError::Xml(format!(
            "<{}> is missing the {} attribute",
            node.tag_name().name(),
            name
        ))
    })
}

fn parse_number<T: std::str::FromStr>(attribute: &str, value: &str) -> ConversionResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConversionError::invalid_value(attribute, value, "expected a number"))
}

fn parse_n(node: Node) -> ConversionResult<u32> {
    parse_number("n", required(node, "n")?)
}

fn parse_duration(node: Node) -> ConversionResult<Duration> {
    let dots = match node.attribute("dots") {
        Some(dots) => parse_number("dots", dots)?,
        None => 0,
    };
    Duration::parse(required(node, "dur")?, dots)
}

fn parse_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Pitch plus display flags from `pname`, `oct`, `accid`, `accid.ges`, `func`
fn parse_pitch(node: Node) -> ConversionResult<(Pitch, Option<AccidentalDisplay>)> {
    let name = PitchName::parse(required(node, "pname")?)?;
    let octave = Pitch::parse_octave(required(node, "oct")?)?;
    let written = node.attribute("accid").map(Accidental::from_code).transpose()?;
    let sounding = node.attribute("accid.ges").map(Accidental::from_code).transpose()?;

    let display = written.map(|_| match node.attribute("func") {
        Some("caution") => AccidentalDisplay::Cautionary,
        _ => AccidentalDisplay::Forced,
    });
    let accidental = sounding.or(written).unwrap_or_default();
    Ok((Pitch::new(name, accidental, octave), display))
}

fn parse_tie(node: Node) -> ConversionResult<Option<SpanPosition>> {
    node.attribute("tie").map(SpanPosition::parse_tie).transpose()
}

fn parse_slurs(node: Node) -> ConversionResult<Vec<Slur>> {
    node.attribute("slur").map(Slur::parse_list).transpose().map(Option::unwrap_or_default)
}

fn parse_note(node: Node) -> ConversionResult<Note> {
    let (pitch, accid_display) = parse_pitch(node)?;
    Ok(Note {
        id: xml_id(node),
        pitch,
        duration: parse_duration(node)?,
        tie: parse_tie(node)?,
        slurs: parse_slurs(node)?,
        accid_display,
    })
}

fn parse_chord(node: Node) -> ConversionResult<Chord> {
    let mut heads = Vec::new();
    for child in elements(node).filter(|child| child.has_tag_name("note")) {
        let (pitch, accid_display) = parse_pitch(child)?;
        heads.push(NoteHead {
            id: xml_id(child),
            pitch,
            tie: parse_tie(child)?,
            accid_display,
        });
    }
    Ok(Chord {
        id: xml_id(node),
        heads,
        duration: parse_duration(node)?,
        slurs: parse_slurs(node)?,
    })
}

fn parse_tuplet_span(node: Node) -> ConversionResult<TupletSpan> {
    let duration = match node.attribute("dur") {
        Some(_) => Some(parse_duration(node)?),
        None => None,
    };
    // num is the denominator of the ratio, numBase the numerator
    let ratio = match (node.attribute("num"), node.attribute("numBase")) {
        (Some(num), Some(num_base)) => Some(TupletRatio::new(
            parse_number("numBase", num_base)?,
            parse_number("num", num)?,
        )),
        (None, None) => None,
        (Some(num), None) => {
            return Err(ConversionError::invalid_value("num", num, "numBase is missing"))
        }
        (None, Some(num_base)) => {
            return Err(ConversionError::invalid_value("numBase", num_base, "num is missing"))
        }
    };
    Ok(TupletSpan {
        id: xml_id(node),
        duration,
        ratio,
        startid: node.attribute("startid").map(str::to_string),
        endid: node.attribute("endid").map(str::to_string),
        plist: parse_list(node.attribute("plist")),
        n: match node.attribute("n") {
            Some(n) => parse_number("n", n)?,
            None => 1,
        },
    })
}

fn parse_beam_span(node: Node) -> BeamSpan {
    BeamSpan {
        id: xml_id(node),
        startid: node.attribute("startid").map(str::to_string),
        endid: node.attribute("endid").map(str::to_string),
        plist: parse_list(node.attribute("plist")),
    }
}

fn parse_staff_def(node: Node) -> ConversionResult<StaffDefinition> {
    let n = node.attribute("n").map(|n| parse_number("n", n)).transpose()?;
    let clef = match (node.attribute("clef.shape"), node.attribute("clef.line")) {
        (Some(shape), Some(line)) => Some(Clef::new(ClefShape::parse(shape)?, parse_number("clef.line", line)?)),
        (Some(shape), None) => {
            let shape = ClefShape::parse(shape)?;
            let line = match shape {
                ClefShape::F => 4,
                ClefShape::C => 3,
                _ => 2,
            };
            Some(Clef::new(shape, line))
        }
        _ => None,
    };
    let key = node.attribute("key.sig").map(KeySignature::parse).transpose()?;
    let meter = match (node.attribute("meter.count"), node.attribute("meter.unit")) {
        (Some(count), Some(unit)) => Some(Meter::parse(count, unit)?),
        _ => None,
    };
    Ok(StaffDefinition {
        n,
        clef,
        key,
        meter,
        label: node.attribute("label").map(str::to_string),
    })
}

fn parse_staff_group(node: Node) -> ConversionResult<StaffGroup> {
    let mut items = Vec::new();
    for child in elements(node) {
        match child.tag_name().name() {
            "staffGrp" => items.push(StaffGroupItem::Group(parse_staff_group(child)?)),
            "staffDef" => items.push(StaffGroupItem::Staff(parse_staff_def(child)?)),
            other => log::debug!("Skipping <{}> inside <staffGrp>", other),
        }
    }
    Ok(StaffGroup {
        label: node.attribute("label").map(str::to_string),
        symbol: node.attribute("symbol").map(str::to_string),
        items,
    })
}

fn parse_score_def(node: Node) -> ConversionResult<ScoreDef> {
    let staff_group = match elements(node).find(|child| child.has_tag_name("staffGrp")) {
        Some(group) => parse_staff_group(group)?,
        None => {
            // A bare list of staffDefs forms an implicit group
            let mut group = StaffGroup::default();
            for def in elements(node).filter(|child| child.has_tag_name("staffDef")) {
                group.items.push(StaffGroupItem::Staff(parse_staff_def(def)?));
            }
            group
        }
    };
    Ok(ScoreDef {
        id: xml_id(node),
        staff_group,
    })
}

fn parse_layer(node: Node) -> ConversionResult<Layer> {
    let mut layer = Layer::new(parse_n(node)?);
    layer.id = xml_id(node);
    for child in elements(node) {
        let item = match child.tag_name().name() {
            "note" => LayerItem::Event(Event::Note(parse_note(child)?)),
            "chord" => LayerItem::Event(Event::Chord(parse_chord(child)?)),
            "rest" => LayerItem::Event(Event::Rest {
                id: xml_id(child),
                duration: parse_duration(child)?,
            }),
            "space" => LayerItem::Event(Event::Space {
                id: xml_id(child),
                duration: parse_duration(child)?,
            }),
            "mRest" => LayerItem::Event(Event::MeasureRest {
                id: xml_id(child),
                duration: parse_duration(child)?,
            }),
            "tupletSpan" => LayerItem::TupletSpan(parse_tuplet_span(child)?),
            "beamSpan" => LayerItem::BeamSpan(parse_beam_span(child)),
            "staffDef" => LayerItem::StaffDef(parse_staff_def(child)?),
            other => {
                log::debug!("Skipping <{}> inside <layer n=\"{}\">", other, layer.n);
                continue;
            }
        };
        layer.items.push(item);
    }
    Ok(layer)
}

fn parse_layers(node: Node) -> ConversionResult<Vec<Layer>> {
    elements(node)
        .filter(|child| child.has_tag_name("layer"))
        .map(parse_layer)
        .collect()
}

fn parse_measure(node: Node) -> ConversionResult<Measure> {
    let mut measure = Measure::new(parse_n(node)?);
    measure.id = xml_id(node);
    for child in elements(node) {
        match child.tag_name().name() {
            "staffDef" => measure.add_staff_def(parse_staff_def(child)?),
            "staff" => measure.staffs.push(MeasureStaff {
                n: parse_n(child)?,
                id: xml_id(child),
                layers: parse_layers(child)?,
            }),
            other => log::debug!("Skipping <{}> inside <measure n=\"{}\">", other, measure.n),
        }
    }
    Ok(measure)
}

fn parse_staff(node: Node) -> ConversionResult<Staff> {
    let n = parse_n(node)?;
    let measured: Vec<Node> = elements(node).filter(|child| child.has_tag_name("measure")).collect();
    let content = if measured.is_empty() {
        StaffContent::Layers(parse_layers(node)?)
    } else {
        let entries = measured
            .into_iter()
            .map(|entry| {
                Ok(MeasureStaff {
                    n,
                    id: xml_id(entry),
                    layers: parse_layers(entry)?,
                })
            })
            .collect::<ConversionResult<Vec<_>>>()?;
        StaffContent::Measures(entries)
    };
    Ok(Staff {
        n,
        id: xml_id(node),
        content,
    })
}

/// Parse Lychee-MEI text whose root element is `<section>`
pub fn parse_section(text: &str) -> ConversionResult<Section> {
    let document = XmlDocument::parse(text).map_err(|e| ConversionError::Xml(e.to_string()))?;
    let root = document.root_element();
    if !root.has_tag_name("section") {
        return Err(ConversionError::Xml(format!(
            "expected <section> as the root element, found <{}>",
            root.tag_name().name()
        )));
    }

    let score_def = match elements(root).find(|child| child.has_tag_name("scoreDef")) {
        Some(node) => parse_score_def(node)?,
        None => ScoreDef::default(),
    };

    let has_measures = elements(root).any(|child| child.has_tag_name("measure"));
    let body = if has_measures {
        SectionBody::Measures(
            elements(root)
                .filter(|child| child.has_tag_name("measure"))
                .map(parse_measure)
                .collect::<ConversionResult<_>>()?,
        )
    } else {
        SectionBody::Staffs(
            elements(root)
                .filter(|child| child.has_tag_name("staff"))
                .map(parse_staff)
                .collect::<ConversionResult<_>>()?,
        )
    };

    Ok(Section {
        id: xml_id(root),
        score_def,
        body,
    })
}
