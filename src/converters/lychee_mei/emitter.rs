//! Lychee-MEI writer
//!
//! Serializes a `Section` with quick-xml, one element per model node.

use crate::errors::{ConversionError, ConversionResult};
use crate::models::{
    Accidental, AccidentalDisplay, BeamSpan, Duration, Event, Layer, LayerItem, Measure,
    MeasureStaff, NoteHead, Pitch, Section, SectionBody, Slur, SpanPosition, Staff, StaffContent,
    StaffDefinition, StaffGroup, StaffGroupItem, TupletSpan,
};
use quick_xml::events::{BytesEnd, BytesStart, Event as XmlEvent};
use quick_xml::Writer;

type Attributes = Vec<(&'static str, String)>;

struct Emitter {
    writer: Writer<Vec<u8>>,
}

fn xml_error(e: quick_xml::Error) -> ConversionError {
    ConversionError::Xml(e.to_string())
}

fn element<'a>(tag: &'a str, attributes: &'a Attributes) -> BytesStart<'a> {
    let mut start = BytesStart::new(tag);
    for (name, value) in attributes {
        start.push_attribute((*name, value.as_str()));
    }
    start
}

fn push_id(attributes: &mut Attributes, id: &Option<String>) {
    if let Some(id) = id {
        attributes.push(("xml:id", id.clone()));
    }
}

fn push_duration(attributes: &mut Attributes, duration: &Duration) {
    attributes.push(("dur", duration.denomination.as_str().to_string()));
    if duration.dots > 0 {
        attributes.push(("dots", duration.dots.to_string()));
    }
}

fn push_pitch(attributes: &mut Attributes, pitch: &Pitch, display: Option<AccidentalDisplay>) {
    attributes.push(("pname", pitch.name.as_str().to_string()));
    attributes.push(("oct", pitch.octave.to_string()));
    if let Some(display) = display {
        attributes.push(("accid", pitch.accidental.code().to_string()));
        if display == AccidentalDisplay::Cautionary {
            attributes.push(("func", "caution".to_string()));
        }
    }
    if pitch.accidental != Accidental::Natural {
        attributes.push(("accid.ges", pitch.accidental.code().to_string()));
    }
}

fn push_tie(attributes: &mut Attributes, tie: Option<SpanPosition>) {
    if let Some(tie) = tie {
        attributes.push(("tie", tie.code().to_string()));
    }
}

fn push_slurs(attributes: &mut Attributes, slurs: &[Slur]) {
    if !slurs.is_empty() {
        let codes: Vec<String> = slurs.iter().map(Slur::code).collect();
        attributes.push(("slur", codes.join(" ")));
    }
}

fn push_references(
    attributes: &mut Attributes,
    startid: &Option<String>,
    endid: &Option<String>,
    plist: &[String],
) {
    if let Some(startid) = startid {
        attributes.push(("startid", startid.clone()));
    }
    if let Some(endid) = endid {
        attributes.push(("endid", endid.clone()));
    }
    if !plist.is_empty() {
        attributes.push(("plist", plist.join(" ")));
    }
}

fn staff_def_attributes(def: &StaffDefinition) -> Attributes {
    let mut attributes = Attributes::new();
    if let Some(n) = def.n {
        attributes.push(("n", n.to_string()));
    }
    if let Some(clef) = def.clef {
        attributes.push(("clef.shape", clef.shape.code().to_string()));
        attributes.push(("clef.line", clef.line.to_string()));
    }
    if let Some(key) = def.key {
        attributes.push(("key.sig", key.code()));
    }
    if let Some(meter) = def.meter {
        attributes.push(("meter.count", meter.count.to_string()));
        attributes.push(("meter.unit", meter.unit.to_string()));
    }
    if let Some(label) = &def.label {
        attributes.push(("label", label.clone()));
    }
    attributes
}

impl Emitter {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn start(&mut self, tag: &str, attributes: &Attributes) -> ConversionResult<()> {
        self.writer
            .write_event(XmlEvent::Start(element(tag, attributes)))
            .map_err(xml_error)
    }

    fn empty(&mut self, tag: &str, attributes: &Attributes) -> ConversionResult<()> {
        self.writer
            .write_event(XmlEvent::Empty(element(tag, attributes)))
            .map_err(xml_error)
    }

    fn end(&mut self, tag: &str) -> ConversionResult<()> {
        self.writer
            .write_event(XmlEvent::End(BytesEnd::new(tag)))
            .map_err(xml_error)
    }

    fn finish(self) -> ConversionResult<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| ConversionError::Xml(e.to_string()))
    }

    fn staff_group(&mut self, group: &StaffGroup) -> ConversionResult<()> {
        let mut attributes = Attributes::new();
        if let Some(label) = &group.label {
            attributes.push(("label", label.clone()));
        }
        if let Some(symbol) = &group.symbol {
            attributes.push(("symbol", symbol.clone()));
        }
        self.start("staffGrp", &attributes)?;
        for item in &group.items {
            match item {
                StaffGroupItem::Group(nested) => self.staff_group(nested)?,
                StaffGroupItem::Staff(def) => self.empty("staffDef", &staff_def_attributes(def))?,
            }
        }
        self.end("staffGrp")
    }

    fn note_head(&mut self, head: &NoteHead) -> ConversionResult<()> {
        let mut attributes = Attributes::new();
        push_id(&mut attributes, &head.id);
        push_pitch(&mut attributes, &head.pitch, head.accid_display);
        push_tie(&mut attributes, head.tie);
        self.empty("note", &attributes)
    }

    fn event(&mut self, event: &Event) -> ConversionResult<()> {
        let mut attributes = Attributes::new();
        match event {
            Event::Note(note) => {
                push_id(&mut attributes, &note.id);
                push_pitch(&mut attributes, &note.pitch, note.accid_display);
                push_duration(&mut attributes, &note.duration);
                push_tie(&mut attributes, note.tie);
                push_slurs(&mut attributes, &note.slurs);
                self.empty("note", &attributes)
            }
            Event::Chord(chord) => {
                push_id(&mut attributes, &chord.id);
                push_duration(&mut attributes, &chord.duration);
                push_slurs(&mut attributes, &chord.slurs);
                self.start("chord", &attributes)?;
                for head in &chord.heads {
                    self.note_head(head)?;
                }
                self.end("chord")
            }
            Event::Rest { id, duration }
            | Event::Space { id, duration }
            | Event::MeasureRest { id, duration } => {
                push_id(&mut attributes, id);
                push_duration(&mut attributes, duration);
                self.empty(event.tag(), &attributes)
            }
        }
    }

    fn tuplet_span(&mut self, span: &TupletSpan) -> ConversionResult<()> {
        let mut attributes = Attributes::new();
        push_id(&mut attributes, &span.id);
        if let Some(duration) = &span.duration {
            push_duration(&mut attributes, duration);
        }
        if let (Some(num), Some(num_base)) = (span.num(), span.num_base()) {
            attributes.push(("num", num.to_string()));
            attributes.push(("numBase", num_base.to_string()));
        }
        push_references(&mut attributes, &span.startid, &span.endid, &span.plist);
        attributes.push(("n", span.n.to_string()));
        self.empty("tupletSpan", &attributes)
    }

    fn beam_span(&mut self, beam: &BeamSpan) -> ConversionResult<()> {
        let mut attributes = Attributes::new();
        push_id(&mut attributes, &beam.id);
        push_references(&mut attributes, &beam.startid, &beam.endid, &beam.plist);
        self.empty("beamSpan", &attributes)
    }

    fn layer(&mut self, layer: &Layer) -> ConversionResult<()> {
        let mut attributes = vec![("n", layer.n.to_string())];
        push_id(&mut attributes, &layer.id);
        self.start("layer", &attributes)?;
        for item in &layer.items {
            match item {
                LayerItem::Event(event) => self.event(event)?,
                LayerItem::TupletSpan(span) => self.tuplet_span(span)?,
                LayerItem::BeamSpan(beam) => self.beam_span(beam)?,
                LayerItem::StaffDef(def) => self.empty("staffDef", &staff_def_attributes(def))?,
            }
        }
        self.end("layer")
    }

    fn layers_in(&mut self, tag: &str, n: u32, id: &Option<String>, layers: &[Layer]) -> ConversionResult<()> {
        let mut attributes = vec![("n", n.to_string())];
        push_id(&mut attributes, id);
        self.start(tag, &attributes)?;
        for layer in layers {
            self.layer(layer)?;
        }
        self.end(tag)
    }

    fn measure(&mut self, measure: &Measure) -> ConversionResult<()> {
        let mut attributes = vec![("n", measure.n.to_string())];
        push_id(&mut attributes, &measure.id);
        self.start("measure", &attributes)?;
        for def in &measure.staff_defs {
            self.empty("staffDef", &staff_def_attributes(def))?;
        }
        for staff in &measure.staffs {
            self.layers_in("staff", staff.n, &staff.id, &staff.layers)?;
        }
        self.end("measure")
    }

    fn staff(&mut self, staff: &Staff) -> ConversionResult<()> {
        match &staff.content {
            StaffContent::Layers(layers) => self.layers_in("staff", staff.n, &staff.id, layers),
            StaffContent::Measures(measured) => {
                let mut attributes = vec![("n", staff.n.to_string())];
                push_id(&mut attributes, &staff.id);
                self.start("staff", &attributes)?;
                for (index, entry) in measured.iter().enumerate() {
                    let MeasureStaff { id, layers, .. } = entry;
                    self.layers_in("measure", index as u32 + 1, id, layers)?;
                }
                self.end("staff")
            }
        }
    }
}

/// Serialize `section` as Lychee-MEI
pub fn emit_section(section: &Section) -> ConversionResult<String> {
    let mut emitter = Emitter::new();

    let mut attributes = Attributes::new();
    push_id(&mut attributes, &section.id);
    emitter.start("section", &attributes)?;

    let mut score_attributes = Attributes::new();
    push_id(&mut score_attributes, &section.score_def.id);
    emitter.start("scoreDef", &score_attributes)?;
    emitter.staff_group(&section.score_def.staff_group)?;
    emitter.end("scoreDef")?;

    match &section.body {
        SectionBody::Measures(measures) => {
            for measure in measures {
                emitter.measure(measure)?;
            }
        }
        SectionBody::Staffs(staffs) => {
            for staff in staffs {
                emitter.staff(staff)?;
            }
        }
    }

    emitter.end("section")?;
    emitter.finish()
}
