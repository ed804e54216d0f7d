//! Leaf events and layer contents
//!
//! `Event` is the closed set of durational leaves; `LayerItem` is everything
//! that may appear inside a `<layer>`: events plus the flattened span
//! annotations that refer back to them.

use super::duration::{Duration, Fraction};
use super::pitch::{AccidentalDisplay, Pitch};
use super::score::StaffDefinition;
use crate::errors::{ConversionError, ConversionResult};
use serde::{Deserialize, Serialize};

/// Position of an element inside a tie or slur chain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanPosition {
    Initial,
    Medial,
    Terminal,
}

impl SpanPosition {
    pub fn code(&self) -> char {
        match self {
            SpanPosition::Initial => 'i',
            SpanPosition::Medial => 'm',
            SpanPosition::Terminal => 't',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'i' => Some(SpanPosition::Initial),
            'm' => Some(SpanPosition::Medial),
            't' => Some(SpanPosition::Terminal),
            _ => None,
        }
    }

    /// Parse a `tie` attribute (`i`, `m` or `t`)
    pub fn parse_tie(value: &str) -> ConversionResult<Self> {
        let mut chars = value.trim().chars();
        match (chars.next().and_then(SpanPosition::from_code), chars.next()) {
            (Some(position), None) => Ok(position),
            _ => Err(ConversionError::invalid_value("tie", value, "expected i, m or t")),
        }
    }
}

/// One slur endpoint on a note: position letter plus slur number (`i1`, `t1`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slur {
    pub position: SpanPosition,
    pub number: u8,
}

impl Slur {
    pub fn new(position: SpanPosition, number: u8) -> Self {
        Self { position, number }
    }

    pub fn code(&self) -> String {
        format!("{}{}", self.position.code(), self.number)
    }

    /// Parse a space-separated `slur` attribute
    pub fn parse_list(value: &str) -> ConversionResult<Vec<Slur>> {
        value
            .split_whitespace()
            .map(|token| {
                let mut chars = token.chars();
                let position = chars.next().and_then(SpanPosition::from_code);
                let number = chars.as_str().parse::<u8>().ok();
                match (position, number) {
                    (Some(position), Some(number)) => Ok(Slur::new(position, number)),
                    _ => Err(ConversionError::invalid_value(
                        "slur",
                        token,
                        "expected a position letter followed by a number",
                    )),
                }
            })
            .collect()
    }
}

/// A single note
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub id: Option<String>,
    pub pitch: Pitch,
    pub duration: Duration,
    #[serde(default)]
    pub tie: Option<SpanPosition>,
    #[serde(default)]
    pub slurs: Vec<Slur>,
    #[serde(default)]
    pub accid_display: Option<AccidentalDisplay>,
}

impl Note {
    pub fn new(pitch: Pitch, duration: Duration) -> Self {
        Self {
            id: None,
            pitch,
            duration,
            tie: None,
            slurs: Vec::new(),
            accid_display: None,
        }
    }
}

/// A note-head inside a chord; the chord owns the duration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteHead {
    #[serde(default)]
    pub id: Option<String>,
    pub pitch: Pitch,
    #[serde(default)]
    pub tie: Option<SpanPosition>,
    #[serde(default)]
    pub accid_display: Option<AccidentalDisplay>,
}

impl NoteHead {
    pub fn new(pitch: Pitch) -> Self {
        Self {
            id: None,
            pitch,
            tie: None,
            accid_display: None,
        }
    }
}

/// Simultaneous note-heads sharing one duration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    #[serde(default)]
    pub id: Option<String>,
    pub heads: Vec<NoteHead>,
    pub duration: Duration,
    #[serde(default)]
    pub slurs: Vec<Slur>,
}

/// Durational leaf of the document tree
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    Note(Note),
    Chord(Chord),
    Rest {
        #[serde(default)]
        id: Option<String>,
        duration: Duration,
    },
    /// Non-sounding spacer
    Space {
        #[serde(default)]
        id: Option<String>,
        duration: Duration,
    },
    MeasureRest {
        #[serde(default)]
        id: Option<String>,
        duration: Duration,
    },
}

impl Event {
    pub fn rest(duration: Duration) -> Self {
        Event::Rest { id: None, duration }
    }

    pub fn space(duration: Duration) -> Self {
        Event::Space { id: None, duration }
    }

    pub fn measure_rest(duration: Duration) -> Self {
        Event::MeasureRest { id: None, duration }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Event::Note(note) => note.duration,
            Event::Chord(chord) => chord.duration,
            Event::Rest { duration, .. }
            | Event::Space { duration, .. }
            | Event::MeasureRest { duration, .. } => *duration,
        }
    }

    /// Unscaled value of the written duration
    pub fn nominal(&self) -> Fraction {
        self.duration().to_fraction()
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Event::Note(note) => note.id.as_deref(),
            Event::Chord(chord) => chord.id.as_deref(),
            Event::Rest { id, .. } | Event::Space { id, .. } | Event::MeasureRest { id, .. } => {
                id.as_deref()
            }
        }
    }

    pub fn id_mut(&mut self) -> &mut Option<String> {
        match self {
            Event::Note(note) => &mut note.id,
            Event::Chord(chord) => &mut chord.id,
            Event::Rest { id, .. } | Event::Space { id, .. } | Event::MeasureRest { id, .. } => id,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        *self.id_mut() = Some(id.into());
        self
    }

    /// Lychee-MEI element name
    pub fn tag(&self) -> &'static str {
        match self {
            Event::Note(_) => "note",
            Event::Chord(_) => "chord",
            Event::Rest { .. } => "rest",
            Event::Space { .. } => "space",
            Event::MeasureRest { .. } => "mRest",
        }
    }

    /// Notes and chords shorter than a quarter note can carry a beam
    pub fn is_beamable(&self) -> bool {
        matches!(self, Event::Note(_) | Event::Chord(_)) && self.nominal() < Fraction::new(1, 4)
    }

    /// Copy with every identifier (including chord heads) removed
    pub fn without_ids(&self) -> Event {
        let mut event = self.clone();
        *event.id_mut() = None;
        if let Event::Chord(chord) = &mut event {
            for head in &mut chord.heads {
                head.id = None;
            }
        }
        event
    }
}

/// Tuplet ratio kept unreduced; `2:3` multiplies nominal durations by 2/3
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupletRatio {
    pub numerator: u32,
    pub denominator: u32,
}

impl TupletRatio {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn to_fraction(&self) -> Fraction {
        Fraction::new(self.numerator as i64, self.denominator as i64)
    }
}

/// Flattened stand-in for a tuplet container
///
/// In document order the span is followed by exactly the items named in
/// `plist`, nested span markers included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TupletSpan {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub ratio: Option<TupletRatio>,
    #[serde(default)]
    pub startid: Option<String>,
    #[serde(default)]
    pub endid: Option<String>,
    #[serde(default)]
    pub plist: Vec<String>,
    pub n: u32,
}

impl TupletSpan {
    /// `num` attribute: the count of notes actually played
    pub fn num(&self) -> Option<u32> {
        self.ratio.map(|ratio| ratio.denominator)
    }

    /// `numBase` attribute: the count of notes they stand in for
    pub fn num_base(&self) -> Option<u32> {
        self.ratio.map(|ratio| ratio.numerator)
    }

    /// Factor applied to every participant's nominal duration
    pub fn multiplier(&self) -> Option<Fraction> {
        match (self.num(), self.num_base()) {
            (Some(num), Some(num_base)) if num > 0 => {
                Some(Fraction::new(num_base as i64, num as i64))
            }
            _ => None,
        }
    }
}

/// Beam grouping marker placed after the last beamed event
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeamSpan {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub startid: Option<String>,
    #[serde(default)]
    pub endid: Option<String>,
    #[serde(default)]
    pub plist: Vec<String>,
}

/// Anything that may appear in a layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum LayerItem {
    Event(Event),
    TupletSpan(TupletSpan),
    BeamSpan(BeamSpan),
    /// Inline clef/key/meter/label change
    StaffDef(StaffDefinition),
}

impl LayerItem {
    pub fn id(&self) -> Option<&str> {
        match self {
            LayerItem::Event(event) => event.id(),
            LayerItem::TupletSpan(span) => span.id.as_deref(),
            LayerItem::BeamSpan(beam) => beam.id.as_deref(),
            LayerItem::StaffDef(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            LayerItem::Event(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_tuplet_span(&self) -> Option<&TupletSpan> {
        match self {
            LayerItem::TupletSpan(span) => Some(span),
            _ => None,
        }
    }
}

impl From<Event> for LayerItem {
    fn from(event: Event) -> Self {
        LayerItem::Event(event)
    }
}

/// One voice
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub n: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub items: Vec<LayerItem>,
}

impl Layer {
    pub fn new(n: u32) -> Self {
        Self {
            n,
            id: None,
            items: Vec::new(),
        }
    }

    pub fn with_items(n: u32, items: Vec<LayerItem>) -> Self {
        Self { n, id: None, items }
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.items.iter().filter_map(LayerItem::as_event)
    }
}
