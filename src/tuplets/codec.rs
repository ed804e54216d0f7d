//! Tuplet span codec
//!
//! `encode` turns a `TupletTree` into the flattened wire form: a
//! `TupletSpan` followed by its participants, nested spans inline.
//! `decode` reads that form back into a tree. Both are pure.
//!
//! ```text
//! Tuplet 2:3 { c8 d8 Tuplet 2:3 { e16 f16 g16 } }
//!   ↓ encode
//! tupletSpan(n=1, plist="t1-2 t1-3 t1-4 t1-5 t1-6 t1-7")
//!   c8  d8  tupletSpan(n=2, plist="t1-5 t1-6 t1-7")  e16  f16  g16
//! ```

use super::tree::{ContainerId, TupletChild, TupletSpec, TupletTree};
use crate::errors::{ConversionError, ConversionResult, ConversionWarning};
use crate::models::{Duration, Event, LayerItem, StaffDefinition, TupletSpan};
use serde::{Deserialize, Serialize};

/// Flattened output plus anything worth reporting about it
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Flattened {
    pub items: Vec<LayerItem>,
    pub warnings: Vec<ConversionWarning>,
}

/// A voice as produced by a front-end: events with nested tuplets
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum VoiceItem {
    Event(Event),
    Tuplet(TupletTree),
    StaffDef(StaffDefinition),
}

struct Encoder {
    prefix: String,
    counter: usize,
    items: Vec<LayerItem>,
    warnings: Vec<ConversionWarning>,
}

impl Encoder {
    fn new(prefix: String) -> Self {
        Self {
            prefix,
            counter: 0,
            items: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Identifier for an item that arrived without one
    fn provisional_id(&mut self) -> String {
        self.counter += 1;
        format!("{}-{}", self.prefix, self.counter)
    }

    fn encode_container(
        &mut self,
        tree: &TupletTree,
        id: ContainerId,
        n: u32,
    ) -> ConversionResult<()> {
        let container = tree.container(id);
        let span_id = match &container.id {
            Some(span_id) => span_id.clone(),
            None => self.provisional_id(),
        };

        let ratio = match container.spec {
            TupletSpec::Ratio(ratio) => {
                if ratio.numerator == 0 || ratio.denominator == 0 {
                    return Err(ConversionError::invalid_value(
                        "ratio",
                        &format!("{}:{}", ratio.numerator, ratio.denominator),
                        "tuplet ratio terms must be positive",
                    ));
                }
                Some(ratio)
            }
            TupletSpec::Duration(_) => tree.ratio_of(id),
        };

        let duration = match container.spec {
            TupletSpec::Duration(duration) => Some(duration),
            TupletSpec::Ratio(_) if container.children.is_empty() => None,
            TupletSpec::Ratio(_) => {
                let value = tree.duration_of(id);
                let written = Duration::from_fraction(value);
                if written.is_none() {
                    let warning = ConversionWarning::InexpressibleTupletDuration {
                        span: span_id.clone(),
                        value,
                    };
                    log::warn!("{}", warning);
                    self.warnings.push(warning);
                }
                written
            }
        };

        let span_index = self.items.len();
        self.items.push(LayerItem::TupletSpan(TupletSpan {
            id: Some(span_id),
            duration,
            ratio,
            startid: None,
            endid: None,
            plist: Vec::new(),
            n,
        }));

        let mut sibling_tuplets = 1;
        for child in &container.children {
            match child {
                TupletChild::Event(event) => {
                    let mut event = event.clone();
                    if event.id().is_none() {
                        *event.id_mut() = Some(self.provisional_id());
                    }
                    self.items.push(LayerItem::Event(event));
                }
                TupletChild::Tuplet(nested) => {
                    sibling_tuplets += 1;
                    self.encode_container(tree, *nested, sibling_tuplets)?;
                }
            }
        }

        let plist: Vec<String> = self.items[span_index + 1..]
            .iter()
            .filter_map(LayerItem::id)
            .map(str::to_string)
            .collect();
        if let LayerItem::TupletSpan(span) = &mut self.items[span_index] {
            span.startid = plist.first().cloned();
            span.endid = plist.last().cloned();
            span.plist = plist;
        }
        Ok(())
    }
}

/// Flatten one tuplet tree
pub fn encode(tree: &TupletTree) -> ConversionResult<Flattened> {
    encode_with_prefix(tree, "t1")
}

fn encode_with_prefix(tree: &TupletTree, prefix: &str) -> ConversionResult<Flattened> {
    let mut encoder = Encoder::new(prefix.to_string());
    encoder.encode_container(tree, tree.root(), 1)?;
    Ok(Flattened {
        items: encoder.items,
        warnings: encoder.warnings,
    })
}

/// Flatten every tuplet of a voice, leaving plain events in place
pub fn encode_voice(voice: &[VoiceItem]) -> ConversionResult<Flattened> {
    let mut flattened = Flattened::default();
    let mut tuplets = 0;
    for item in voice {
        match item {
            VoiceItem::Event(event) => flattened.items.push(LayerItem::Event(event.clone())),
            VoiceItem::StaffDef(def) => flattened.items.push(LayerItem::StaffDef(def.clone())),
            VoiceItem::Tuplet(tree) => {
                tuplets += 1;
                let encoded = encode_with_prefix(tree, &format!("t{}", tuplets))?;
                flattened.items.extend(encoded.items);
                flattened.warnings.extend(encoded.warnings);
            }
        }
    }
    Ok(flattened)
}

fn spec_of(span: &TupletSpan) -> ConversionResult<TupletSpec> {
    match (span.ratio, span.duration) {
        (Some(ratio), _) => {
            if ratio.numerator == 0 || ratio.denominator == 0 {
                return Err(ConversionError::malformed_span(
                    span.id.as_deref(),
                    "num and numBase must be positive",
                ));
            }
            Ok(TupletSpec::Ratio(ratio))
        }
        (None, Some(duration)) => Ok(TupletSpec::Duration(duration)),
        (None, None) => Err(ConversionError::malformed_span(
            span.id.as_deref(),
            "span carries neither dur nor num/numBase",
        )),
    }
}

/// Rebuild container `id` from the span at `items[start]`; returns the
/// index just past its last participant
fn decode_into(
    tree: &mut TupletTree,
    id: ContainerId,
    items: &[LayerItem],
    start: usize,
) -> ConversionResult<usize> {
    let span = match items.get(start) {
        Some(LayerItem::TupletSpan(span)) => span,
        _ => return Err(ConversionError::malformed_span(None, "expected a tupletSpan")),
    };
    let span_name = span.id.as_deref();

    if !span.plist.is_empty() {
        if span.startid.as_deref().map_or(false, |first| Some(first) != span.plist.first().map(String::as_str)) {
            return Err(ConversionError::malformed_span(span_name, "startid is not the first plist entry"));
        }
        if span.endid.as_deref().map_or(false, |last| Some(last) != span.plist.last().map(String::as_str)) {
            return Err(ConversionError::malformed_span(span_name, "endid is not the last plist entry"));
        }
    }

    let mut remaining = span.plist.len();
    let mut position = 0;
    let mut index = start + 1;
    while remaining > 0 {
        let item = items.get(index).ok_or_else(|| {
            ConversionError::malformed_span(
                span_name,
                format!(
                    "plist names {} items but only {} follow",
                    span.plist.len(),
                    position
                ),
            )
        })?;

        if matches!(item, LayerItem::Event(_) | LayerItem::TupletSpan(_))
            && item.id() != Some(span.plist[position].as_str())
        {
            return Err(ConversionError::malformed_span(
                span_name,
                format!(
                    "participant {} should be {:?} but found {:?}",
                    position + 1,
                    span.plist[position],
                    item.id()
                ),
            ));
        }

        match item {
            LayerItem::Event(event) => {
                tree.push_event(id, event.clone());
                remaining -= 1;
                position += 1;
                index += 1;
            }
            LayerItem::TupletSpan(nested) => {
                let claimed = nested.plist.len() + 1;
                if claimed > remaining {
                    return Err(ConversionError::malformed_span(
                        span_name,
                        format!(
                            "nested span {:?} claims {} items but only {} remain",
                            nested.id, claimed, remaining
                        ),
                    ));
                }
                let child = tree.push_tuplet(id, spec_of(nested)?);
                tree.container_mut(child).id = nested.id.clone();
                index = decode_into(tree, child, items, index)?;
                remaining -= claimed;
                position += claimed;
            }
            LayerItem::BeamSpan(_) | LayerItem::StaffDef(_) => {
                log::debug!("Skipping non-participant inside tuplet span {:?}", span_name);
                index += 1;
            }
        }
    }

    // A span stating both forms must agree with its participants
    if let (Some(_), Some(written)) = (span.ratio, span.duration) {
        if !tree.container(id).children.is_empty() {
            let derived = tree.duration_of(id);
            if derived != written.to_fraction() {
                return Err(ConversionError::malformed_span(
                    span_name,
                    format!(
                        "dur is {} but ratio and participants give {}",
                        written.to_fraction(),
                        derived
                    ),
                ));
            }
        }
    }
    Ok(index)
}

/// Rebuild a tree from a span marker and its participants
///
/// Returns the tree and the number of items consumed.
pub fn decode(items: &[LayerItem]) -> ConversionResult<(TupletTree, usize)> {
    let span = items
        .first()
        .and_then(LayerItem::as_tuplet_span)
        .ok_or_else(|| ConversionError::malformed_span(None, "expected a tupletSpan"))?;
    let mut tree = TupletTree::new(spec_of(span)?);
    let root = tree.root();
    tree.container_mut(root).id = span.id.clone();
    let end = decode_into(&mut tree, root, items, 0)?;
    Ok((tree, end))
}

/// Rebuild the voice form of a whole layer
///
/// Beam spans are dropped; they are derived data.
pub fn decode_layer(items: &[LayerItem]) -> ConversionResult<Vec<VoiceItem>> {
    let mut voice = Vec::new();
    let mut index = 0;
    while index < items.len() {
        match &items[index] {
            LayerItem::Event(event) => {
                voice.push(VoiceItem::Event(event.clone()));
                index += 1;
            }
            LayerItem::StaffDef(def) => {
                voice.push(VoiceItem::StaffDef(def.clone()));
                index += 1;
            }
            LayerItem::BeamSpan(_) => index += 1,
            LayerItem::TupletSpan(_) => {
                let (tree, consumed) = decode(&items[index..])?;
                voice.push(VoiceItem::Tuplet(tree));
                index += consumed;
            }
        }
    }
    Ok(voice)
}
