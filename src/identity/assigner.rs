//! Hierarchical identifier assignment
//!
//! Walks a section top-down. Every element gets a content key built from
//! its parent's key, its printed form without identifiers, and its ordinal
//! in the parent; the policy then decides whether the key's recorded
//! identifier is reused or a new one is minted.
//!
//! Once every element has its identifier, `tupletSpan` and `beamSpan`
//! references are rewritten so they name the new identifiers.

use super::generator::IdGenerator;
use super::map::{IdentityMap, IdentityRepository};
use super::xml_id::{Block, IdPath};
use super::IdentityPolicy;
use crate::errors::{ConversionError, ConversionResult};
use crate::models::{
    BeamSpan, Event, Layer, LayerItem, Measure, MeasureStaff, Section, SectionBody, Staff,
    StaffContent, TupletSpan,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Hex digits of the content hash kept in a key
const KEY_HASH_LEN: usize = 16;

/// Fresh blocks tried before giving up on an unused identifier
const MAX_MINT_ATTEMPTS: usize = 64;

/// Structural level an element occupies in the identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Level {
    Section,
    Staff,
    Measure,
    Layer,
    Element,
}

/// Ancestor blocks known at a point of the walk
#[derive(Clone, Copy, Debug)]
struct Context {
    section: Block,
    staff: Option<Block>,
    measure: Option<Block>,
    layer: Option<Block>,
}

impl Context {
    fn root(block: Block) -> Self {
        Self {
            section: block,
            staff: None,
            measure: None,
            layer: None,
        }
    }

    /// Identifier of an element at `level` whose own block is `block`
    fn path(&self, level: Level, block: Block) -> IdPath {
        let mut path = IdPath {
            section: self.section,
            staff: self.staff,
            measure: self.measure,
            layer: self.layer,
            element: block,
        };
        match level {
            Level::Section => path.section = block,
            Level::Staff => path.staff = Some(block),
            Level::Measure => path.measure = Some(block),
            Level::Layer => path.layer = Some(block),
            Level::Element => {}
        }
        path
    }
}

impl From<IdPath> for Context {
    fn from(path: IdPath) -> Self {
        Self {
            section: path.section,
            staff: path.staff,
            measure: path.measure,
            layer: path.layer,
        }
    }
}

/// Content key: `<kind>:<hash of parent key and printed form>:<ordinal>`
fn content_key(kind: &str, parent: &str, printed: &str, ordinal: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parent.as_bytes());
    hasher.update(b"\n");
    hasher.update(printed.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}:{}:{}", kind, &digest[..KEY_HASH_LEN], ordinal)
}

fn printed_event(event: &Event) -> String {
    format!("{:?}", event.without_ids())
}

fn printed_tuplet_span(span: &TupletSpan) -> String {
    format!(
        "tupletSpan {:?} {:?} n={} participants={}",
        span.duration,
        span.ratio,
        span.n,
        span.plist.len()
    )
}

fn printed_beam_span(beam: &BeamSpan) -> String {
    format!("beamSpan participants={}", beam.plist.len())
}

/// Old and new identifier of each item of one (staff, layer) stream
type StreamLog = Vec<Option<(Option<String>, String)>>;

/// Assigns identifiers to one section at a time
pub struct IdentityAssigner<'g> {
    policy: IdentityPolicy,
    map: IdentityMap,
    generator: &'g mut dyn IdGenerator,
    streams: BTreeMap<(u32, u32), StreamLog>,
    /// Identifiers handed out during the current pass
    taken: HashSet<String>,
}

impl<'g> IdentityAssigner<'g> {
    pub fn new(
        policy: IdentityPolicy,
        map: IdentityMap,
        generator: &'g mut dyn IdGenerator,
    ) -> Self {
        Self {
            policy,
            map,
            generator,
            streams: BTreeMap::new(),
            taken: HashSet::new(),
        }
    }

    pub fn map(&self) -> &IdentityMap {
        &self.map
    }

    pub fn into_map(self) -> IdentityMap {
        self.map
    }

    /// Identifier for the element keyed `key`
    fn resolve(
        &mut self,
        key: &str,
        existing: Option<&str>,
        context: Option<&Context>,
        level: Level,
    ) -> ConversionResult<IdPath> {
        if self.policy == IdentityPolicy::ContentAddressed {
            let stored = self.map.id_for(key).and_then(|id| id.parse::<IdPath>().ok());
            if let Some(stored) = stored {
                if self.taken.insert(stored.to_string()) {
                    return Ok(stored);
                }
                log::debug!("Recorded identifier {} already used in this section", stored);
            }
            if let Some(kept) = existing.and_then(|id| id.parse::<IdPath>().ok()) {
                let id = kept.to_string();
                if self.taken.insert(id.clone()) {
                    self.map.insert(key, id);
                    return Ok(kept);
                }
                log::debug!("Existing identifier {} already used in this section", kept);
            }
        }

        let path = self.mint(context, level)?;
        if self.policy == IdentityPolicy::ContentAddressed {
            self.map.insert(key, path.to_string());
        }
        Ok(path)
    }

    /// New identifier not yet used in this pass
    fn mint(&mut self, context: Option<&Context>, level: Level) -> ConversionResult<IdPath> {
        for _ in 0..MAX_MINT_ATTEMPTS {
            let block = self.generator.next_block()?;
            let path = match context {
                Some(context) => context.path(level, block),
                None => Context::root(block).path(Level::Section, block),
            };
            if self.taken.insert(path.to_string()) {
                return Ok(path);
            }
        }
        Err(ConversionError::InvalidIdentifier(format!(
            "no unused identifier after {} attempts",
            MAX_MINT_ATTEMPTS
        )))
    }

    /// Stamp identifiers on every element of `section`
    pub fn assign(&mut self, section: &mut Section) -> ConversionResult<()> {
        self.streams.clear();
        self.taken.clear();

        // Step 1: section and score definition
        let section_key = content_key("section", "", "section", 0);
        let section_path = self.resolve(&section_key, section.id.as_deref(), None, Level::Section)?;
        section.id = Some(section_path.to_string());
        let root = Context::root(section_path.section);

        let score_key = content_key(
            "scoreDef",
            &section_key,
            &format!("{:?}", section.score_def.staff_group),
            0,
        );
        let score_path = self.resolve(&score_key, section.score_def.id.as_deref(), Some(&root), Level::Element)?;
        section.score_def.id = Some(score_path.to_string());

        // Step 2: body, top-down
        match &mut section.body {
            SectionBody::Measures(measures) => {
                for (ordinal, measure) in measures.iter_mut().enumerate() {
                    self.assign_measure(measure, ordinal, &section_key, &root)?;
                }
            }
            SectionBody::Staffs(staffs) => {
                for (ordinal, staff) in staffs.iter_mut().enumerate() {
                    self.assign_staff(staff, ordinal, &section_key, &root)?;
                }
            }
        }

        // Step 3: point span references at the new identifiers
        let streams = std::mem::take(&mut self.streams);
        remap_references(&mut section.body, &streams);

        log::info!(
            "Assigned identifiers to section {} ({} recorded keys)",
            section_path,
            self.map.len()
        );
        Ok(())
    }

    fn assign_measure(
        &mut self,
        measure: &mut Measure,
        ordinal: usize,
        parent_key: &str,
        context: &Context,
    ) -> ConversionResult<()> {
        let key = content_key("measure", parent_key, &format!("measure n={}", measure.n), ordinal);
        let path = self.resolve(&key, measure.id.as_deref(), Some(context), Level::Measure)?;
        measure.id = Some(path.to_string());
        let inner = Context::from(path);

        for (ordinal, staff) in measure.staffs.iter_mut().enumerate() {
            self.assign_measure_staff(staff, Level::Staff, ordinal, &key, &inner)?;
        }
        Ok(())
    }

    /// One staff's share of a measure
    fn assign_measure_staff(
        &mut self,
        staff: &mut MeasureStaff,
        level: Level,
        ordinal: usize,
        parent_key: &str,
        context: &Context,
    ) -> ConversionResult<()> {
        let key = content_key("staff", parent_key, &format!("staff n={}", staff.n), ordinal);
        let path = self.resolve(&key, staff.id.as_deref(), Some(context), level)?;
        staff.id = Some(path.to_string());
        let inner = Context::from(path);

        for (ordinal, layer) in staff.layers.iter_mut().enumerate() {
            self.assign_layer(layer, staff.n, ordinal, &key, &inner)?;
        }
        Ok(())
    }

    /// A staff of an unmeasured body
    fn assign_staff(
        &mut self,
        staff: &mut Staff,
        ordinal: usize,
        parent_key: &str,
        context: &Context,
    ) -> ConversionResult<()> {
        let key = content_key("staff", parent_key, &format!("staff n={}", staff.n), ordinal);
        let path = self.resolve(&key, staff.id.as_deref(), Some(context), Level::Staff)?;
        staff.id = Some(path.to_string());
        let inner = Context::from(path);

        match &mut staff.content {
            StaffContent::Layers(layers) => {
                for (ordinal, layer) in layers.iter_mut().enumerate() {
                    self.assign_layer(layer, staff.n, ordinal, &key, &inner)?;
                }
            }
            StaffContent::Measures(measured) => {
                // Pre-measured material: each entry stands in for a measure
                for (ordinal, entry) in measured.iter_mut().enumerate() {
                    self.assign_measure_staff(entry, Level::Measure, ordinal, &key, &inner)?;
                }
            }
        }
        Ok(())
    }

    fn assign_layer(
        &mut self,
        layer: &mut Layer,
        staff_n: u32,
        ordinal: usize,
        parent_key: &str,
        context: &Context,
    ) -> ConversionResult<()> {
        let key = content_key("layer", parent_key, &format!("layer n={}", layer.n), ordinal);
        let path = self.resolve(&key, layer.id.as_deref(), Some(context), Level::Layer)?;
        layer.id = Some(path.to_string());
        let inner = Context::from(path);

        let mut log: StreamLog = Vec::with_capacity(layer.items.len());
        for (ordinal, item) in layer.items.iter_mut().enumerate() {
            let entry = match item {
                LayerItem::Event(event) => {
                    let item_key = content_key(event.tag(), &key, &printed_event(event), ordinal);
                    let old = event.id().map(str::to_string);
                    let new = self
                        .resolve(&item_key, old.as_deref(), Some(&inner), Level::Element)?
                        .to_string();
                    *event.id_mut() = Some(new.clone());
                    if let Event::Chord(chord) = event {
                        for (head_ordinal, head) in chord.heads.iter_mut().enumerate() {
                            let head_key = content_key(
                                "note",
                                &item_key,
                                &format!("{:?} {:?} {:?}", head.pitch, head.tie, head.accid_display),
                                head_ordinal,
                            );
                            let head_path = self.resolve(&head_key, head.id.as_deref(), Some(&inner), Level::Element)?;
                            head.id = Some(head_path.to_string());
                        }
                    }
                    Some((old, new))
                }
                LayerItem::TupletSpan(span) => {
                    let item_key = content_key("tupletSpan", &key, &printed_tuplet_span(span), ordinal);
                    let old = span.id.clone();
                    let new = self
                        .resolve(&item_key, old.as_deref(), Some(&inner), Level::Element)?
                        .to_string();
                    span.id = Some(new.clone());
                    Some((old, new))
                }
                LayerItem::BeamSpan(beam) => {
                    let item_key = content_key("beamSpan", &key, &printed_beam_span(beam), ordinal);
                    let old = beam.id.clone();
                    let new = self
                        .resolve(&item_key, old.as_deref(), Some(&inner), Level::Element)?
                        .to_string();
                    beam.id = Some(new.clone());
                    Some((old, new))
                }
                LayerItem::StaffDef(_) => None,
            };
            log.push(entry);
        }

        self.streams
            .entry((staff_n, layer.n))
            .or_default()
            .extend(log);
        Ok(())
    }
}

/// Every layer of a body with its staff index, in document order
fn layers_mut(body: &mut SectionBody) -> Vec<(u32, &mut Layer)> {
    let mut layers = Vec::new();
    match body {
        SectionBody::Measures(measures) => {
            for measure in measures.iter_mut() {
                for staff in measure.staffs.iter_mut() {
                    let n = staff.n;
                    layers.extend(staff.layers.iter_mut().map(|layer| (n, layer)));
                }
            }
        }
        SectionBody::Staffs(staffs) => {
            for staff in staffs.iter_mut() {
                let n = staff.n;
                match &mut staff.content {
                    StaffContent::Layers(own) => {
                        layers.extend(own.iter_mut().map(|layer| (n, layer)));
                    }
                    StaffContent::Measures(measured) => {
                        for entry in measured.iter_mut() {
                            layers.extend(entry.layers.iter_mut().map(|layer| (n, layer)));
                        }
                    }
                }
            }
        }
    }
    layers
}

/// Rewrite span references of each (staff, layer) stream
///
/// A provisional identifier may occur more than once in a stream, so a
/// tuplet span resolves each reference to the next item carrying it and a
/// beam span to the previous one.
fn remap_references(body: &mut SectionBody, streams: &BTreeMap<(u32, u32), StreamLog>) {
    let mut items: BTreeMap<(u32, u32), Vec<&mut LayerItem>> = BTreeMap::new();
    for (staff_n, layer) in layers_mut(body) {
        items
            .entry((staff_n, layer.n))
            .or_default()
            .extend(layer.items.iter_mut());
    }

    for (stream, stream_items) in items {
        let Some(log) = streams.get(&stream) else {
            continue;
        };
        let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
        for (position, entry) in log.iter().enumerate() {
            if let Some((Some(old), _)) = entry {
                positions.entry(old.as_str()).or_default().push(position);
            }
        }

        let lookup = |old: &str, at: usize, forward: bool| -> Option<String> {
            let list = positions.get(old)?;
            let found = if forward {
                let index = list.partition_point(|&p| p <= at);
                *list.get(index)?
            } else {
                let index = list.partition_point(|&p| p < at);
                *list.get(index.checked_sub(1)?)?
            };
            log.get(found)?.as_ref().map(|(_, new)| new.clone())
        };
        let rewrite = |reference: &mut String, at: usize, forward: bool| {
            if let Some(new) = lookup(reference.as_str(), at, forward) {
                *reference = new;
            }
        };

        for (at, item) in stream_items.into_iter().enumerate() {
            match item {
                LayerItem::TupletSpan(span) => {
                    span.plist.iter_mut().for_each(|r| rewrite(r, at, true));
                    span.startid.iter_mut().for_each(|r| rewrite(r, at, true));
                    span.endid.iter_mut().for_each(|r| rewrite(r, at, true));
                }
                LayerItem::BeamSpan(beam) => {
                    beam.plist.iter_mut().for_each(|r| rewrite(r, at, false));
                    beam.startid.iter_mut().for_each(|r| rewrite(r, at, false));
                    beam.endid.iter_mut().for_each(|r| rewrite(r, at, false));
                }
                LayerItem::Event(_) | LayerItem::StaffDef(_) => {}
            }
        }
    }
}

/// Load the section's map, assign identifiers, and commit the map back
///
/// Nothing is written unless assignment succeeds. The fresh-random policy
/// neither loads nor commits.
pub fn assign_and_commit(
    section: &mut Section,
    repository: &mut dyn IdentityRepository,
    section_key: &str,
    policy: IdentityPolicy,
    generator: &mut dyn IdGenerator,
) -> ConversionResult<IdentityMap> {
    let map = match policy {
        IdentityPolicy::ContentAddressed => repository.load(section_key)?,
        IdentityPolicy::FreshRandom => IdentityMap::new(),
    };

    let mut assigner = IdentityAssigner::new(policy, map, generator);
    assigner.assign(section)?;
    let map = assigner.into_map();

    if policy == IdentityPolicy::ContentAddressed {
        repository.commit(section_key, &map)?;
    }
    Ok(map)
}
