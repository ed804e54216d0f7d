//! Conversion pipeline
//!
//! ```text
//! front-end voices / Section
//!   ↓ [tuplet codec]      canonical flattened spans
//!   ↓ [measurization]     measure × staff × layer
//!   ↓ [beat groups]       beam spans (optional)
//!   ↓ [identity]          xml:ids, map committed on success
//! ConversionOutcome
//! ```

use crate::beat_groups::apply_beams;
use crate::errors::{ConversionResult, ConversionWarning};
use crate::identity::{
    assign_and_commit, IdGenerator, IdentityAssigner, IdentityMap, IdentityPolicy,
    IdentityRepository,
};
use crate::ir::measurization::measurize_section;
use crate::models::{Layer, ScoreDef, Section, SectionBody, Staff, StaffContent};
use crate::settings::ConversionSettings;
use crate::tuplets::{decode_layer, encode_voice, VoiceItem};
use serde::{Deserialize, Serialize};

/// Result of a successful conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOutcome {
    pub section: Section,
    pub warnings: Vec<ConversionWarning>,
    pub identity_map: IdentityMap,
}

/// One staff as a front-end hands it over: parallel voices, tuplets nested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffVoices {
    pub n: u32,
    #[serde(default)]
    pub voices: Vec<Vec<VoiceItem>>,
}

/// Build an unmeasured section from front-end voices, flattening tuplets
pub fn section_from_voices(
    score_def: ScoreDef,
    staffs: Vec<StaffVoices>,
) -> ConversionResult<(Section, Vec<ConversionWarning>)> {
    let mut warnings = Vec::new();
    let mut body = Vec::with_capacity(staffs.len());
    for staff in staffs {
        let mut layers = Vec::with_capacity(staff.voices.len());
        for (index, voice) in staff.voices.iter().enumerate() {
            let flattened = encode_voice(voice)?;
            warnings.extend(flattened.warnings);
            layers.push(Layer::with_items(index as u32 + 1, flattened.items));
        }
        body.push(Staff::with_layers(staff.n, layers));
    }
    Ok((
        Section {
            id: None,
            score_def,
            body: SectionBody::Staffs(body),
        },
        warnings,
    ))
}

/// Bring every unmeasured layer's tuplet spans into canonical form
///
/// Each layer is decoded, which checks every span against the items that
/// follow it, then encoded again.
pub fn normalize_tuplets(section: &mut Section) -> ConversionResult<Vec<ConversionWarning>> {
    let mut warnings = Vec::new();
    let staffs = match &mut section.body {
        SectionBody::Staffs(staffs) => staffs,
        SectionBody::Measures(_) => return Ok(warnings),
    };
    for staff in staffs.iter_mut() {
        if let StaffContent::Layers(layers) = &mut staff.content {
            for layer in layers.iter_mut() {
                let voice = decode_layer(&layer.items)?;
                let flattened = encode_voice(&voice)?;
                warnings.extend(flattened.warnings);
                layer.items = flattened.items;
            }
        }
    }
    Ok(warnings)
}

/// Run the whole engine over `section`
///
/// Any error aborts the conversion; the identity map is committed only
/// when every stage succeeded.
pub fn convert(
    mut section: Section,
    settings: &ConversionSettings,
    repository: &mut dyn IdentityRepository,
    section_key: &str,
    generator: &mut dyn IdGenerator,
) -> ConversionResult<ConversionOutcome> {
    log::info!("Converting section {}", section_key);

    let mut warnings = normalize_tuplets(&mut section)?;

    let (mut section, segment_warnings) = measurize_section(section, settings);
    warnings.extend(segment_warnings);

    if settings.beam_groups {
        apply_beams(&mut section, settings.default_meter);
    }

    let policy = settings.identity_policy;
    let identity_map = if policy == IdentityPolicy::ContentAddressed && !settings.commit_identities {
        let map = repository.load(section_key)?;
        let mut assigner = IdentityAssigner::new(policy, map, generator);
        assigner.assign(&mut section)?;
        assigner.into_map()
    } else {
        assign_and_commit(&mut section, repository, section_key, policy, generator)?
    };

    log::info!(
        "Converted section {}: {} measures, {} warnings",
        section_key,
        section.measures().len(),
        warnings.len()
    );
    Ok(ConversionOutcome {
        section,
        warnings,
        identity_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConversionError;
    use crate::identity::{MemoryRepository, SequentialBlocks};
    use crate::models::{
        Accidental, Denomination, Duration, Event, LayerItem, Note, Pitch, PitchName, TupletRatio,
        TupletSpan,
    };
    use crate::tuplets::{TupletSpec, TupletTree};

    fn eighth(name: PitchName) -> Event {
        Event::Note(Note::new(
            Pitch::new(name, Accidental::Natural, 4),
            Duration::new(Denomination::Eighth, 0),
        ))
    }

    fn triplet_voice() -> Vec<VoiceItem> {
        let mut tree = TupletTree::new(TupletSpec::Ratio(TupletRatio::new(2, 3)));
        let root = tree.root();
        for name in [PitchName::C, PitchName::D, PitchName::E] {
            tree.push_event(root, eighth(name));
        }
        vec![
            VoiceItem::Tuplet(tree),
            VoiceItem::Event(Event::rest(Duration::new(Denomination::Quarter, 0))),
            VoiceItem::Event(eighth(PitchName::F)),
            VoiceItem::Event(eighth(PitchName::G)),
            VoiceItem::Event(Event::rest(Duration::new(Denomination::Quarter, 0))),
        ]
    }

    #[test]
    fn test_convert_voices_end_to_end() {
        let (section, warnings) = section_from_voices(
            ScoreDef::default(),
            vec![StaffVoices {
                n: 1,
                voices: vec![triplet_voice()],
            }],
        )
        .unwrap();
        assert!(warnings.is_empty());

        let mut repository = MemoryRepository::new();
        let mut generator = SequentialBlocks::new();
        let outcome = convert(
            section,
            &ConversionSettings::default(),
            &mut repository,
            "intro",
            &mut generator,
        )
        .unwrap();

        // No meter declared: one warning, 4/4 applied
        assert_eq!(outcome.warnings.len(), 1);
        let measures = outcome.section.measures();
        assert_eq!(measures.len(), 1);

        let items = &measures[0].staffs[0].layers[0].items;
        let span = items[0].as_tuplet_span().unwrap();
        let participants: Vec<&str> = items[1..4].iter().filter_map(LayerItem::id).collect();
        assert_eq!(span.plist, participants);
        assert!(items
            .iter()
            .filter_map(LayerItem::id)
            .all(crate::identity::IdPath::is_valid));

        let beams = items.iter().filter(|i| matches!(i, LayerItem::BeamSpan(_))).count();
        assert_eq!(beams, 2);

        assert_eq!(repository.get("intro"), Some(&outcome.identity_map));
    }

    #[test]
    fn test_malformed_span_aborts_without_commit() {
        let span = LayerItem::TupletSpan(TupletSpan {
            id: Some("s".to_string()),
            duration: None,
            ratio: Some(TupletRatio::new(2, 3)),
            startid: None,
            endid: None,
            plist: vec!["a".into(), "b".into(), "c".into()],
            n: 1,
        });
        let section = Section {
            id: None,
            score_def: ScoreDef::default(),
            body: SectionBody::Staffs(vec![Staff::with_layers(
                1,
                vec![Layer::with_items(1, vec![span, LayerItem::Event(eighth(PitchName::C).with_id("a"))])],
            )]),
        };
        let mut repository = MemoryRepository::new();
        let mut generator = SequentialBlocks::new();
        let result = convert(
            section,
            &ConversionSettings::default(),
            &mut repository,
            "intro",
            &mut generator,
        );
        assert!(matches!(result, Err(ConversionError::MalformedTupletSpan { .. })));
        assert!(repository.get("intro").is_none());
    }

    #[test]
    fn test_content_addressed_without_commit() {
        let (section, _) = section_from_voices(
            ScoreDef::default(),
            vec![StaffVoices {
                n: 1,
                voices: vec![triplet_voice()],
            }],
        )
        .unwrap();
        let settings = ConversionSettings {
            commit_identities: false,
            ..ConversionSettings::default()
        };
        let mut repository = MemoryRepository::new();
        let mut generator = SequentialBlocks::new();
        let outcome = convert(section, &settings, &mut repository, "intro", &mut generator).unwrap();
        assert!(!outcome.identity_map.is_empty());
        assert!(repository.get("intro").is_none());
    }
}
