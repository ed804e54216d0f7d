//! WASM API for the Lychee-MEI engine
//!
//! JavaScript-facing wrappers around the core operations. Values cross the
//! boundary through serde-wasm-bindgen; errors come back as strings.

use crate::converters::{emit_section, parse_section};
use crate::errors::ConversionWarning;
use crate::identity::{IdentityPolicy, MemoryRepository, RandomBlocks};
use crate::ir::measurization::measurize_section;
use crate::models::{resolve, LayerItem, ScoreDef, Section};
use crate::pipeline::{convert, section_from_voices, StaffVoices};
use crate::settings::ConversionSettings;
use crate::tuplets::{decode, encode, TupletTree};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Serialize)]
struct FractionResult {
    numerator: i64,
    denominator: i64,
}

#[derive(Serialize)]
struct ItemsResult {
    items: Vec<LayerItem>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct SectionResult {
    section: Section,
    warnings: Vec<String>,
}

fn to_js_error(context: &str, e: impl std::fmt::Display) -> JsValue {
    log::error!("{}: {}", context, e);
    JsValue::from_str(&format!("{}: {}", context, e))
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue, what: &str) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| to_js_error(&format!("Invalid {}", what), e))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| to_js_error("Serialization error", e))
}

fn settings_from_js(value: JsValue) -> Result<ConversionSettings, JsValue> {
    if value.is_undefined() || value.is_null() {
        Ok(ConversionSettings::default())
    } else {
        from_js(value, "settings")
    }
}

fn warning_strings(warnings: &[ConversionWarning]) -> Vec<String> {
    warnings.iter().map(ToString::to_string).collect()
}

/// Exact value of a written duration, as `{ numerator, denominator }`
#[wasm_bindgen(js_name = resolveDuration)]
pub fn resolve_duration(dur: &str, dots: u8) -> Result<JsValue, JsValue> {
    let value = resolve(dur, dots).map_err(|e| to_js_error("resolveDuration", e))?;
    to_js(&FractionResult {
        numerator: *value.numer(),
        denominator: *value.denom(),
    })
}

/// Flatten a tuplet tree into a span marker followed by its participants
#[wasm_bindgen(js_name = flattenTuplet)]
pub fn flatten_tuplet(tree_js: JsValue) -> Result<JsValue, JsValue> {
    let tree: TupletTree = from_js(tree_js, "tuplet tree")?;
    let flattened = encode(&tree).map_err(|e| to_js_error("flattenTuplet", e))?;
    to_js(&ItemsResult {
        items: flattened.items,
        warnings: warning_strings(&flattened.warnings),
    })
}

/// Rebuild the tuplet tree that starts at the first item
#[wasm_bindgen(js_name = unflattenTuplet)]
pub fn unflatten_tuplet(items_js: JsValue) -> Result<JsValue, JsValue> {
    let items: Vec<LayerItem> = from_js(items_js, "layer items")?;
    let (tree, _) = decode(&items).map_err(|e| to_js_error("unflattenTuplet", e))?;
    to_js(&tree)
}

/// Build an unmeasured section from front-end voices
#[wasm_bindgen(js_name = sectionFromVoices)]
pub fn section_from_voices_js(score_def_js: JsValue, staffs_js: JsValue) -> Result<JsValue, JsValue> {
    let score_def: ScoreDef = from_js(score_def_js, "score definition")?;
    let staffs: Vec<StaffVoices> = from_js(staffs_js, "staff voices")?;
    let (section, warnings) =
        section_from_voices(score_def, staffs).map_err(|e| to_js_error("sectionFromVoices", e))?;
    to_js(&SectionResult {
        section,
        warnings: warning_strings(&warnings),
    })
}

/// Group an unmeasured section into measures
#[wasm_bindgen(js_name = measurizeSection)]
pub fn measurize_section_js(section_js: JsValue, settings_js: JsValue) -> Result<JsValue, JsValue> {
    let section: Section = from_js(section_js, "section")?;
    let settings = settings_from_js(settings_js)?;
    let (section, warnings) = measurize_section(section, &settings);
    to_js(&SectionResult {
        section,
        warnings: warning_strings(&warnings),
    })
}

/// Full conversion with fresh random identifiers; nothing is persisted
#[wasm_bindgen(js_name = convertSection)]
pub fn convert_section(section_js: JsValue, settings_js: JsValue) -> Result<JsValue, JsValue> {
    let section: Section = from_js(section_js, "section")?;
    let settings = ConversionSettings {
        identity_policy: IdentityPolicy::FreshRandom,
        ..settings_from_js(settings_js)?
    };
    let mut repository = MemoryRepository::new();
    let mut generator = RandomBlocks::new();
    let outcome = convert(section, &settings, &mut repository, "section", &mut generator)
        .map_err(|e| to_js_error("convertSection", e))?;
    to_js(&SectionResult {
        section: outcome.section,
        warnings: warning_strings(&outcome.warnings),
    })
}

#[wasm_bindgen(js_name = emitLycheeMei)]
pub fn emit_lychee_mei(section_js: JsValue) -> Result<String, JsValue> {
    let section: Section = from_js(section_js, "section")?;
    emit_section(&section).map_err(|e| to_js_error("emitLycheeMei", e))
}

#[wasm_bindgen(js_name = parseLycheeMei)]
pub fn parse_lychee_mei(text: &str) -> Result<JsValue, JsValue> {
    let section = parse_section(text).map_err(|e| to_js_error("parseLycheeMei", e))?;
    to_js(&section)
}
