//! Structural containers: staff definitions, staffs, measures and sections

use super::duration::Fraction;
use super::elements::Layer;
use crate::errors::{ConversionError, ConversionResult};
use serde::{Deserialize, Serialize};

/// Time signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MeterFields")]
pub struct Meter {
    pub count: u32,
    pub unit: u32,
}

impl Default for Meter {
    fn default() -> Self {
        Self { count: 4, unit: 4 }
    }
}

impl Meter {
    pub fn new(count: u32, unit: u32) -> Self {
        Self { count, unit }
    }

    /// Parse `meter.count` / `meter.unit`
    pub fn parse(count: &str, unit: &str) -> ConversionResult<Self> {
        let count_value = count
            .trim()
            .parse::<u32>()
            .map_err(|_| ConversionError::invalid_value("meter.count", count, "expected a positive integer"))?;
        let unit_value = unit
            .trim()
            .parse::<u32>()
            .map_err(|_| ConversionError::invalid_value("meter.unit", unit, "expected a positive integer"))?;
        Self::checked(count_value, unit_value)
    }

    /// Meter with both terms positive
    pub fn checked(count: u32, unit: u32) -> ConversionResult<Self> {
        if count == 0 {
            return Err(ConversionError::invalid_value("meter.count", "0", "must be positive"));
        }
        if unit == 0 {
            return Err(ConversionError::invalid_value("meter.unit", "0", "must be positive"));
        }
        Ok(Self::new(count, unit))
    }

    /// Maximum duration one measure can hold, in whole notes
    pub fn capacity(&self) -> Fraction {
        Fraction::new(self.count as i64, self.unit as i64)
    }
}

/// Unchecked serde form of `Meter`
#[derive(Deserialize)]
struct MeterFields {
    count: u32,
    unit: u32,
}

impl TryFrom<MeterFields> for Meter {
    type Error = ConversionError;

    fn try_from(fields: MeterFields) -> ConversionResult<Self> {
        Meter::checked(fields.count, fields.unit)
    }
}

/// Clef shape as written in `clef.shape`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClefShape {
    G,
    F,
    C,
    Percussion,
    Tab,
}

impl ClefShape {
    pub fn code(&self) -> &'static str {
        match self {
            ClefShape::G => "G",
            ClefShape::F => "F",
            ClefShape::C => "C",
            ClefShape::Percussion => "perc",
            ClefShape::Tab => "TAB",
        }
    }

    pub fn parse(value: &str) -> ConversionResult<Self> {
        match value.trim() {
            "G" => Ok(ClefShape::G),
            "F" => Ok(ClefShape::F),
            "C" => Ok(ClefShape::C),
            "perc" => Ok(ClefShape::Percussion),
            "TAB" => Ok(ClefShape::Tab),
            other => Err(ConversionError::invalid_value("clef.shape", other, "unknown clef shape")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clef {
    pub shape: ClefShape,
    pub line: u8,
}

impl Clef {
    pub fn new(shape: ClefShape, line: u8) -> Self {
        Self { shape, line }
    }

    pub fn treble() -> Self {
        Self::new(ClefShape::G, 2)
    }

    pub fn bass() -> Self {
        Self::new(ClefShape::F, 4)
    }
}

/// Key signature as a signed count of fifths (positive = sharps)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySignature {
    pub fifths: i8,
}

impl KeySignature {
    pub fn new(fifths: i8) -> Self {
        Self { fifths }
    }

    /// `key.sig` code: "0", "3s", "5f"
    pub fn code(&self) -> String {
        match self.fifths {
            0 => "0".to_string(),
            n if n > 0 => format!("{}s", n),
            n => format!("{}f", -n),
        }
    }

    pub fn parse(value: &str) -> ConversionResult<Self> {
        let trimmed = value.trim();
        let invalid = || ConversionError::invalid_value("key.sig", value, "expected 0, <n>s or <n>f");
        if trimmed == "0" {
            return Ok(Self::new(0));
        }
        let (count, sign) = if let Some(count) = trimmed.strip_suffix('s') {
            (count, 1)
        } else if let Some(count) = trimmed.strip_suffix('f') {
            (count, -1)
        } else {
            return Err(invalid());
        };
        let count: i8 = count.parse().map_err(|_| invalid())?;
        if !(0..=7).contains(&count) {
            return Err(invalid());
        }
        Ok(Self::new(sign * count))
    }
}

/// Per-staff settings, either in the score definition or inline
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffDefinition {
    #[serde(default)]
    pub n: Option<u32>,
    #[serde(default)]
    pub clef: Option<Clef>,
    #[serde(default)]
    pub key: Option<KeySignature>,
    #[serde(default)]
    pub meter: Option<Meter>,
    #[serde(default)]
    pub label: Option<String>,
}

impl StaffDefinition {
    pub fn for_staff(n: u32) -> Self {
        Self {
            n: Some(n),
            ..Self::default()
        }
    }

    /// Overlay the fields `other` sets on top of this definition
    pub fn merge(&mut self, other: &StaffDefinition) {
        if other.clef.is_some() {
            self.clef = other.clef;
        }
        if other.key.is_some() {
            self.key = other.key;
        }
        if other.meter.is_some() {
            self.meter = other.meter;
        }
        if other.label.is_some() {
            self.label = other.label.clone();
        }
    }
}

/// Entry of a staff group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StaffGroupItem {
    Group(StaffGroup),
    Staff(StaffDefinition),
}

/// `<staffGrp>`: nested grouping of staff definitions
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffGroup {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub items: Vec<StaffGroupItem>,
}

impl StaffGroup {
    /// Depth-first search for the first staff definition with index `n`
    pub fn find(&self, n: u32) -> Option<&StaffDefinition> {
        self.items.iter().find_map(|item| match item {
            StaffGroupItem::Staff(def) if def.n == Some(n) => Some(def),
            StaffGroupItem::Staff(_) => None,
            StaffGroupItem::Group(group) => group.find(n),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreDef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub staff_group: StaffGroup,
}

impl ScoreDef {
    pub fn staff_def(&self, n: u32) -> Option<&StaffDefinition> {
        self.staff_group.find(n)
    }
}

/// One staff's share of a measure
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureStaff {
    pub n: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl MeasureStaff {
    pub fn new(n: u32) -> Self {
        Self {
            n,
            id: None,
            layers: Vec::new(),
        }
    }

    pub fn layer(&self, n: u32) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.n == n)
    }

    /// Existing layer `n`, or a new one appended in order of first use
    pub fn layer_mut(&mut self, n: u32) -> &mut Layer {
        match self.layers.iter().position(|layer| layer.n == n) {
            Some(index) => &mut self.layers[index],
            None => {
                self.layers.push(Layer::new(n));
                let last = self.layers.len() - 1;
                &mut self.layers[last]
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub n: u32,
    #[serde(default)]
    pub id: Option<String>,
    /// Inline staff definitions taking effect from this measure
    #[serde(default)]
    pub staff_defs: Vec<StaffDefinition>,
    #[serde(default)]
    pub staffs: Vec<MeasureStaff>,
}

impl Measure {
    pub fn new(n: u32) -> Self {
        Self {
            n,
            ..Self::default()
        }
    }

    pub fn staff(&self, n: u32) -> Option<&MeasureStaff> {
        self.staffs.iter().find(|staff| staff.n == n)
    }

    pub fn staff_mut(&mut self, n: u32) -> &mut MeasureStaff {
        match self.staffs.iter().position(|staff| staff.n == n) {
            Some(index) => &mut self.staffs[index],
            None => {
                self.staffs.push(MeasureStaff::new(n));
                let last = self.staffs.len() - 1;
                &mut self.staffs[last]
            }
        }
    }

    /// Record an inline override, merging with one already present for the staff
    pub fn add_staff_def(&mut self, def: StaffDefinition) {
        match self.staff_defs.iter_mut().find(|existing| existing.n == def.n) {
            Some(existing) => existing.merge(&def),
            None => self.staff_defs.push(def),
        }
    }
}

/// Contents of a staff before segmentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StaffContent {
    /// Parallel voices as unsegmented event streams
    Layers(Vec<Layer>),
    /// Already measured material, one entry per measure
    Measures(Vec<MeasureStaff>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub n: u32,
    #[serde(default)]
    pub id: Option<String>,
    pub content: StaffContent,
}

impl Staff {
    pub fn with_layers(n: u32, layers: Vec<Layer>) -> Self {
        Self {
            n,
            id: None,
            content: StaffContent::Layers(layers),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SectionBody {
    Staffs(Vec<Staff>),
    Measures(Vec<Measure>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub score_def: ScoreDef,
    pub body: SectionBody,
}

impl Section {
    pub fn measures(&self) -> &[Measure] {
        match &self.body {
            SectionBody::Measures(measures) => measures,
            SectionBody::Staffs(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_signature_codes() {
        assert_eq!(KeySignature::new(0).code(), "0");
        assert_eq!(KeySignature::new(3).code(), "3s");
        assert_eq!(KeySignature::new(-5).code(), "5f");
        assert_eq!(KeySignature::parse("5f").unwrap(), KeySignature::new(-5));
        assert_eq!(KeySignature::parse("2s").unwrap(), KeySignature::new(2));
        assert!(KeySignature::parse("8s").is_err());
        assert!(KeySignature::parse("-2").is_err());
    }

    #[test]
    fn test_meter_capacity() {
        assert_eq!(Meter::new(6, 8).capacity(), Fraction::new(3, 4));
        assert_eq!(Meter::default().capacity(), Fraction::from_integer(1));
        assert!(Meter::parse("3", "0").is_err());
        assert_eq!(Meter::parse(" 3", "2 ").unwrap(), Meter::new(3, 2));
    }

    #[test]
    fn test_meter_deserialization_rejects_zero_terms() {
        let meter: Meter = serde_json::from_str(r#"{"count": 3, "unit": 8}"#).unwrap();
        assert_eq!(meter, Meter::new(3, 8));
        assert!(serde_json::from_str::<Meter>(r#"{"count": 4, "unit": 0}"#).is_err());
        assert!(serde_json::from_str::<Meter>(r#"{"count": 0, "unit": 4}"#).is_err());
    }

    #[test]
    fn test_staff_group_lookup_is_depth_first() {
        let group = StaffGroup {
            label: None,
            symbol: Some("brace".to_string()),
            items: vec![
                StaffGroupItem::Group(StaffGroup {
                    items: vec![StaffGroupItem::Staff(StaffDefinition {
                        meter: Some(Meter::new(3, 4)),
                        ..StaffDefinition::for_staff(2)
                    })],
                    ..StaffGroup::default()
                }),
                StaffGroupItem::Staff(StaffDefinition::for_staff(1)),
            ],
        };
        assert_eq!(group.find(2).and_then(|def| def.meter), Some(Meter::new(3, 4)));
        assert!(group.find(1).is_some());
        assert!(group.find(3).is_none());
    }

    #[test]
    fn test_staff_def_merge_keeps_unset_fields() {
        let mut def = StaffDefinition {
            clef: Some(Clef::treble()),
            meter: Some(Meter::new(4, 4)),
            ..StaffDefinition::for_staff(1)
        };
        def.merge(&StaffDefinition {
            clef: Some(Clef::bass()),
            ..StaffDefinition::for_staff(1)
        });
        assert_eq!(def.clef, Some(Clef::bass()));
        assert_eq!(def.meter, Some(Meter::new(4, 4)));
    }
}
