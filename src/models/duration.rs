//! Duration model
//!
//! Every rhythmic computation in the crate goes through this module: a
//! (denomination, dots) pair resolves to an exact fraction of a whole note.
//! No floating point is involved so barline comparisons are exact.

use crate::errors::{ConversionError, ConversionResult};
use num_rational::Rational64;
use serde::{Deserialize, Serialize};

/// Exact fraction of a whole note
pub type Fraction = Rational64;

/// Largest number of augmentation dots accepted
pub const MAX_DOTS: u8 = 8;

/// Written note value, ordered from longest to shortest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Denomination {
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "breve")]
    Breve,
    #[serde(rename = "1")]
    Whole,
    #[serde(rename = "2")]
    Half,
    #[serde(rename = "4")]
    Quarter,
    #[serde(rename = "8")]
    Eighth,
    #[serde(rename = "16")]
    N16,
    #[serde(rename = "32")]
    N32,
    #[serde(rename = "64")]
    N64,
    #[serde(rename = "128")]
    N128,
    #[serde(rename = "256")]
    N256,
    #[serde(rename = "512")]
    N512,
    #[serde(rename = "1024")]
    N1024,
    #[serde(rename = "2048")]
    N2048,
}

/// Lookup table in wire order; position 2 ("1") is the whole note
const DENOMINATIONS: [(Denomination, &str); 14] = [
    (Denomination::Long, "long"),
    (Denomination::Breve, "breve"),
    (Denomination::Whole, "1"),
    (Denomination::Half, "2"),
    (Denomination::Quarter, "4"),
    (Denomination::Eighth, "8"),
    (Denomination::N16, "16"),
    (Denomination::N32, "32"),
    (Denomination::N64, "64"),
    (Denomination::N128, "128"),
    (Denomination::N256, "256"),
    (Denomination::N512, "512"),
    (Denomination::N1024, "1024"),
    (Denomination::N2048, "2048"),
];

const WHOLE_INDEX: usize = 2;

impl Denomination {
    /// Parse a wire denomination ("long", "breve", "1", "2", "4", ...)
    pub fn parse(value: &str) -> ConversionResult<Self> {
        DENOMINATIONS
            .iter()
            .find(|(_, name)| *name == value.trim())
            .map(|(denomination, _)| *denomination)
            .ok_or_else(|| ConversionError::UnknownDuration(value.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        DENOMINATIONS[self.index()].1
    }

    fn index(&self) -> usize {
        DENOMINATIONS
            .iter()
            .position(|(denomination, _)| denomination == self)
            .unwrap_or(WHOLE_INDEX)
    }

    /// Undotted value as a fraction of a whole note
    pub fn to_fraction(&self) -> Fraction {
        let index = self.index();
        if index <= WHOLE_INDEX {
            Fraction::from_integer(1 << (WHOLE_INDEX - index))
        } else {
            Fraction::new(1, 1 << (index - WHOLE_INDEX))
        }
    }
}

/// A written duration: denomination plus augmentation dots
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Duration {
    pub denomination: Denomination,
    #[serde(default)]
    pub dots: u8,
}

impl Duration {
    pub fn new(denomination: Denomination, dots: u8) -> Self {
        Self { denomination, dots }
    }

    /// Parse wire attributes `dur` and `dots`
    pub fn parse(dur: &str, dots: u8) -> ConversionResult<Self> {
        let denomination = Denomination::parse(dur)?;
        if dots > MAX_DOTS {
            return Err(ConversionError::invalid_value(
                "dots",
                &dots.to_string(),
                "too many augmentation dots",
            ));
        }
        Ok(Self { denomination, dots })
    }

    /// Exact value: base * (2^(dots+1) - 1) / 2^dots
    pub fn to_fraction(&self) -> Fraction {
        let dots = self.dots.min(MAX_DOTS) as u32;
        let dot_multiplier = Fraction::new((1i64 << (dots + 1)) - 1, 1i64 << dots);
        self.denomination.to_fraction() * dot_multiplier
    }

    /// Find the written duration whose value equals `value`, if any
    pub fn from_fraction(value: Fraction) -> Option<Self> {
        if value <= Fraction::from_integer(0) {
            return None;
        }
        for dots in 0..=MAX_DOTS {
            let dot_multiplier = Fraction::new((1i64 << (dots + 1)) - 1, 1i64 << dots);
            let base = value / dot_multiplier;
            if let Some((denomination, _)) = DENOMINATIONS
                .iter()
                .find(|(denomination, _)| denomination.to_fraction() == base)
            {
                return Some(Self::new(*denomination, dots));
            }
        }
        None
    }

    /// True for an undotted whole note
    pub fn is_plain_whole(&self) -> bool {
        self.denomination == Denomination::Whole && self.dots == 0
    }
}

/// Resolve a (denomination, dots) pair straight to its value
pub fn resolve(dur: &str, dots: u8) -> ConversionResult<Fraction> {
    Ok(Duration::parse(dur, dots)?.to_fraction())
}
