//! Pitch representation
//!
//! Letter name, accidental and octave as written in Lychee-MEI
//! (`pname`, `accid`/`accid.ges`, `oct`).

use crate::errors::{ConversionError, ConversionResult};
use serde::{Deserialize, Serialize};

/// Pitch letter (c..b)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl PitchName {
    pub fn parse(value: &str) -> ConversionResult<Self> {
        match value.trim() {
            "c" => Ok(PitchName::C),
            "d" => Ok(PitchName::D),
            "e" => Ok(PitchName::E),
            "f" => Ok(PitchName::F),
            "g" => Ok(PitchName::G),
            "a" => Ok(PitchName::A),
            "b" => Ok(PitchName::B),
            other => Err(ConversionError::invalid_value("pname", other, "expected c..b")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PitchName::C => "c",
            PitchName::D => "d",
            PitchName::E => "e",
            PitchName::F => "f",
            PitchName::G => "g",
            PitchName::A => "a",
            PitchName::B => "b",
        }
    }
}

/// Accidental spelling, including quarter-tone variants
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    #[default]
    Natural,
    Flat,
    Sharp,
    DoubleFlat,
    DoubleSharp,
    QuarterFlat,
    QuarterSharp,
    ThreeQuarterFlat,
    ThreeQuarterSharp,
}

impl Accidental {
    /// MEI accidental code
    pub fn code(&self) -> &'static str {
        match self {
            Accidental::Natural => "n",
            Accidental::Flat => "f",
            Accidental::Sharp => "s",
            Accidental::DoubleFlat => "ff",
            Accidental::DoubleSharp => "x",
            Accidental::QuarterFlat => "1qf",
            Accidental::QuarterSharp => "1qs",
            Accidental::ThreeQuarterFlat => "3qf",
            Accidental::ThreeQuarterSharp => "3qs",
        }
    }

    pub fn from_code(code: &str) -> ConversionResult<Self> {
        match code.trim() {
            "n" => Ok(Accidental::Natural),
            "f" => Ok(Accidental::Flat),
            "s" => Ok(Accidental::Sharp),
            "ff" => Ok(Accidental::DoubleFlat),
            "x" | "ss" => Ok(Accidental::DoubleSharp),
            "1qf" => Ok(Accidental::QuarterFlat),
            "1qs" => Ok(Accidental::QuarterSharp),
            "3qf" => Ok(Accidental::ThreeQuarterFlat),
            "3qs" => Ok(Accidental::ThreeQuarterSharp),
            other => Err(ConversionError::invalid_value("accid", other, "unknown accidental code")),
        }
    }
}

/// How an accidental is displayed when the input asked for it explicitly
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccidentalDisplay {
    /// Always printed (`!` in LilyPond)
    Forced,
    /// Printed in parentheses (`?` in LilyPond)
    Cautionary,
}

/// A written pitch; octave 4 holds middle C
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pitch {
    pub name: PitchName,
    #[serde(default)]
    pub accidental: Accidental,
    pub octave: i8,
}

impl Pitch {
    pub fn new(name: PitchName, accidental: Accidental, octave: i8) -> Self {
        Self {
            name,
            accidental,
            octave,
        }
    }

    /// Parse `oct` (a possibly negative integer string)
    pub fn parse_octave(value: &str) -> ConversionResult<i8> {
        value
            .trim()
            .parse::<i8>()
            .map_err(|_| ConversionError::invalid_value("oct", value, "expected an integer"))
    }
}
