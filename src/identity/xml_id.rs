//! Lychee identifier grammar
//!
//! `S<7d>-s<7d|me>-m<7d|me>-l<7d|me>-e<7d>`: section, staff, measure and
//! layer blocks of the element's ancestry, then the element's own block.

use crate::errors::ConversionError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^S([1-9]\d{6})-s([1-9]\d{6}|me)-m([1-9]\d{6}|me)-l([1-9]\d{6}|me)-e([1-9]\d{6})$")
        .expect("identifier pattern compiles")
});

/// Placeholder for a level the element does not sit under
const UNASSIGNED: &str = "me";

/// A 7-digit identifier block in `1000000..=9999999`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);

impl Block {
    pub const MIN: u32 = 1_000_000;
    pub const MAX: u32 = 9_999_999;

    pub fn new(value: u32) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Block {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .ok()
            .filter(|_| s.len() == 7)
            .and_then(Block::new)
            .ok_or_else(|| ConversionError::InvalidIdentifier(s.to_string()))
    }
}

/// A parsed Lychee identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IdPath {
    pub section: Block,
    pub staff: Option<Block>,
    pub measure: Option<Block>,
    pub layer: Option<Block>,
    pub element: Block,
}

impl IdPath {
    /// True if `id` follows the Lychee grammar
    pub fn is_valid(id: &str) -> bool {
        ID_PATTERN.is_match(id)
    }
}

fn write_slot(f: &mut fmt::Formatter<'_>, block: Option<Block>) -> fmt::Result {
    match block {
        Some(block) => write!(f, "{}", block),
        None => f.write_str(UNASSIGNED),
    }
}

impl fmt::Display for IdPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}-s", self.section)?;
        write_slot(f, self.staff)?;
        f.write_str("-m")?;
        write_slot(f, self.measure)?;
        f.write_str("-l")?;
        write_slot(f, self.layer)?;
        write!(f, "-e{}", self.element)
    }
}

impl FromStr for IdPath {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConversionError::InvalidIdentifier(s.to_string());
        let captures = ID_PATTERN.captures(s).ok_or_else(invalid)?;

        let slot = |index: usize| -> Result<Option<Block>, ConversionError> {
            match captures.get(index).map(|m| m.as_str()) {
                Some(UNASSIGNED) => Ok(None),
                Some(digits) => digits.parse().map(Some),
                None => Err(invalid()),
            }
        };
        let required = |index: usize| slot(index)?.ok_or_else(invalid);

        Ok(IdPath {
            section: required(1)?,
            staff: slot(2)?,
            measure: slot(3)?,
            layer: slot(4)?,
            element: required(5)?,
        })
    }
}
