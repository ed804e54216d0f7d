//! Identity Assignment
//!
//! Stamps hierarchical `xml:id`s on every element of a section.
//!
//! - **xml_id**: the `S…-s…-m…-l…-e…` identifier grammar
//! - **generator**: sources of 7-digit blocks (random or sequential)
//! - **map**: the persisted content-key ↔ identifier map and its stores
//! - **assigner**: the tree walk, plus span reference repair

pub mod assigner;
pub mod generator;
pub mod map;
pub mod xml_id;

pub use assigner::{assign_and_commit, IdentityAssigner};
pub use generator::{IdGenerator, RandomBlocks, SequentialBlocks};
pub use map::{IdentityMap, IdentityRepository, JsonFileRepository, MemoryRepository};
pub use xml_id::{Block, IdPath};

use serde::{Deserialize, Serialize};

/// How identifiers are produced for a conversion
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityPolicy {
    /// Reuse identifiers recorded for unchanged content; mint and record the rest
    #[default]
    ContentAddressed,
    /// Mint every identifier anew; nothing is read or persisted
    FreshRandom,
}
