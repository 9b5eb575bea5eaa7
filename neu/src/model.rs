//! This module defines the typed records the extractors produce: header,
//! properties, elements, materials, output sets and output vectors.

use std::collections::BTreeMap;
use std::fmt::Display;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Nodal coordinates keyed by external node ID.
pub type NodeTable = BTreeMap<u32, Vector3<f64>>;

/// The file header, from block 100.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
  /// The model title; empty when the file held the `<NULL>` sentinel.
  pub title: String,
  /// The emitter's format version string.
  pub version: String,
}

impl Header {
  /// The format version this library was written against. Other versions
  /// parse fine but get a warning.
  pub const GOOD_VERSION: &'static str = "4.41";
}

/// An element property, from block 402. Properties group elements sharing
/// material and solver settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Property {
  /// The property ID.
  pub id: u32,
  /// The ID of the material this property refers to.
  pub material_id: u32,
  /// The property title; may be empty.
  pub title: String,
}

/// An element, from block 404.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Element {
  /// The element ID.
  pub id: u32,
  /// The ID of the property this element belongs to.
  pub prop_id: u32,
  /// The raw topology code; meaning is up to downstream consumers.
  pub topology: i32,
  /// Node IDs from both connectivity lines, trailing zeros dropped.
  pub nodes: Vec<u32>,
}

/// A material, from block 601. Only the ID is meaningful to us; the payload
/// is deliberately ignored.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Material {
  /// The material ID.
  pub id: u32,
}

/// One output set, from block 450: a single step of a transient (or
/// frequency-domain) solution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OutputSet {
  /// The step index.
  pub id: u32,
  /// The time (or frequency) value of the step.
  pub value: f64,
  /// The set title; becomes a file name downstream, after sanitization.
  pub title: String,
}

/// The entity class a result vector is defined over.
#[derive(
  Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub enum EntityType {
  /// Node-centric results.
  Nodal,
  /// Element-centric results.
  Elemental,
}

impl TryFrom<i64> for EntityType {
  type Error = ();

  fn try_from(value: i64) -> Result<Self, Self::Error> {
    return Ok(match value {
      7 => Self::Nodal,
      8 => Self::Elemental,
      _ => return Err(()),
    });
  }
}

impl Display for EntityType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return write!(f, "{}", self.name());
  }
}

impl EntityType {
  /// Returns the integer discriminator the file format uses.
  pub const fn number(&self) -> i64 {
    return match self {
      EntityType::Nodal => 7,
      EntityType::Elemental => 8,
    };
  }

  /// Returns a user-friendly name for the entity class.
  pub const fn name(&self) -> &'static str {
    return match self {
      EntityType::Nodal => "nodal",
      EntityType::Elemental => "elemental",
    };
  }
}

/// One output result vector, from block 1051: a named per-entity scalar
/// stream attached to one output set.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OutputVector {
  /// The ID of the output set this vector belongs to.
  pub set_id: u32,
  /// The vector ID within the set.
  pub vec_id: u32,
  /// The vector title, as written (sanitize before use in paths).
  pub title: String,
  /// The entity class the results are keyed by.
  pub ent_type: EntityType,
  /// The per-entity values, keyed by external entity ID.
  pub results: BTreeMap<u32, f64>,
}
