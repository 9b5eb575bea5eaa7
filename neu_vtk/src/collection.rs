//! This module implements the collection index (`.pvd`): the writer that
//! lists every time step, and a reader used to verify round trips.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of a collection index.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CollectionEntry {
  /// The step's time (or frequency) value.
  pub timestep: f64,
  /// The referenced file, relative to the collection document.
  pub file: String,
}

/// Errors produced while reading a collection document back.
#[derive(Debug, Error)]
pub enum CollectionError {
  /// Filesystem trouble.
  #[error("i/o error: {0}")]
  Io(#[from] io::Error),
  /// The document is not well-formed XML.
  #[error("xml error: {0}")]
  Xml(#[from] roxmltree::Error),
  /// The document is XML but not a VTK collection.
  #[error("not a collection document")]
  NotACollection,
  /// A DataSet entry is missing its timestep or file.
  #[error("malformed dataset entry")]
  BadEntry,
}

/// Writes the collection index. Entries are expected in ascending step
/// order; timesteps are formatted with Rust's shortest round-trip notation
/// so reading them back gives the exact same f64.
pub fn write_collection(
  path: &Path,
  entries: &[CollectionEntry],
) -> io::Result<()> {
  let mut lines = vec![
    "<?xml version=\"1.0\"?>".to_string(),
    "<VTKFile type=\"Collection\" version=\"0.1\" \
     byte_order=\"LittleEndian\">"
      .to_string(),
    "  <Collection>".to_string(),
  ];
  for entry in entries {
    lines.push(format!(
      "    <DataSet timestep=\"{}\" part=\"0\" file=\"{}\"/>",
      entry.timestep, entry.file
    ));
  }
  lines.push("  </Collection>".to_string());
  lines.push("</VTKFile>".to_string());
  return fs::write(path, lines.join("\n"));
}

/// Reads a collection index back into its entry list, in document order.
pub fn read_collection(
  path: &Path,
) -> Result<Vec<CollectionEntry>, CollectionError> {
  let text = fs::read_to_string(path)?;
  let doc = roxmltree::Document::parse(&text)?;
  let root = doc.root_element();
  if root.tag_name().name() != "VTKFile"
    || root.attribute("type") != Some("Collection")
  {
    return Err(CollectionError::NotACollection);
  }
  let collection = root
    .children()
    .find(|n| n.has_tag_name("Collection"))
    .ok_or(CollectionError::NotACollection)?;
  let mut entries = Vec::new();
  for node in collection.children().filter(|n| n.has_tag_name("DataSet")) {
    let timestep = node
      .attribute("timestep")
      .and_then(|t| t.parse::<f64>().ok())
      .ok_or(CollectionError::BadEntry)?;
    let file = node
      .attribute("file")
      .ok_or(CollectionError::BadEntry)?
      .to_string();
    entries.push(CollectionEntry { timestep, file });
  }
  return Ok(entries);
}
