//! This module implements the raw block structure of a Neutral file as we
//! interpret it: untyped blocks keyed by their numeric ID, in order of
//! appearance. Typed views live in the `extract` module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single raw data block: the integer ID that followed the opening
/// delimiter plus its content lines, delimiters excluded. Immutable once
/// scanned.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
  /// The numeric block ID.
  pub id: i32,
  /// The content lines, in file order.
  pub lines: Vec<String>,
}

/// This is the output of a Neutral file scanner: every block found, keyed by
/// ID, with appearance order preserved among blocks that share an ID.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NeutralFile {
  /// The detected blocks, keyed by block ID.
  pub blocks: BTreeMap<i32, Vec<Block>>,
  /// The name of the file this came from, if known.
  pub filename: Option<String>,
}

impl NeutralFile {
  /// Instantiates a new Neutral file struct with nothing inside.
  pub fn new() -> Self {
    return Self {
      blocks: BTreeMap::new(),
      filename: None,
    };
  }

  /// Appends a block, preserving appearance order within its ID.
  pub(crate) fn push_block(&mut self, block: Block) {
    self.blocks.entry(block.id).or_default().push(block);
  }

  /// Returns all blocks with a given ID, in order of appearance.
  pub fn get_blocks(&self, id: i32) -> &[Block] {
    return self.blocks.get(&id).map(Vec::as_slice).unwrap_or(&[]);
  }

  /// Iterates over the concatenation of lines across all blocks of one ID.
  /// The typed extractors walk this concatenation so that a block split in
  /// two mid-stream still reads back as one record sequence.
  pub fn family_lines(&self, id: i32) -> impl Iterator<Item = &str> {
    return self
      .get_blocks(id)
      .iter()
      .flat_map(|b| b.lines.iter().map(String::as_str));
  }

  /// Returns the total number of scanned blocks across all IDs.
  pub fn num_blocks(&self) -> usize {
    return self.blocks.values().map(Vec::len).sum();
  }
}
