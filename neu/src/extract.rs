//! This module implements the typed extractors: one per block family, each
//! walking the concatenated lines of its family with a fixed per-record
//! stride. Malformed records advance one line and are skipped; nothing in
//! here raises errors for recoverable format issues.

use std::collections::BTreeMap;

use log::{debug, warn};
use nalgebra::Vector3;

use crate::blocks::NeutralFile;
use crate::model::*;
use crate::record::*;

/// Block ID for the file header.
pub const BLOCK_HEADER: i32 = 100;
/// Block ID for properties.
pub const BLOCK_PROPERTIES: i32 = 402;
/// Block ID for nodes.
pub const BLOCK_NODES: i32 = 403;
/// Block ID for elements.
pub const BLOCK_ELEMENTS: i32 = 404;
/// Block ID for output sets.
pub const BLOCK_OUTPUT_SETS: i32 = 450;
/// Block ID for materials.
pub const BLOCK_MATERIALS: i32 = 601;
/// Block ID for output vectors.
pub const BLOCK_OUTPUT_VECTORS: i32 = 1051;

/// Properties and elements are seven lines per record.
const PROP_STRIDE: usize = 7;
/// See `PROP_STRIDE`.
const ELEM_STRIDE: usize = 7;
/// Output sets are six lines per record.
const SET_STRIDE: usize = 6;
/// An output vector record has seven header lines before its value stream.
const VEC_HEADER_LINES: usize = 7;

/// Logs a skipped-record count for one block family, if nonzero.
fn log_skips(block: i32, skipped: usize) {
  if skipped > 0 {
    warn!("Skipped {} malformed record line(s) in block {}.", skipped, block);
  }
}

impl NeutralFile {
  /// Extracts the header from the first block 100, if there is one with at
  /// least a title and a version line.
  pub fn header(&self) -> Option<Header> {
    let block = self.get_blocks(BLOCK_HEADER).first()?;
    if block.lines.len() < 2 {
      return None;
    }
    return Some(Header {
      title: normalize_text(&block.lines[0]),
      version: block.lines[1].trim().to_string(),
    });
  }

  /// Extracts all nodes from block family 403, keyed by node ID. One line
  /// per record: ID in field 0, coordinates in fields 11 through 13.
  pub fn nodes(&self) -> NodeTable {
    let mut nodes = NodeTable::new();
    let mut skipped: usize = 0;
    for line in self.family_lines(BLOCK_NODES) {
      let fields = split_record(line);
      let parsed = (
        id_field(&fields, 0),
        real_field(&fields, 11),
        real_field(&fields, 12),
        real_field(&fields, 13),
      );
      if let (Some(id), Some(x), Some(y), Some(z)) = parsed {
        nodes.insert(id, Vector3::new(x, y, z));
      } else if !fields.is_empty() {
        skipped += 1;
      }
    }
    log_skips(BLOCK_NODES, skipped);
    return nodes;
  }

  /// Extracts all properties from block family 402, keyed by property ID.
  /// Repeated IDs overwrite earlier entries (last wins).
  pub fn properties(&self) -> BTreeMap<u32, Property> {
    let lines: Vec<&str> = self.family_lines(BLOCK_PROPERTIES).collect();
    let mut props = BTreeMap::new();
    let mut skipped: usize = 0;
    let mut i = 0;
    while i < lines.len() {
      let fields = split_record(lines[i]);
      let ids = (id_field(&fields, 0), id_field(&fields, 2));
      if let (Some(id), Some(material_id)) = ids {
        let title = lines
          .get(i + 1)
          .map(|l| normalize_text(l))
          .unwrap_or_default();
        props.insert(id, Property { id, material_id, title });
        i += PROP_STRIDE;
      } else {
        skipped += 1;
        i += 1;
      }
    }
    log_skips(BLOCK_PROPERTIES, skipped);
    return props;
  }

  /// Extracts all elements from block family 404, in file order. The record
  /// head holds the IDs and topology; the next two lines hold connectivity,
  /// concatenated with trailing zeros dropped. A non-integer token on either
  /// connectivity line makes the whole record malformed.
  pub fn elements(&self) -> Vec<Element> {
    let lines: Vec<&str> = self.family_lines(BLOCK_ELEMENTS).collect();
    let mut elements = Vec::new();
    let mut skipped: usize = 0;
    let mut i = 0;
    while i < lines.len() {
      match Self::element_record(&lines, i) {
        Some(element) => {
          elements.push(element);
          i += ELEM_STRIDE;
        }
        None => {
          if !split_record(lines[i]).is_empty() {
            skipped += 1;
          }
          i += 1;
        }
      }
    }
    log_skips(BLOCK_ELEMENTS, skipped);
    return elements;
  }

  /// Decodes one element record starting at a line offset, if well-formed.
  fn element_record(lines: &[&str], at: usize) -> Option<Element> {
    let fields = split_record(lines[at]);
    if fields.len() < 5 {
      return None;
    }
    let id = id_field(&fields, 0)?;
    let prop_id = id_field(&fields, 2)?;
    let topology = int_field(&fields, 4)? as i32;
    let mut nodes: Vec<u32> = Vec::new();
    for &conn in &lines[at + 1..(at + 3).min(lines.len())] {
      let raw = all_int_fields(&split_record(conn))?;
      nodes.extend(
        raw
          .into_iter()
          .filter(|&n| n > 0)
          .map(|n| n as u32),
      );
    }
    return Some(Element { id, prop_id, topology, nodes });
  }

  /// Extracts all materials from block family 601, keyed by material ID.
  /// Only the ID in field 0 is consumed; the payload structure varies and
  /// is ignored.
  pub fn materials(&self) -> BTreeMap<u32, Material> {
    let mut materials = BTreeMap::new();
    for line in self.family_lines(BLOCK_MATERIALS) {
      if let Some(id) = id_field(&split_record(line), 0) {
        materials.insert(id, Material { id });
      }
    }
    return materials;
  }

  /// Extracts all output sets from block family 450, keyed by set ID. Six
  /// lines per record: the set ID heads the first, the title is the second,
  /// the step value heads the fourth.
  pub fn output_sets(&self) -> BTreeMap<u32, OutputSet> {
    let lines: Vec<&str> = self.family_lines(BLOCK_OUTPUT_SETS).collect();
    let mut sets = BTreeMap::new();
    let mut skipped: usize = 0;
    let mut i = 0;
    while i < lines.len() {
      let id = id_field(&split_record(lines[i]), 0);
      let value = lines
        .get(i + 3)
        .and_then(|l| real_field(&split_record(l), 0));
      if let (Some(id), Some(value)) = (id, value) {
        let title = lines
          .get(i + 1)
          .map(|l| normalize_text(l))
          .unwrap_or_default();
        sets.insert(id, OutputSet { id, value, title });
        i += SET_STRIDE;
      } else {
        skipped += 1;
        i += 1;
      }
    }
    log_skips(BLOCK_OUTPUT_SETS, skipped);
    return sets;
  }

  /// Extracts all output vectors from block family 1051, in file order.
  /// Records have a seven-line header followed by a value stream in sparse
  /// or run format, terminated by a `-1` line; see the format notes on
  /// `vector_values`.
  pub fn output_vectors(&self) -> Vec<OutputVector> {
    let lines: Vec<&str> = self.family_lines(BLOCK_OUTPUT_VECTORS).collect();
    let mut vectors = Vec::new();
    let mut skipped: usize = 0;
    let mut i = 0;
    while i < lines.len() {
      match Self::vector_record(&lines, i) {
        Some((vector, next)) => {
          vectors.push(vector);
          i = next;
        }
        None => {
          if !split_record(lines[i]).is_empty() {
            skipped += 1;
          }
          i += 1;
        }
      }
    }
    log_skips(BLOCK_OUTPUT_VECTORS, skipped);
    return vectors;
  }

  /// Decodes one output vector record starting at a line offset. Returns the
  /// vector and the offset of the first line past its terminator.
  fn vector_record(lines: &[&str], at: usize) -> Option<(OutputVector, usize)> {
    let head = split_record(lines[at]);
    let set_id = id_field(&head, 0)?;
    let vec_id = id_field(&head, 1)?;
    // the third header field is a constant marker
    if int_field(&head, 2) != Some(1) {
      return None;
    }
    if at + VEC_HEADER_LINES > lines.len() {
      return None;
    }
    let title = normalize_text(lines[at + 1]);
    // lines at+2 (min/max/abs-max) and at+3..at+4 (component IDs) ignored
    let ent_raw = int_field(&split_record(lines[at + 5]), 3)?;
    let ent_type = EntityType::try_from(ent_raw).ok()?;
    // line at+6 (flags) ignored
    let (results, next) = Self::vector_values(lines, at + VEC_HEADER_LINES);
    debug!(
      "Vector {}/{} ({}): {} value(s).",
      set_id,
      vec_id,
      ent_type,
      results.len()
    );
    let vector = OutputVector { set_id, vec_id, title, ent_type, results };
    return Some((vector, next));
  }

  /// Reads a vector's value stream. Two formats, mixable line by line:
  /// a two-field line is a sparse `(entity, value)` pair; a longer line is a
  /// run `(start, end, values...)` whose value stream continues on
  /// subsequent lines until `end - start + 1` values are gathered. A line
  /// whose first field is `-1` terminates the stream (entity IDs are
  /// positive, so this is unambiguous). Returns the values and the offset
  /// of the first line past the terminator.
  fn vector_values(
    lines: &[&str],
    from: usize,
  ) -> (BTreeMap<u32, f64>, usize) {
    let mut results = BTreeMap::new();
    let mut i = from;
    while i < lines.len() {
      let fields = split_record(lines[i]);
      if int_field(&fields, 0) == Some(-1) {
        i += 1;
        break;
      }
      if fields.len() == 2 {
        if let (Some(ent), Some(value)) =
          (id_field(&fields, 0), real_field(&fields, 1))
        {
          results.insert(ent, value);
        }
        i += 1;
      } else if fields.len() > 2 {
        i = Self::expand_run(lines, i, &mut results);
      } else {
        i += 1;
      }
    }
    return (results, i);
  }

  /// Expands one run record (and its continuation lines) into the results
  /// map. Returns the offset of the first unconsumed line; a terminator hit
  /// mid-run is left for the caller.
  fn expand_run(
    lines: &[&str],
    at: usize,
    results: &mut BTreeMap<u32, f64>,
  ) -> usize {
    let fields = split_record(lines[at]);
    let span = (id_field(&fields, 0), id_field(&fields, 1));
    let (start, end) = match span {
      (Some(s), Some(e)) if e >= s => (s, e),
      _ => return at + 1,
    };
    let expected = (end - start + 1) as usize;
    let mut values: Vec<f64> = fields[2..]
      .iter()
      .filter_map(|f| f.parse::<f64>().ok())
      .collect();
    let mut i = at + 1;
    while values.len() < expected && i < lines.len() {
      let cont = split_record(lines[i]);
      if int_field(&cont, 0) == Some(-1) {
        break;
      }
      values.extend(cont.iter().filter_map(|f| f.parse::<f64>().ok()));
      i += 1;
    }
    for (k, value) in values.into_iter().take(expected).enumerate() {
      results.insert(start + k as u32, value);
    }
    return i;
  }

  /// Returns the node table as flat arrays for high-throughput consumers:
  /// sorted node IDs and the matching interleaved xyz coordinate buffer.
  pub fn node_arrays(&self) -> (Vec<u32>, Vec<f64>) {
    let nodes = self.nodes();
    let mut ids = Vec::with_capacity(nodes.len());
    let mut coords = Vec::with_capacity(nodes.len() * 3);
    for (id, p) in &nodes {
      ids.push(*id);
      coords.extend([p.x, p.y, p.z]);
    }
    return (ids, coords);
  }
}
