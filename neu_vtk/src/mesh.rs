//! This module implements the mesh builder: it turns the parsed node and
//! element tables into an unstructured grid with stable mappings between
//! the solver's 1-based external IDs and our contiguous internal indices.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use neu::prelude::{Element, NodeTable, Property};

use crate::topology::Topology;

/// Why an element was left out of the grid.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiscardReason {
  /// The FEMAP topology code is not in the supported table.
  UnknownTopology(i32),
  /// The connectivity list is shorter than the topology requires.
  ShortConnectivity {
    /// How many nodes the topology requires.
    required: usize,
    /// How many the element actually supplied.
    got: usize,
  },
  /// The element references a node ID with no matching node.
  MissingNode(u32),
}

/// An element that could not be emitted as a cell.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscardedElement {
  /// The external element ID.
  pub id: u32,
  /// Why it was dropped.
  pub reason: DiscardReason,
}

/// The assembled unstructured grid: a point buffer in ascending node-ID
/// order, one cell per accepted element, the per-cell metadata arrays, and
/// the external-to-internal identity maps. Built once, then shared
/// read-only by the step workers (which clone only the point buffer).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Mesh {
  /// Flat interleaved xyz point coordinates.
  pub points: Vec<f64>,
  /// Cell connectivity as point indices, all cells back to back.
  pub connectivity: Vec<u64>,
  /// Cumulative end offsets into `connectivity`, one per cell.
  pub offsets: Vec<u64>,
  /// The emitted topology of each cell (post 2-D reduction).
  pub cell_topos: Vec<Topology>,
  /// Maps external node IDs to point indices.
  pub node_index: BTreeMap<u32, usize>,
  /// Maps external element IDs to cell indices.
  pub cell_index: BTreeMap<u32, usize>,
  /// Original element ID per cell.
  pub element_ids: Vec<i32>,
  /// Property ID per cell.
  pub property_ids: Vec<i32>,
  /// Material ID per cell; zero when the property is unknown.
  pub material_ids: Vec<i32>,
  /// Original FEMAP topology code per cell (pre-reduction).
  pub topology_ids: Vec<i32>,
  /// Distinct property IDs, in order of first appearance.
  pub unique_props: Vec<i32>,
  /// Elements that could not be emitted.
  pub discarded: Vec<DiscardedElement>,
}

impl Mesh {
  /// Builds the grid from parsed tables. Points come out in ascending
  /// external node-ID order; elements that can't be emitted are logged in
  /// the discard list and leave no trace in the arrays.
  pub fn build(
    nodes: &NodeTable,
    elements: &[Element],
    properties: &BTreeMap<u32, Property>,
    force_2d: bool,
  ) -> Self {
    let mut mesh = Self::default();
    mesh.points.reserve(nodes.len() * 3);
    for (index, (id, p)) in nodes.iter().enumerate() {
      mesh.points.extend([p.x, p.y, p.z]);
      mesh.node_index.insert(*id, index);
    }
    for element in elements {
      mesh.push_element(element, properties, force_2d);
    }
    mesh.unique_props =
      mesh.property_ids.iter().copied().unique().collect();
    if !mesh.discarded.is_empty() {
      warn!(
        "Discarded {} element(s): {:?}",
        mesh.discarded.len(),
        mesh.discarded.iter().map(|d| d.id).collect::<Vec<_>>()
      );
    }
    return mesh;
  }

  /// Tries to emit one element as a cell; records a discard otherwise.
  fn push_element(
    &mut self,
    element: &Element,
    properties: &BTreeMap<u32, Property>,
    force_2d: bool,
  ) {
    let (emit, indices) = match self.cell_for(element, force_2d) {
      Ok(ok) => ok,
      Err(reason) => {
        debug!("Element {} dropped: {:?}", element.id, reason);
        self.discarded.push(DiscardedElement { id: element.id, reason });
        return;
      }
    };
    self.connectivity.extend(indices);
    self.offsets.push(self.connectivity.len() as u64);
    self.cell_topos.push(emit);
    self.element_ids.push(element.id as i32);
    self.property_ids.push(element.prop_id as i32);
    self.material_ids.push(
      properties
        .get(&element.prop_id)
        .map(|p| p.material_id as i32)
        .unwrap_or(0),
    );
    self.topology_ids.push(element.topology);
    self.cell_index.insert(element.id, self.cell_count() - 1);
  }

  /// Resolves an element's emitted topology and point indices, or the
  /// reason it can't be a cell.
  fn cell_for(
    &self,
    element: &Element,
    force_2d: bool,
  ) -> Result<(Topology, Vec<u64>), DiscardReason> {
    let topo = Topology::from_code(element.topology)
      .ok_or(DiscardReason::UnknownTopology(element.topology))?;
    let emit = if force_2d { topo.reduced_2d() } else { topo };
    let required = emit.node_count();
    if element.nodes.len() < required {
      return Err(DiscardReason::ShortConnectivity {
        required,
        got: element.nodes.len(),
      });
    }
    let mut indices: Vec<u64> = Vec::with_capacity(required);
    for node_id in &element.nodes[..required] {
      let index = self
        .node_index
        .get(node_id)
        .ok_or(DiscardReason::MissingNode(*node_id))?;
      indices.push(*index as u64);
    }
    return Ok((emit, indices));
  }

  /// Returns the number of points.
  pub fn point_count(&self) -> usize {
    return self.points.len() / 3;
  }

  /// Returns the number of emitted cells.
  pub fn cell_count(&self) -> usize {
    return self.offsets.len();
  }

  /// Returns the point indices of one cell.
  pub fn cell_points(&self, cell: usize) -> &[u64] {
    let end = self.offsets[cell] as usize;
    let start = if cell == 0 {
      0
    } else {
      self.offsets[cell - 1] as usize
    };
    return &self.connectivity[start..end];
  }

  /// Returns the indices of the cells carrying one property ID, in cell
  /// order.
  pub fn cells_with_property(&self, prop: i32) -> Vec<usize> {
    return self
      .property_ids
      .iter()
      .enumerate()
      .filter(|(_, p)| **p == prop)
      .map(|(i, _)| i)
      .collect();
  }
}
