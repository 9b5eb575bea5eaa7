//! This module implements the per-step workers: each takes the shared
//! read-only mesh, clones its point buffer, applies displacements, resolves
//! every channel's arrays, partitions cells by property, and writes the
//! step's multi-block document.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};

use neu::prelude::{sanitize_title, OutputSet, OutputVector};

use crate::channel::{
  displacement_offsets, resolve_channel, Channel, ResolvedField,
};
use crate::mesh::Mesh;
use crate::writer::{
  build_piece, write_grid, write_multiblock, VtkFormat, WriteError,
};

/// Everything one step worker needs.
pub(crate) struct StepJob {
  /// The output set being written.
  pub set: OutputSet,
  /// The shared mesh; only its point buffer gets cloned.
  pub mesh: Arc<Mesh>,
  /// The shared per-channel vector tables.
  pub vectors: Arc<BTreeMap<Channel, Vec<OutputVector>>>,
  /// The per-run output folder (`<output_dir>/<output_name>`).
  pub step_dir: PathBuf,
  /// The run name; used to build collection-relative paths.
  pub output_name: String,
  /// The grid data encoding.
  pub format: VtkFormat,
}

/// What one step worker reports back.
pub(crate) struct StepReport {
  /// The output set ID.
  pub set_id: u32,
  /// The step's time value.
  pub value: f64,
  /// The written `.vtm` path relative to the collection, or the failure.
  pub result: Result<String, WriteError>,
}

impl StepJob {
  /// Runs the step to completion. Never panics on bad data; all failure
  /// goes into the report.
  pub fn run(self) -> StepReport {
    let set_id = self.set.id;
    let value = self.set.value;
    let result = self.write_step();
    return StepReport { set_id, value, result };
  }

  /// Does the actual work; see the module docs for the shape of it.
  fn write_step(&self) -> Result<String, WriteError> {
    let safe_title = sanitize_title(&self.set.title);
    info!("Processing step {} ({}).", self.set.id, safe_title);
    // private working copy of the geometry
    let mut points = self.mesh.points.clone();
    if let Some(disp) = self.vectors.get(&Channel::Displacement) {
      if let Some(offsets) =
        displacement_offsets(disp, self.set.id, &self.mesh)
      {
        for (p, d) in points.iter_mut().zip(&offsets) {
          *p += *d;
        }
      } else {
        debug!("Step {} has no displacement records.", self.set.id);
      }
    }
    // resolve every attachable channel
    let mut point_fields: Vec<ResolvedField> = Vec::new();
    let mut cell_fields: Vec<ResolvedField> = Vec::new();
    for (channel, vectors) in self.vectors.iter() {
      if *channel == Channel::Displacement {
        continue;
      }
      let resolved =
        resolve_channel(*channel, vectors, self.set.id, &self.mesh);
      point_fields.extend(resolved.point_fields);
      cell_fields.extend(resolved.cell_fields);
    }
    // one sub-block per property, sharing the step's point buffer
    let grid_dir = self.step_dir.join(&safe_title);
    std::fs::create_dir_all(&grid_dir)?;
    let mut entries: Vec<(i32, String)> = Vec::new();
    for prop in &self.mesh.unique_props {
      let cells = self.mesh.cells_with_property(*prop);
      if cells.is_empty() {
        continue;
      }
      let piece = build_piece(
        &self.mesh,
        &points,
        &cells,
        &point_fields,
        &cell_fields,
      );
      let file = format!(
        "{}/{}_{}.{}",
        safe_title,
        safe_title,
        entries.len(),
        self.format.extension()
      );
      write_grid(piece, &self.step_dir.join(&file), self.format)?;
      entries.push((*prop, file));
    }
    let vtm_name = format!("{}.vtm", safe_title);
    write_multiblock(&self.step_dir.join(&vtm_name), &entries)?;
    return Ok(format!("{}/{}", self.output_name, vtm_name));
  }
}
