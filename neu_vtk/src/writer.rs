//! This module implements the unstructured-grid writers: per-property grid
//! pieces that share the step's point buffer, the `.vtu` encoders, and the
//! hand-written `.vtm` multi-block index.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vtkio::model::{
  Attribute, Attributes, ByteOrder, Cells, DataSet, IOBuffer,
  UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

use crate::channel::{FieldArray, ResolvedField};
use crate::mesh::Mesh;

/// Output encodings for grid data files.
#[derive(
  Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq,
)]
pub enum VtkFormat {
  /// XML `.vtu` documents (binary-encoded arrays).
  #[default]
  Xml,
  /// Legacy ASCII `.vtk` documents, human-readable but larger.
  LegacyAscii,
}

impl VtkFormat {
  /// Returns the file extension grid data files get under this format.
  pub const fn extension(&self) -> &'static str {
    return match self {
      VtkFormat::Xml => "vtu",
      VtkFormat::LegacyAscii => "vtk",
    };
  }
}

/// Errors produced while encoding or writing output files.
#[derive(Debug, Error)]
pub enum WriteError {
  /// Filesystem trouble.
  #[error("i/o error: {0}")]
  Io(#[from] io::Error),
  /// The VTK encoder refused the data.
  #[error("vtk encoding error: {0}")]
  Vtk(#[from] vtkio::Error),
}

/// Gathers an i32 metadata array down to a cell subset.
fn gather_i32(source: &[i32], cells: &[usize]) -> Vec<i32> {
  return cells.iter().map(|c| source[*c]).collect();
}

/// Gathers an f64 array down to a cell subset.
fn gather_f64(source: &[f64], cells: &[usize]) -> Vec<f64> {
  return cells.iter().map(|c| source[*c]).collect();
}

/// Interleaves three component buffers into the xyz layout VTK wants.
fn interleave(x: &[f64], y: &[f64], z: &[f64]) -> Vec<f64> {
  let mut out = Vec::with_capacity(x.len() * 3);
  for i in 0..x.len() {
    out.extend([x[i], y[i], z[i]]);
  }
  return out;
}

/// Renders one resolved field into VTK attributes, restricted to a cell
/// subset when one is given.
fn field_attributes(
  field: &ResolvedField,
  cells: Option<&[usize]>,
) -> Vec<Attribute> {
  let pick = |values: &[f64]| -> Vec<f64> {
    return match cells {
      Some(cells) => gather_f64(values, cells),
      None => values.to_vec(),
    };
  };
  let mut attributes = Vec::new();
  match &field.data {
    FieldArray::Scalar { values } => {
      attributes.push(
        Attribute::scalars(field.name, 1)
          .with_data(IOBuffer::F64(pick(values))),
      );
    }
    FieldArray::Vector3 { x, y, z } => {
      attributes.push(
        Attribute::vectors(field.name)
          .with_data(IOBuffer::F64(interleave(&pick(x), &pick(y), &pick(z)))),
      );
    }
    FieldArray::WithMagnitude { x, y, z, mag } => {
      attributes.push(
        Attribute::vectors(field.name)
          .with_data(IOBuffer::F64(interleave(&pick(x), &pick(y), &pick(z)))),
      );
      if let Some(mag_name) = field.mag_name {
        attributes.push(
          Attribute::scalars(mag_name, 1)
            .with_data(IOBuffer::F64(pick(mag))),
        );
      }
    }
  }
  return attributes;
}

/// Builds the grid piece for one property sub-block: the full (shared)
/// point buffer, the subset of cells, the four metadata arrays restricted
/// to those cells, and every resolved field.
pub fn build_piece(
  mesh: &Mesh,
  points: &[f64],
  cells: &[usize],
  point_fields: &[ResolvedField],
  cell_fields: &[ResolvedField],
) -> UnstructuredGridPiece {
  let mut connectivity = Vec::new();
  let mut offsets = Vec::with_capacity(cells.len());
  let mut types = Vec::with_capacity(cells.len());
  for cell in cells {
    connectivity.extend_from_slice(mesh.cell_points(*cell));
    offsets.push(connectivity.len() as u64);
    types.push(mesh.cell_topos[*cell].cell_type());
  }
  let mut cell_attributes = vec![
    Attribute::scalars("ElementID", 1)
      .with_data(IOBuffer::I32(gather_i32(&mesh.element_ids, cells))),
    Attribute::scalars("PropertyID", 1)
      .with_data(IOBuffer::I32(gather_i32(&mesh.property_ids, cells))),
    Attribute::scalars("MaterialID", 1)
      .with_data(IOBuffer::I32(gather_i32(&mesh.material_ids, cells))),
    Attribute::scalars("TopologyID", 1)
      .with_data(IOBuffer::I32(gather_i32(&mesh.topology_ids, cells))),
  ];
  for field in cell_fields {
    cell_attributes.extend(field_attributes(field, Some(cells)));
  }
  let mut point_attributes = Vec::new();
  for field in point_fields {
    point_attributes.extend(field_attributes(field, None));
  }
  return UnstructuredGridPiece {
    points: IOBuffer::F64(points.to_vec()),
    cells: Cells {
      cell_verts: VertexNumbers::XML { connectivity, offsets },
      types,
    },
    data: Attributes {
      point: point_attributes,
      cell: cell_attributes,
    },
  };
}

/// Writes one grid piece to disk under the chosen encoding.
pub fn write_grid(
  piece: UnstructuredGridPiece,
  path: &Path,
  format: VtkFormat,
) -> Result<(), WriteError> {
  let vtk = Vtk {
    version: Version { major: 2, minor: 2 },
    title: String::new(),
    byte_order: ByteOrder::LittleEndian,
    file_path: None,
    data: DataSet::inline(piece),
  };
  match format {
    VtkFormat::Xml => {
      let mut buf = Vec::new();
      vtk.write_xml(&mut buf)?;
      fs::write(path, buf)?;
    }
    VtkFormat::LegacyAscii => {
      vtk.export_ascii(path)?;
    }
  }
  return Ok(());
}

/// Writes a `.vtm` multi-block index referencing one grid file per
/// property sub-block, paths relative to the index itself.
pub fn write_multiblock(
  path: &Path,
  entries: &[(i32, String)],
) -> io::Result<()> {
  let mut lines = vec![
    "<?xml version=\"1.0\"?>".to_string(),
    "<VTKFile type=\"vtkMultiBlockDataSet\" version=\"1.0\" \
     byte_order=\"LittleEndian\">"
      .to_string(),
    "  <vtkMultiBlockDataSet>".to_string(),
  ];
  for (index, (prop, file)) in entries.iter().enumerate() {
    lines.push(format!(
      "    <DataSet index=\"{}\" name=\"{}\" file=\"{}\"/>",
      index, prop, file
    ));
  }
  lines.push("  </vtkMultiBlockDataSet>".to_string());
  lines.push("</VTKFile>".to_string());
  return fs::write(path, lines.join("\n"));
}
