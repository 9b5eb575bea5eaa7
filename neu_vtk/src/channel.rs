//! This module defines the result channels and the per-channel field plans
//! that turn raw per-entity vector records into named VTK arrays. The plans
//! make the triplet-grouping convention explicit instead of guessing it
//! from record titles.

use std::collections::BTreeMap;
use std::fmt::Display;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use neu::prelude::{EntityType, OutputVector};

use crate::mesh::Mesh;

/// One named result stream read from a solver output file.
#[derive(
  Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
#[non_exhaustive]
pub enum Channel {
  /// Nodal displacements; applied to point coordinates, never attached.
  Displacement,
  /// Magnetic flux density.
  Magnetic,
  /// Current density and losses.
  Current,
  /// Nodal forces.
  Force,
  /// Lorentz (J x B) forces.
  LorentzForce,
  /// Heat generation.
  Heat,
}

impl Display for Channel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return write!(f, "{}", self.name());
  }
}

impl Channel {
  /// Returns all channels, in the order they're configured and merged.
  pub const fn all() -> &'static [Self] {
    return &[
      Self::Displacement,
      Self::Magnetic,
      Self::Current,
      Self::Force,
      Self::LorentzForce,
      Self::Heat,
    ];
  }

  /// Returns a stable lowercase name for the channel.
  pub const fn name(&self) -> &'static str {
    return match self {
      Channel::Displacement => "displacement",
      Channel::Magnetic => "magnetic",
      Channel::Current => "current",
      Channel::Force => "force",
      Channel::LorentzForce => "lorentz-force",
      Channel::Heat => "heat",
    };
  }

  /// Returns the result file name the solver writes for this channel.
  pub const fn default_file(&self) -> &'static str {
    return match self {
      Channel::Displacement => "disp",
      Channel::Magnetic => "magnetic",
      Channel::Current => "current",
      Channel::Force => "force",
      Channel::LorentzForce => "force_J_B",
      Channel::Heat => "heat",
    };
  }

  /// Returns the field plans for this channel: how consecutive records of
  /// one entity-type group combine into named arrays. Displacement has no
  /// plans -- its triplet moves geometry instead.
  pub const fn plans(&self) -> &'static [FieldPlan] {
    return match self {
      Channel::Displacement => &[],
      Channel::Magnetic => &[
        FieldPlan::Vector { vec: "B-Vec (T)", mag: "B-Mag (T)" },
        FieldPlan::Scalar { name: "Flux (A/m)", required: false },
      ],
      Channel::Current => &[
        FieldPlan::Vector { vec: "J-Vec (A/m^2)", mag: "J-Mag (A/m^2)" },
        FieldPlan::Scalar { name: "Loss (W/m^3)", required: true },
      ],
      Channel::Force => &[FieldPlan::Vector {
        vec: "F Nodal-Vec (N/m^3)",
        mag: "F Nodal-Mag (N/m^3)",
      }],
      Channel::LorentzForce => &[FieldPlan::Vector {
        vec: "F Lorents-Vec (N/m^3)",
        mag: "F Lorents-Mag (N/m^3)",
      }],
      Channel::Heat => &[
        FieldPlan::Scalar { name: "Heat Density (W/m^3)", required: true },
        FieldPlan::Scalar { name: "Heat (W)", required: true },
      ],
    };
  }
}

/// How consecutive vector records of one entity-type group combine into
/// named output arrays.
#[derive(Copy, Clone, Debug, Serialize, PartialEq, Eq)]
pub enum FieldPlan {
  /// Three component records fused into one vector array. The emitter also
  /// writes its own magnitude record right after the components; that
  /// record is consumed and superseded by the derived Euclidean norm.
  Vector {
    /// Array name for the fused vector.
    vec: &'static str,
    /// Array name for the derived magnitude.
    mag: &'static str,
  },
  /// One record kept as a scalar array.
  Scalar {
    /// Array name.
    name: &'static str,
    /// Whether a missing record is worth a warning.
    required: bool,
  },
}

/// A resolved result array for one entity class of the grid.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum FieldArray {
  /// A plain scalar array.
  Scalar {
    /// One value per entity.
    values: Vec<f64>,
  },
  /// A three-component vector array, one buffer per component.
  Vector3 {
    /// X components.
    x: Vec<f64>,
    /// Y components.
    y: Vec<f64>,
    /// Z components.
    z: Vec<f64>,
  },
  /// A vector array bundled with its derived magnitude.
  WithMagnitude {
    /// X components.
    x: Vec<f64>,
    /// Y components.
    y: Vec<f64>,
    /// Z components.
    z: Vec<f64>,
    /// Euclidean norms.
    mag: Vec<f64>,
  },
}

impl FieldArray {
  /// Returns the number of entities this array covers.
  pub fn len(&self) -> usize {
    return match self {
      FieldArray::Scalar { values } => values.len(),
      FieldArray::Vector3 { x, .. } => x.len(),
      FieldArray::WithMagnitude { x, .. } => x.len(),
    };
  }

  /// Returns true for a zero-entity array.
  pub fn is_empty(&self) -> bool {
    return self.len() == 0;
  }
}

/// A resolved array plus the name(s) it gets attached under.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ResolvedField {
  /// VTK array name for the primary payload.
  pub name: &'static str,
  /// VTK array name for the companion magnitude, when there is one.
  pub mag_name: Option<&'static str>,
  /// The payload.
  pub data: FieldArray,
}

/// The arrays one channel contributes to one time step.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ResolvedChannel {
  /// Arrays to attach per point.
  pub point_fields: Vec<ResolvedField>,
  /// Arrays to attach per cell.
  pub cell_fields: Vec<ResolvedField>,
}

/// Densifies one record's sparse per-entity values onto a contiguous index
/// space, zeros elsewhere. Entity IDs with no mapping are dropped (they
/// belong to a step axis or mesh we don't know about).
fn densify(
  results: &BTreeMap<u32, f64>,
  index: &BTreeMap<u32, usize>,
  len: usize,
) -> Vec<f64> {
  let mut dense = vec![0.0; len];
  for (entity, value) in results {
    if let Some(i) = index.get(entity) {
      dense[*i] = *value;
    }
  }
  return dense;
}

/// Averages a per-point buffer onto cells, over each cell's point indices.
fn average_to_cells(values: &[f64], mesh: &Mesh) -> Vec<f64> {
  let mut averaged = Vec::with_capacity(mesh.cell_count());
  for cell in 0..mesh.cell_count() {
    let points = mesh.cell_points(cell);
    let sum: f64 = points.iter().map(|p| values[*p as usize]).sum();
    averaged.push(sum / points.len() as f64);
  }
  return averaged;
}

/// Walks the channel's plans over one entity-type group of densified
/// record buffers, in source order.
fn apply_plans(
  channel: Channel,
  plans: &'static [FieldPlan],
  group: Vec<Vec<f64>>,
) -> Vec<ResolvedField> {
  let mut records = group.into_iter();
  let mut fields = Vec::new();
  for plan in plans.iter().copied() {
    match plan {
      FieldPlan::Vector { vec, mag } => {
        let triplet = (records.next(), records.next(), records.next());
        let (Some(x), Some(y), Some(z)) = triplet else {
          debug!("Channel {} ran out of records for {}.", channel, vec);
          break;
        };
        let norm: Vec<f64> = x
          .iter()
          .zip(&y)
          .zip(&z)
          .map(|((a, b), c)| (a * a + b * b + c * c).sqrt())
          .collect();
        // the emitter's own magnitude record follows the components; eat it
        let _ = records.next();
        fields.push(ResolvedField {
          name: vec,
          mag_name: Some(mag),
          data: FieldArray::WithMagnitude { x, y, z, mag: norm },
        });
      }
      FieldPlan::Scalar { name, required } => match records.next() {
        Some(values) => fields.push(ResolvedField {
          name,
          mag_name: None,
          data: FieldArray::Scalar { values },
        }),
        None => {
          if required {
            warn!("Channel {} has no record for {}.", channel, name);
          }
        }
      },
    }
  }
  return fields;
}

/// Resolves one channel's arrays for one time step: records for that set,
/// split by entity type in source order, densified, then combined per the
/// channel's plans. Nodal groups yield point arrays plus cell variants
/// (averaged unless the elemental group supplied the same name); elemental
/// groups yield cell arrays only.
pub fn resolve_channel(
  channel: Channel,
  vectors: &[OutputVector],
  step: u32,
  mesh: &Mesh,
) -> ResolvedChannel {
  let nodal: Vec<Vec<f64>> = vectors
    .iter()
    .filter(|v| v.set_id == step && v.ent_type == EntityType::Nodal)
    .map(|v| densify(&v.results, &mesh.node_index, mesh.point_count()))
    .collect();
  let elemental: Vec<Vec<f64>> = vectors
    .iter()
    .filter(|v| v.set_id == step && v.ent_type == EntityType::Elemental)
    .map(|v| densify(&v.results, &mesh.cell_index, mesh.cell_count()))
    .collect();
  let point_fields = apply_plans(channel, channel.plans(), nodal);
  let mut cell_fields = apply_plans(channel, channel.plans(), elemental);
  let covered: Vec<&'static str> =
    cell_fields.iter().map(|f| f.name).collect();
  for field in &point_fields {
    if covered.contains(&field.name) {
      continue;
    }
    cell_fields.push(ResolvedField {
      name: field.name,
      mag_name: field.mag_name,
      data: match &field.data {
        FieldArray::Scalar { values } => FieldArray::Scalar {
          values: average_to_cells(values, mesh),
        },
        FieldArray::Vector3 { x, y, z } => FieldArray::Vector3 {
          x: average_to_cells(x, mesh),
          y: average_to_cells(y, mesh),
          z: average_to_cells(z, mesh),
        },
        FieldArray::WithMagnitude { x, y, z, mag } => {
          FieldArray::WithMagnitude {
            x: average_to_cells(x, mesh),
            y: average_to_cells(y, mesh),
            z: average_to_cells(z, mesh),
            mag: average_to_cells(mag, mesh),
          }
        }
      },
    });
  }
  return ResolvedChannel { point_fields, cell_fields };
}

/// Fuses the displacement triplet for one step into per-point offsets
/// (flat interleaved xyz), or None when the step has no nodal displacement
/// records.
pub fn displacement_offsets(
  vectors: &[OutputVector],
  step: u32,
  mesh: &Mesh,
) -> Option<Vec<f64>> {
  let components: Vec<Vec<f64>> = vectors
    .iter()
    .filter(|v| v.set_id == step && v.ent_type == EntityType::Nodal)
    .take(3)
    .map(|v| densify(&v.results, &mesh.node_index, mesh.point_count()))
    .collect();
  let [x, y, z] = components.try_into().ok()?;
  let mut offsets = Vec::with_capacity(mesh.point_count() * 3);
  for i in 0..x.len() {
    offsets.extend([x[i], y[i], z[i]]);
  }
  return Some(offsets);
}
