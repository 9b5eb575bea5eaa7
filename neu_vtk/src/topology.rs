//! This module defines the fixed table of FEMAP element topologies we can
//! emit, their VTK cell kinds, and the 2-D reduction used when solids are
//! collapsed onto their faces.

use serde::{Deserialize, Serialize};
use vtkio::model::CellType;

/// Generates the Topology enum and its lookup tables.
macro_rules! gen_topologies {
  (
    $(($vn:ident, $code:literal, $cell:ident, $nodes:literal, $flat:ident),)*
  ) => {
    /// Known FEMAP element topologies. Node ordering is assumed to already
    /// match the canonical order of the target VTK cell kind.
    #[derive(
      Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd,
      Ord
    )]
    #[allow(missing_docs)]
    #[non_exhaustive]
    pub enum Topology {
      $($vn,)*
    }

    impl Topology {
      /// Returns all known topologies.
      pub const fn all() -> &'static [Self] {
        return &[ $(Self::$vn,)* ];
      }

      /// Returns the FEMAP topology code.
      pub const fn code(&self) -> i32 {
        return match self {
          $(Self::$vn => $code,)*
        };
      }

      /// Returns the VTK cell kind this topology maps to.
      pub const fn cell_type(&self) -> CellType {
        return match self {
          $(Self::$vn => CellType::$cell,)*
        };
      }

      /// Returns the number of nodes the cell kind requires. Only this
      /// leading prefix of an element's connectivity is used.
      pub const fn node_count(&self) -> usize {
        return match self {
          $(Self::$vn => $nodes,)*
        };
      }

      /// Returns the topology to emit under 2-D reduction: bricks collapse
      /// to quads and wedges to triangles via a connectivity prefix; other
      /// topologies pass through unchanged.
      pub const fn reduced_2d(&self) -> Self {
        return match self {
          $(Self::$vn => Self::$flat,)*
        };
      }

      /// Looks a topology up by its FEMAP code.
      pub const fn from_code(code: i32) -> Option<Self> {
        return match code {
          $($code => Some(Self::$vn),)*
          _ => None,
        };
      }
    }
  }
}

gen_topologies!(
  (Point1, 9, Vertex, 1, Point1),
  (Line2, 0, Line, 2, Line2),
  (Tri3, 2, Triangle, 3, Tri3),
  (Tri6, 3, QuadraticTriangle, 6, Tri6),
  (Quad4, 4, Quad, 4, Quad4),
  (Quad8, 5, QuadraticQuad, 8, Quad8),
  (Tet4, 6, Tetra, 4, Tet4),
  (Tet10, 10, QuadraticTetra, 10, Tet10),
  (Wedge6, 7, Wedge, 6, Tri3),
  (Wedge15, 11, QuadraticWedge, 15, Tri6),
  (Hex8, 8, Hexahedron, 8, Quad4),
  (Hex20, 12, QuadraticHexahedron, 20, Quad8),
);
