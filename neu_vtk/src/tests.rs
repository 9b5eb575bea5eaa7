use std::collections::BTreeMap;
use std::fs;

use nalgebra::Vector3;

use neu::prelude::*;

use crate::prelude::*;

/// Builds the node table for a small tetrahedron-ish point cloud.
fn test_nodes() -> NodeTable {
  return NodeTable::from([
    (1, Vector3::new(0.0, 0.0, 0.0)),
    (2, Vector3::new(1.0, 0.0, 0.0)),
    (3, Vector3::new(0.0, 1.0, 0.0)),
    (4, Vector3::new(0.0, 0.0, 1.0)),
  ]);
}

/// Two triangles with different properties, sharing nodes.
fn test_elements() -> Vec<Element> {
  return vec![
    Element { id: 10, prop_id: 7, topology: 2, nodes: vec![1, 2, 3] },
    Element { id: 11, prop_id: 8, topology: 2, nodes: vec![1, 3, 4] },
  ];
}

/// Properties 7 and 8, with materials 1 and 2.
fn test_properties() -> BTreeMap<u32, Property> {
  return BTreeMap::from([
    (7, Property { id: 7, material_id: 1, title: "Coil".to_string() }),
    (8, Property { id: 8, material_id: 2, title: String::new() }),
  ]);
}

/// Builds the two-triangle test mesh.
fn test_mesh() -> Mesh {
  return Mesh::build(&test_nodes(), &test_elements(), &test_properties(), false);
}

/// Builds a nodal output vector from sparse (node, value) pairs.
fn nodal_vector(set: u32, vec: u32, pairs: &[(u32, f64)]) -> OutputVector {
  return OutputVector {
    set_id: set,
    vec_id: vec,
    title: format!("vec-{}", vec),
    ent_type: EntityType::Nodal,
    results: pairs.iter().copied().collect(),
  };
}

/// Builds an elemental output vector from sparse (element, value) pairs.
fn elemental_vector(set: u32, vec: u32, pairs: &[(u32, f64)]) -> OutputVector {
  return OutputVector {
    set_id: set,
    vec_id: vec,
    title: format!("vec-{}", vec),
    ent_type: EntityType::Elemental,
    results: pairs.iter().copied().collect(),
  };
}

#[test]
fn test_topology_table() {
  let entry = |code: i32, nodes: usize| {
    let topo = Topology::from_code(code).unwrap();
    assert_eq!(topo.code(), code);
    assert_eq!(topo.node_count(), nodes);
  };
  entry(9, 1);
  entry(0, 2);
  entry(2, 3);
  entry(3, 6);
  entry(4, 4);
  entry(5, 8);
  entry(6, 4);
  entry(10, 10);
  entry(7, 6);
  entry(11, 15);
  entry(8, 8);
  entry(12, 20);
  assert_eq!(Topology::from_code(1), None);
  assert_eq!(Topology::from_code(42), None);
  assert_eq!(Topology::all().len(), 12);
}

#[test]
fn test_topology_2d_reduction() {
  assert_eq!(Topology::Hex8.reduced_2d(), Topology::Quad4);
  assert_eq!(Topology::Hex20.reduced_2d(), Topology::Quad8);
  assert_eq!(Topology::Wedge6.reduced_2d(), Topology::Tri3);
  assert_eq!(Topology::Wedge15.reduced_2d(), Topology::Tri6);
  // everything else passes through
  for topo in [Topology::Tri3, Topology::Quad4, Topology::Tet10, Topology::Line2] {
    assert_eq!(topo.reduced_2d(), topo);
  }
}

#[test]
fn test_mesh_build() {
  let mesh = test_mesh();
  assert_eq!(mesh.point_count(), 4);
  assert_eq!(mesh.cell_count(), 2);
  assert_eq!(mesh.element_ids, vec![10, 11]);
  assert_eq!(mesh.property_ids, vec![7, 8]);
  assert_eq!(mesh.material_ids, vec![1, 2]);
  assert_eq!(mesh.topology_ids, vec![2, 2]);
  assert_eq!(mesh.unique_props, vec![7, 8]);
  assert!(mesh.discarded.is_empty());
  // points come out in ascending node-ID order
  assert_eq!(&mesh.points[0..3], &[0.0, 0.0, 0.0]);
  assert_eq!(&mesh.points[9..12], &[0.0, 0.0, 1.0]);
}

#[test]
fn test_mesh_id_bijections() {
  let mesh = test_mesh();
  let mut point_indices: Vec<usize> =
    mesh.node_index.values().copied().collect();
  point_indices.sort();
  assert_eq!(point_indices, (0..mesh.point_count()).collect::<Vec<_>>());
  let mut cell_indices: Vec<usize> =
    mesh.cell_index.values().copied().collect();
  cell_indices.sort();
  assert_eq!(cell_indices, (0..mesh.cell_count()).collect::<Vec<_>>());
  // every connectivity entry is a valid point index
  assert!(mesh
    .connectivity
    .iter()
    .all(|i| (*i as usize) < mesh.point_count()));
}

#[test]
fn test_mesh_property_partition() {
  let mesh = test_mesh();
  let total: usize = mesh
    .unique_props
    .iter()
    .map(|p| mesh.cells_with_property(*p).len())
    .sum();
  assert_eq!(total, mesh.cell_count());
  assert_eq!(mesh.cells_with_property(7), vec![0]);
  assert_eq!(mesh.cells_with_property(8), vec![1]);
  assert!(mesh.cells_with_property(99).is_empty());
}

#[test]
fn test_mesh_unknown_topology_discarded() {
  let elements =
    vec![Element { id: 5, prop_id: 7, topology: 55, nodes: vec![1, 2, 3] }];
  let mesh =
    Mesh::build(&test_nodes(), &elements, &test_properties(), false);
  assert_eq!(mesh.cell_count(), 0);
  assert_eq!(mesh.discarded.len(), 1);
  assert_eq!(mesh.discarded[0].id, 5);
  assert_eq!(mesh.discarded[0].reason, DiscardReason::UnknownTopology(55));
}

#[test]
fn test_mesh_short_connectivity_discarded() {
  // a hex with only six nonzero node slots
  let elements = vec![Element {
    id: 10,
    prop_id: 7,
    topology: 8,
    nodes: vec![1, 2, 3, 4, 1, 2],
  }];
  let mesh =
    Mesh::build(&test_nodes(), &elements, &test_properties(), false);
  assert_eq!(mesh.cell_count(), 0);
  assert_eq!(
    mesh.discarded,
    vec![DiscardedElement {
      id: 10,
      reason: DiscardReason::ShortConnectivity { required: 8, got: 6 },
    }]
  );
  assert!(mesh.connectivity.is_empty());
}

#[test]
fn test_mesh_missing_node_discarded() {
  let elements =
    vec![Element { id: 12, prop_id: 7, topology: 2, nodes: vec![1, 2, 99] }];
  let mesh =
    Mesh::build(&test_nodes(), &elements, &test_properties(), false);
  assert_eq!(mesh.cell_count(), 0);
  assert_eq!(mesh.discarded[0].reason, DiscardReason::MissingNode(99));
}

#[test]
fn test_mesh_cell_count_invariant() {
  let mut elements = test_elements();
  elements.push(Element {
    id: 20,
    prop_id: 7,
    topology: 55,
    nodes: vec![1, 2, 3],
  });
  let mesh =
    Mesh::build(&test_nodes(), &elements, &test_properties(), false);
  assert_eq!(mesh.cell_count(), elements.len() - mesh.discarded.len());
}

#[test]
fn test_mesh_unknown_property_material_zero() {
  let elements =
    vec![Element { id: 1, prop_id: 99, topology: 2, nodes: vec![1, 2, 3] }];
  let mesh =
    Mesh::build(&test_nodes(), &elements, &test_properties(), false);
  assert_eq!(mesh.material_ids, vec![0]);
}

#[test]
fn test_mesh_force_2d() {
  // eight corner nodes of a unit cube
  let nodes = NodeTable::from([
    (1, Vector3::new(0.0, 0.0, 0.0)),
    (2, Vector3::new(1.0, 0.0, 0.0)),
    (3, Vector3::new(1.0, 1.0, 0.0)),
    (4, Vector3::new(0.0, 1.0, 0.0)),
    (5, Vector3::new(0.0, 0.0, 1.0)),
    (6, Vector3::new(1.0, 0.0, 1.0)),
    (7, Vector3::new(1.0, 1.0, 1.0)),
    (8, Vector3::new(0.0, 1.0, 1.0)),
  ]);
  let elements = vec![Element {
    id: 1,
    prop_id: 7,
    topology: 8,
    nodes: (1..=8).collect(),
  }];
  let mesh = Mesh::build(&nodes, &elements, &test_properties(), true);
  assert_eq!(mesh.cell_count(), 1);
  assert_eq!(mesh.point_count(), 8);
  // the cell is a quad over the first four nodes...
  assert_eq!(mesh.cell_topos[0], Topology::Quad4);
  assert_eq!(mesh.cell_points(0), &[0, 1, 2, 3]);
  // ...but the recorded topology code is still the hex
  assert_eq!(mesh.topology_ids, vec![8]);
}

#[test]
fn test_resolve_vector_fusion() {
  let mesh = test_mesh();
  let vectors = vec![
    nodal_vector(1, 1, &[(1, 1.0)]),
    nodal_vector(1, 2, &[(2, 2.0)]),
    nodal_vector(1, 3, &[(3, 3.0)]),
    // the emitter's own magnitude record; must be eaten, not attached
    nodal_vector(1, 4, &[(1, 99.0)]),
    // the optional flux record
    nodal_vector(1, 5, &[(4, 4.0)]),
  ];
  let resolved = resolve_channel(Channel::Magnetic, &vectors, 1, &mesh);
  assert_eq!(resolved.point_fields.len(), 2);
  let vec_field = &resolved.point_fields[0];
  assert_eq!(vec_field.name, "B-Vec (T)");
  assert_eq!(vec_field.mag_name, Some("B-Mag (T)"));
  match &vec_field.data {
    FieldArray::WithMagnitude { x, y, z, mag } => {
      assert_eq!(x, &vec![1.0, 0.0, 0.0, 0.0]);
      assert_eq!(y, &vec![0.0, 2.0, 0.0, 0.0]);
      assert_eq!(z, &vec![0.0, 0.0, 3.0, 0.0]);
      // derived norm, not the emitter's record
      assert_eq!(mag, &vec![1.0, 2.0, 3.0, 0.0]);
    }
    other => panic!("expected WithMagnitude, got {:?}", other),
  }
  let flux = &resolved.point_fields[1];
  assert_eq!(flux.name, "Flux (A/m)");
  match &flux.data {
    FieldArray::Scalar { values } => {
      assert_eq!(values, &vec![0.0, 0.0, 0.0, 4.0]);
    }
    other => panic!("expected Scalar, got {:?}", other),
  }
}

#[test]
fn test_resolve_cell_averaging() {
  let mesh = test_mesh();
  // nodal-only channel: cell variants must come from point averaging
  let vectors = vec![
    nodal_vector(1, 1, &[(1, 3.0), (2, 3.0), (3, 3.0), (4, 3.0)]),
    nodal_vector(1, 2, &[]),
    nodal_vector(1, 3, &[]),
  ];
  let resolved = resolve_channel(Channel::Force, &vectors, 1, &mesh);
  assert_eq!(resolved.cell_fields.len(), 1);
  match &resolved.cell_fields[0].data {
    FieldArray::WithMagnitude { x, mag, .. } => {
      // both triangles average x over their three corners
      assert_eq!(x, &vec![3.0, 3.0]);
      assert_eq!(mag, &vec![3.0, 3.0]);
    }
    other => panic!("expected WithMagnitude, got {:?}", other),
  }
}

#[test]
fn test_resolve_elemental_overrides_averaging() {
  let mesh = test_mesh();
  let vectors = vec![
    // nodal group
    nodal_vector(1, 1, &[(1, 1.0)]),
    nodal_vector(1, 2, &[]),
    nodal_vector(1, 3, &[]),
    nodal_vector(1, 4, &[]),
    // elemental group, keyed by element IDs 10 and 11
    elemental_vector(1, 11, &[(10, 5.0), (11, 6.0)]),
    elemental_vector(1, 12, &[]),
    elemental_vector(1, 13, &[]),
    elemental_vector(1, 14, &[]),
  ];
  let resolved = resolve_channel(Channel::Magnetic, &vectors, 1, &mesh);
  // B-Vec comes straight from the elemental records, not from averaging
  let cell_vec = resolved
    .cell_fields
    .iter()
    .find(|f| f.name == "B-Vec (T)")
    .unwrap();
  match &cell_vec.data {
    FieldArray::WithMagnitude { x, .. } => {
      assert_eq!(x, &vec![5.0, 6.0]);
    }
    other => panic!("expected WithMagnitude, got {:?}", other),
  }
}

#[test]
fn test_resolve_heat_scalars() {
  let mesh = test_mesh();
  let vectors = vec![
    nodal_vector(1, 1, &[(1, 10.0)]),
    nodal_vector(1, 2, &[(1, 20.0)]),
  ];
  let resolved = resolve_channel(Channel::Heat, &vectors, 1, &mesh);
  assert_eq!(resolved.point_fields.len(), 2);
  assert_eq!(resolved.point_fields[0].name, "Heat Density (W/m^3)");
  assert_eq!(resolved.point_fields[1].name, "Heat (W)");
  // averaged cell variants exist for both
  assert_eq!(resolved.cell_fields.len(), 2);
}

#[test]
fn test_resolve_wrong_step_dropped() {
  let mesh = test_mesh();
  let vectors = vec![
    nodal_vector(9, 1, &[(1, 1.0)]),
    nodal_vector(9, 2, &[]),
    nodal_vector(9, 3, &[]),
  ];
  let resolved = resolve_channel(Channel::Force, &vectors, 1, &mesh);
  assert!(resolved.point_fields.is_empty());
  assert!(resolved.cell_fields.is_empty());
}

#[test]
fn test_displacement_offsets() {
  let mesh = test_mesh();
  let vectors = vec![
    nodal_vector(1, 1, &[(1, 0.5), (2, 0.5)]),
    nodal_vector(1, 2, &[(2, -1.0)]),
    nodal_vector(1, 3, &[(4, 2.0)]),
  ];
  let offsets = displacement_offsets(&vectors, 1, &mesh).unwrap();
  assert_eq!(offsets.len(), 12);
  assert_eq!(&offsets[0..3], &[0.5, 0.0, 0.0]);
  assert_eq!(&offsets[3..6], &[0.5, -1.0, 0.0]);
  assert_eq!(&offsets[9..12], &[0.0, 0.0, 2.0]);
  // a step with no records yields nothing
  assert!(displacement_offsets(&vectors, 2, &mesh).is_none());
}

#[test]
fn test_build_piece_shares_points() {
  let mesh = test_mesh();
  let cells = mesh.cells_with_property(7);
  let piece = build_piece(&mesh, &mesh.points, &cells, &[], &[]);
  match piece.points {
    vtkio::model::IOBuffer::F64(ref p) => assert_eq!(p, &mesh.points),
    ref other => panic!("expected F64 points, got {:?}", other),
  }
  match piece.cells.cell_verts {
    vtkio::model::VertexNumbers::XML { ref connectivity, ref offsets } => {
      assert_eq!(connectivity, &vec![0, 1, 2]);
      assert_eq!(offsets, &vec![3]);
    }
    ref other => panic!("expected XML cells, got {:?}", other),
  }
  // the four metadata arrays are always attached
  assert_eq!(piece.data.cell.len(), 4);
}

#[test]
fn test_collection_round_trip() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("run.pvd");
  let entries = vec![
    CollectionEntry { timestep: 0.1 + 0.2, file: "run/a.vtm".to_string() },
    CollectionEntry { timestep: 1e-17, file: "run/b.vtm".to_string() },
    CollectionEntry {
      timestep: 12345.678901234567,
      file: "run/c.vtm".to_string(),
    },
  ];
  write_collection(&path, &entries).unwrap();
  let read = read_collection(&path).unwrap();
  // same order, same files, same values to full precision
  assert_eq!(read, entries);
}

#[test]
fn test_collection_rejects_other_xml() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("not.pvd");
  fs::write(&path, "<VTKFile type=\"ImageData\"></VTKFile>").unwrap();
  assert!(matches!(
    read_collection(&path),
    Err(CollectionError::NotACollection)
  ));
}

#[test]
fn test_multiblock_index_content() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("step.vtm");
  let entries = vec![
    (7, "step/step_0.vtu".to_string()),
    (8, "step/step_1.vtu".to_string()),
  ];
  write_multiblock(&path, &entries).unwrap();
  let text = fs::read_to_string(&path).unwrap();
  assert!(text.contains("type=\"vtkMultiBlockDataSet\""));
  assert!(text.contains("<DataSet index=\"0\" name=\"7\" file=\"step/step_0.vtu\"/>"));
  assert!(text.contains("<DataSet index=\"1\" name=\"8\" file=\"step/step_1.vtu\"/>"));
}

/// Wraps content lines in a delimited block (fixture helper).
fn block(id: i32, lines: &[&str]) -> String {
  let mut s = String::from("   -1\n");
  s.push_str(&format!("{}\n", id));
  for line in lines {
    s.push_str(line);
    s.push('\n');
  }
  s.push_str("   -1\n");
  return s;
}

/// A node line with the ID in field 0 and coordinates in fields 11-13.
fn node_line(id: u32, x: f64, y: f64, z: f64) -> String {
  return format!("{},0,0,1,46,0,0,9,0,0,0,{},{},{},", id, x, y, z);
}

/// A minimal static mesh: three nodes, property 7, one Tri3 element.
fn static_mesh_text() -> String {
  let n1 = node_line(1, 0.0, 0.0, 0.0);
  let n2 = node_line(2, 1.0, 0.0, 0.0);
  let n3 = node_line(3, 0.0, 1.0, 0.0);
  let mut text = block(100, &["<NULL>", "4.41"]);
  text += &block(403, &[&n1, &n2, &n3]);
  text += &block(
    402,
    &["7,110,1,25,0,0,0,0,", "Coil", "0,", "0,", "0,", "0,", "0,"],
  );
  text += &block(
    404,
    &[
      "10,124,7,17,2,0,0,0,0,0,",
      "1,2,3,0,0,0,0,0,0,0,",
      "0,0,0,0,0,0,0,0,0,0,",
      "0,", "0,", "0,", "0,",
    ],
  );
  return text;
}

/// A displacement result file with two sets and per-set nodal triplets.
fn displacement_text() -> String {
  let mut set_lines: Vec<String> = Vec::new();
  for (id, value) in [(1, 0.01), (2, 0.02)] {
    set_lines.extend([
      format!("{},0,0,1,0,0,", id),
      format!("step_{}", id),
      "0,0,".to_string(),
      format!("{},0,", value),
      "0,".to_string(),
      "0,".to_string(),
    ]);
  }
  let mut vec_lines: Vec<String> = Vec::new();
  for set in [1u32, 2] {
    for comp in [1u32, 2, 3] {
      vec_lines.extend([
        format!("{},{},1,1,", set, comp),
        format!("DISP-node-{}", comp),
        "0.,0.,0.,".to_string(),
        "0,0,0,0,0,0,0,0,0,0,".to_string(),
        "0,0,0,0,0,0,0,0,0,0,".to_string(),
        "0,0,0,7,0,0,".to_string(),
        "0,0,0,0,0,0,".to_string(),
        // x moves by set index, y and z stay put
        format!(
          "1,3,{0},{0},{0},",
          if comp == 1 { set as f64 * 0.1 } else { 0.0 }
        ),
        "-1,0.,".to_string(),
      ]);
    }
  }
  let set_refs: Vec<&str> = set_lines.iter().map(String::as_str).collect();
  let vec_refs: Vec<&str> = vec_lines.iter().map(String::as_str).collect();
  return block(450, &set_refs) + &block(1051, &vec_refs);
}

#[test]
fn test_convert_static_mesh() {
  let dir = tempfile::tempdir().unwrap();
  fs::write(dir.path().join("post_geom"), static_mesh_text()).unwrap();
  let mut options = ConvertOptions::new(dir.path());
  options.output_dir = dir.path().join("out");
  options.output_name = "run".to_string();
  let summary = convert(&options).unwrap();
  assert_eq!(summary.steps_written, vec![1]);
  assert!(summary.steps_failed.is_empty());
  assert_eq!(summary.discarded_elements, 0);
  // one collection entry at timestep zero
  let entries = read_collection(&summary.pvd).unwrap();
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0].timestep, 0.0);
  assert_eq!(entries[0].file, "run/t_0.000000e+00.vtm");
  // the step document and its single property sub-block exist
  let vtm = dir.path().join("out/run/t_0.000000e+00.vtm");
  let vtm_text = fs::read_to_string(&vtm).unwrap();
  assert!(vtm_text.contains("name=\"7\""));
  let vtu =
    dir.path().join("out/run/t_0.000000e+00/t_0.000000e+00_0.vtu");
  let vtu_bytes = fs::read(&vtu).unwrap();
  let vtu_text = String::from_utf8_lossy(&vtu_bytes);
  assert!(vtu_text.contains("UnstructuredGrid"));
}

#[test]
fn test_convert_two_step_displacement() {
  let dir = tempfile::tempdir().unwrap();
  fs::write(dir.path().join("post_geom"), static_mesh_text()).unwrap();
  fs::write(dir.path().join("disp"), displacement_text()).unwrap();
  let mut options = ConvertOptions::new(dir.path());
  options.output_dir = dir.path().join("out");
  options.output_name = "run".to_string();
  let summary = convert(&options).unwrap();
  assert_eq!(summary.steps_written, vec![1, 2]);
  let entries = read_collection(&summary.pvd).unwrap();
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[0].timestep, 0.01);
  assert_eq!(entries[1].timestep, 0.02);
  assert_eq!(entries[0].file, "run/step_1.vtm");
  assert_eq!(entries[1].file, "run/step_2.vtm");
  for name in ["step_1", "step_2"] {
    assert!(dir.path().join(format!("out/run/{}.vtm", name)).is_file());
    assert!(dir
      .path()
      .join(format!("out/run/{}/{}_0.vtu", name, name))
      .is_file());
  }
}

#[test]
fn test_convert_overwrites_previous_run() {
  let dir = tempfile::tempdir().unwrap();
  fs::write(dir.path().join("post_geom"), static_mesh_text()).unwrap();
  let mut options = ConvertOptions::new(dir.path());
  options.output_dir = dir.path().join("out");
  options.output_name = "run".to_string();
  convert(&options).unwrap();
  // plant a stale file where the step folder lives
  let stale = dir.path().join("out/run/stale.vtm");
  fs::write(&stale, "junk").unwrap();
  convert(&options).unwrap();
  assert!(!stale.exists());
}

#[test]
fn test_convert_missing_mesh_is_fatal() {
  let dir = tempfile::tempdir().unwrap();
  let mut options = ConvertOptions::new(dir.path());
  options.output_dir = dir.path().join("out");
  let err = convert(&options).unwrap_err();
  assert!(matches!(err, ConvertError::UnreadableMesh(_, _)));
  // nothing was written
  assert!(!options.pvd_path().exists());
}

#[test]
fn test_convert_empty_mesh_is_fatal() {
  let dir = tempfile::tempdir().unwrap();
  fs::write(dir.path().join("post_geom"), block(100, &["<NULL>", "4.41"]))
    .unwrap();
  let mut options = ConvertOptions::new(dir.path());
  options.output_dir = dir.path().join("out");
  let err = convert(&options).unwrap_err();
  assert!(matches!(err, ConvertError::EmptyMesh));
}

#[test]
fn test_convert_skips_disabled_channels() {
  let dir = tempfile::tempdir().unwrap();
  fs::write(dir.path().join("post_geom"), static_mesh_text()).unwrap();
  fs::write(dir.path().join("disp"), displacement_text()).unwrap();
  let mut options = ConvertOptions::new(dir.path());
  options.output_dir = dir.path().join("out");
  // the displacement file exists but the channel is switched off
  options.channels.insert(Channel::Displacement, None);
  let summary = convert(&options).unwrap();
  // no sets were found anywhere, so the synthetic static step applies
  assert_eq!(summary.steps_written, vec![1]);
  let entries = read_collection(&summary.pvd).unwrap();
  assert_eq!(entries[0].timestep, 0.0);
}
