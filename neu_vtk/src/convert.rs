//! This module implements the one-shot conversion driver: mesh in, VTK
//! time-series bundle out. It owns the run configuration, the output-tree
//! lifecycle, and both thread fan-outs (channel parsing and step writing).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use neu::prelude::{Header, NeutralParser, OutputSet};

use crate::channel::Channel;
use crate::collection::{write_collection, CollectionEntry};
use crate::mesh::Mesh;
use crate::results::{canonical_sets, parse_channels, ChannelFile};
use crate::timestep::{StepJob, StepReport};
use crate::writer::{VtkFormat, WriteError};

/// The full configuration of one conversion run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvertOptions {
  /// Directory holding the solver's output files.
  pub input_dir: PathBuf,
  /// Directory the collection and its folder get written under.
  pub output_dir: PathBuf,
  /// The run name: collection is `<output_name>.pvd`, steps go under
  /// `<output_name>/`.
  pub output_name: String,
  /// Collapse solid topologies onto their 2-D faces.
  pub force_2d: bool,
  /// Grid data encoding.
  pub format: VtkFormat,
  /// The mesh (geometry) file; resolved against `input_dir` unless it
  /// exists as given. Required.
  pub mesh: PathBuf,
  /// Per-channel result files; `None` skips the channel entirely. Files
  /// that simply don't exist are skipped with a log line.
  pub channels: BTreeMap<Channel, Option<PathBuf>>,
}

impl ConvertOptions {
  /// Builds a configuration with the solver's default file names for every
  /// channel.
  pub fn new<P: AsRef<Path>>(input_dir: P) -> Self {
    let channels = Channel::all()
      .iter()
      .map(|c| (*c, Some(PathBuf::from(c.default_file()))))
      .collect();
    return Self {
      input_dir: input_dir.as_ref().to_path_buf(),
      output_dir: PathBuf::from("."),
      output_name: "output".to_string(),
      force_2d: false,
      format: VtkFormat::default(),
      mesh: PathBuf::from("post_geom"),
      channels,
    };
  }

  /// Resolves a configured file name: kept as-is when it already points at
  /// a file, joined onto the input directory otherwise.
  fn resolve(&self, file: &Path) -> PathBuf {
    if file.is_file() {
      return file.to_path_buf();
    } else {
      return self.input_dir.join(file);
    }
  }

  /// The collection file path.
  pub fn pvd_path(&self) -> PathBuf {
    return self.output_dir.join(format!("{}.pvd", self.output_name));
  }

  /// The per-run step folder.
  pub fn step_dir(&self) -> PathBuf {
    return self.output_dir.join(&self.output_name);
  }
}

/// Errors that abort a conversion run.
#[derive(Debug, Error)]
pub enum ConvertError {
  /// The mesh file could not be read at all.
  #[error("could not read mesh file {0}: {1}")]
  UnreadableMesh(PathBuf, #[source] io::Error),
  /// The mesh file parsed but declared no nodes.
  #[error("mesh file contains no nodes")]
  EmptyMesh,
  /// Output-tree housekeeping failed.
  #[error("i/o error: {0}")]
  Io(#[from] io::Error),
  /// The collection could not be written.
  #[error(transparent)]
  Write(#[from] WriteError),
}

/// What a completed run looks like.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvertSummary {
  /// Set IDs whose step documents were written.
  pub steps_written: Vec<u32>,
  /// Set IDs whose step documents failed.
  pub steps_failed: Vec<u32>,
  /// How many elements the mesh builder dropped.
  pub discarded_elements: usize,
  /// Where the collection ended up.
  pub pvd: PathBuf,
}

/// The title given to the synthetic static step used when no result
/// channel declared any output set.
const STATIC_STEP_TITLE: &str = "t_0.000000e+00";

/// Runs one conversion end to end. The only fatal error before output
/// exists is an unreadable (or node-less) mesh file; everything else is
/// logged and skipped.
pub fn convert(options: &ConvertOptions) -> Result<ConvertSummary, ConvertError> {
  // mesh first; nothing is touched on disk if it can't be read
  let mesh_path = options.resolve(&options.mesh);
  info!("Parsing mesh file {}...", mesh_path.display());
  let neu = NeutralParser::parse_file(&mesh_path)
    .map_err(|e| ConvertError::UnreadableMesh(mesh_path.clone(), e))?;
  if let Some(header) = neu.header() {
    if header.version != Header::GOOD_VERSION {
      warn!(
        "Expected format version {}, got {}.",
        Header::GOOD_VERSION,
        header.version
      );
    }
  }
  let nodes = neu.nodes();
  let elements = neu.elements();
  let properties = neu.properties();
  let materials = neu.materials();
  info!(
    "Found {} node(s), {} element(s), {} propert(ies), {} material(s).",
    nodes.len(),
    elements.len(),
    properties.len(),
    materials.len()
  );
  if nodes.is_empty() {
    return Err(ConvertError::EmptyMesh);
  }
  if elements.is_empty() {
    warn!("Mesh file declares no elements; output grids will be empty.");
  }
  let mesh = Mesh::build(&nodes, &elements, &properties, options.force_2d);
  let discarded_elements = mesh.discarded.len();

  // clean output tree from previous runs
  let pvd_path = options.pvd_path();
  let step_dir = options.step_dir();
  if pvd_path.exists() {
    fs::remove_file(&pvd_path)?;
  }
  if step_dir.exists() {
    fs::remove_dir_all(&step_dir)?;
  }
  fs::create_dir_all(&step_dir)?;

  // channel fan-out
  let files: Vec<ChannelFile> = options
    .channels
    .iter()
    .filter_map(|(channel, file)| {
      let file = file.as_ref()?;
      let path = options.resolve(file);
      if !path.is_file() {
        info!("No {} file at {}; skipping.", channel, path.display());
        return None;
      }
      return Some(ChannelFile { channel: *channel, path });
    })
    .collect();
  let outcomes = parse_channels(files);
  let mut sets = canonical_sets(&outcomes);
  if sets.is_empty() {
    // a bare mesh still yields a single static step
    sets.insert(
      1,
      OutputSet {
        id: 1,
        value: 0.0,
        title: STATIC_STEP_TITLE.to_string(),
      },
    );
  }
  let vectors: BTreeMap<Channel, _> = outcomes
    .into_iter()
    .map(|(channel, outcome)| (channel, outcome.vectors))
    .collect();

  // step fan-out over shared read-only state
  let mesh = Arc::new(mesh);
  let vectors = Arc::new(vectors);
  let mut handles = Vec::with_capacity(sets.len());
  for set in sets.into_values() {
    let job = StepJob {
      set,
      mesh: Arc::clone(&mesh),
      vectors: Arc::clone(&vectors),
      step_dir: step_dir.clone(),
      output_name: options.output_name.clone(),
      format: options.format,
    };
    let handle = thread::Builder::new()
      .name(format!("step_{}", job.set.id))
      .spawn(move || job.run())
      .expect("failed to spawn step thread");
    handles.push(handle);
  }
  let mut reports: Vec<StepReport> = Vec::with_capacity(handles.len());
  for handle in handles {
    match handle.join() {
      Ok(report) => reports.push(report),
      Err(_) => warn!("A step worker panicked; its step is lost."),
    }
  }
  reports.sort_by_key(|r| r.set_id);

  // the collection lists only the steps that actually made it to disk
  let mut entries = Vec::new();
  let mut steps_written = Vec::new();
  let mut steps_failed = Vec::new();
  for report in reports {
    match report.result {
      Ok(file) => {
        entries.push(CollectionEntry { timestep: report.value, file });
        steps_written.push(report.set_id);
      }
      Err(e) => {
        warn!("Step {} failed: {}", report.set_id, e);
        steps_failed.push(report.set_id);
      }
    }
  }
  write_collection(&pvd_path, &entries)?;
  info!(
    "Wrote {} step(s) to {}.",
    steps_written.len(),
    pvd_path.display()
  );
  return Ok(ConvertSummary {
    steps_written,
    steps_failed,
    discarded_elements,
    pvd: pvd_path,
  });
}
