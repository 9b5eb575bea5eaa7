//! A command-line application to convert FEMAP Neutral solver output to a
//! VTK time-series bundle (a `.pvd` collection plus per-step multi-block
//! documents).

#![allow(clippy::needless_return)]
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::*;
use neu_vtk::prelude::*;

/// The arguments passed to the converter.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about)]
struct Cli {
  /// Output directory for the collection and its step folder.
  #[arg(short = 'o', long = "output-dir", default_value = ".")]
  output_dir: PathBuf,
  /// Run name: the collection becomes <NAME>.pvd and steps go under
  /// <NAME>/.
  #[arg(short = 'n', long = "name", default_value = "output")]
  name: String,
  /// Collapse solid element topologies onto their 2-D faces (bricks to
  /// quads, wedges to triangles).
  #[arg(long = "force-2d")]
  force_2d: bool,
  /// Grid data file format.
  #[arg(long = "format", value_enum, default_value = "xml")]
  format: CliFormat,
  /// Mesh (geometry) file name, relative to the input directory unless an
  /// existing path is given.
  #[arg(long = "mesh", default_value = "post_geom")]
  mesh: PathBuf,
  /// Displacement result file. Pass "none" to skip the channel.
  #[arg(long = "displacement")]
  displacement: Option<String>,
  /// Magnetic result file. Pass "none" to skip the channel.
  #[arg(long = "magnetic")]
  magnetic: Option<String>,
  /// Current result file. Pass "none" to skip the channel.
  #[arg(long = "current")]
  current: Option<String>,
  /// Nodal force result file. Pass "none" to skip the channel.
  #[arg(long = "force")]
  force: Option<String>,
  /// Lorentz force result file. Pass "none" to skip the channel.
  #[arg(long = "lorentz-force")]
  lorentz_force: Option<String>,
  /// Heat result file. Pass "none" to skip the channel.
  #[arg(long = "heat")]
  heat: Option<String>,
  /// Output extra/debug info while parsing and converting.
  #[arg(short = 'v', long = "verbose")]
  verbose: bool,
  /// The directory containing the solver's neutral output files.
  input_dir: PathBuf,
}

/// Wrapper for the output format used by the conversion library.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CliFormat {
  /// XML .vtu documents.
  Xml,
  /// Legacy ASCII .vtk documents.
  LegacyAscii,
}

/// Resolves one channel's file override: absent means the solver's default
/// file name, "none" disables the channel.
fn channel_file(arg: &Option<String>, channel: Channel) -> Option<PathBuf> {
  return match arg {
    None => Some(PathBuf::from(channel.default_file())),
    Some(s) if s.eq_ignore_ascii_case("none") => None,
    Some(s) => Some(PathBuf::from(s)),
  };
}

fn main() {
  // init cli stuff
  let args = Cli::parse();
  let log_level = if args.verbose {
    LevelFilter::Debug
  } else {
    LevelFilter::Info
  };
  env_logger::builder().filter_level(log_level).init();
  if !args.input_dir.is_dir() {
    error!("Provided input path either does not exist or is not a directory!");
    std::process::exit(1);
  }
  // assemble the run configuration
  let mut options = ConvertOptions::new(&args.input_dir);
  options.output_dir = args.output_dir.clone();
  options.output_name = args.name.clone();
  options.force_2d = args.force_2d;
  options.format = match args.format {
    CliFormat::Xml => VtkFormat::Xml,
    CliFormat::LegacyAscii => VtkFormat::LegacyAscii,
  };
  options.mesh = args.mesh.clone();
  let overrides = [
    (Channel::Displacement, &args.displacement),
    (Channel::Magnetic, &args.magnetic),
    (Channel::Current, &args.current),
    (Channel::Force, &args.force),
    (Channel::LorentzForce, &args.lorentz_force),
    (Channel::Heat, &args.heat),
  ];
  for (channel, arg) in overrides {
    options.channels.insert(channel, channel_file(arg, channel));
  }
  // run it
  match convert(&options) {
    Ok(summary) => {
      if !summary.steps_failed.is_empty() {
        warn!("Steps that failed to write: {:?}", summary.steps_failed);
      }
      info!(
        "All done: {} step(s) in {}.",
        summary.steps_written.len(),
        summary.pvd.display()
      );
    }
    Err(e) => {
      error!("Conversion failed: {}", e);
      std::process::exit(1);
    }
  }
}
