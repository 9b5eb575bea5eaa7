//! This module implements the result parser pool: one worker thread per
//! configured channel file, each returning owned sets and vectors. A
//! channel that fails to read reports an error and empty data; it never
//! takes the others down with it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread;

use log::{error, info};

use neu::prelude::{NeutralParser, OutputSet, OutputVector};

use crate::channel::Channel;

/// A result channel file to parse.
#[derive(Clone, Debug)]
pub struct ChannelFile {
  /// Which channel the file feeds.
  pub channel: Channel,
  /// Where it lives.
  pub path: PathBuf,
}

/// What one parse worker produced.
#[derive(Clone, Debug, Default)]
pub struct ChannelOutcome {
  /// The output sets the file declared.
  pub sets: BTreeMap<u32, OutputSet>,
  /// The result vectors, in source-file order.
  pub vectors: Vec<OutputVector>,
  /// The recorded error, when the file could not be read.
  pub error: Option<String>,
}

/// Parses every configured channel file concurrently and returns the
/// outcomes keyed by channel. Workers share nothing; each returns owned
/// results through its join handle.
pub fn parse_channels(
  files: Vec<ChannelFile>,
) -> BTreeMap<Channel, ChannelOutcome> {
  let mut handles = Vec::with_capacity(files.len());
  for file in files {
    let channel = file.channel;
    let handle = thread::Builder::new()
      .name(format!("parse_{}", channel))
      .spawn(move || parse_one(&file))
      .expect("failed to spawn parser thread");
    handles.push((channel, handle));
  }
  let mut outcomes = BTreeMap::new();
  for (channel, handle) in handles {
    let outcome = handle.join().unwrap_or_else(|_| ChannelOutcome {
      error: Some("parser thread panicked".to_string()),
      ..Default::default()
    });
    outcomes.insert(channel, outcome);
  }
  return outcomes;
}

/// Parses a single channel file.
fn parse_one(file: &ChannelFile) -> ChannelOutcome {
  info!("Parsing {} data from {}...", file.channel, file.path.display());
  match NeutralParser::parse_file(&file.path) {
    Ok(neu) => {
      let sets = neu.output_sets();
      let vectors = neu.output_vectors();
      info!(
        "Channel {}: {} set(s), {} vector record(s).",
        file.channel,
        sets.len(),
        vectors.len()
      );
      return ChannelOutcome { sets, vectors, error: None };
    }
    Err(e) => {
      error!(
        "Could not read {} file {}: {}",
        file.channel,
        file.path.display(),
        e
      );
      return ChannelOutcome {
        error: Some(e.to_string()),
        ..Default::default()
      };
    }
  }
}

/// Picks the canonical output-set table: the first channel, in configured
/// channel order, whose set list is non-empty. Channels are expected to
/// agree on the step axis; records referencing other set IDs are dropped
/// later at resolution time.
pub fn canonical_sets(
  outcomes: &BTreeMap<Channel, ChannelOutcome>,
) -> BTreeMap<u32, OutputSet> {
  for channel in Channel::all() {
    if let Some(outcome) = outcomes.get(channel) {
      if !outcome.sets.is_empty() {
        return outcome.sets.clone();
      }
    }
  }
  return BTreeMap::new();
}
