//! This module implements the block scanner for Neutral files, and
//! associated structures and enums. The scanner is purely lexical: it finds
//! block boundaries and accumulates lines, deferring all content validation
//! to the typed extractors.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::blocks::{Block, NeutralFile};

/// The block boundary marker: exactly three spaces followed by `-1`.
pub const BLOCK_DELIMITER: &str = "   -1";

/// The scanner states.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
enum ScanState {
  /// Looking for the next block boundary.
  #[default]
  SeekBoundary,
  /// The line after a boundary should hold the block ID.
  ReadId,
  /// Accumulating content lines into the current block.
  Accumulate,
}

/// A scanner might respond this when consuming a line.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScanResponse {
  /// The line was outside any block and wasn't a boundary.
  Skipped,
  /// The line was a block boundary.
  Boundary,
  /// The line held a block ID; a new block was started.
  BlockStart(i32),
  /// The line right after a boundary was a bare `-1`; treated as a stray
  /// delimiter and dropped.
  StrayDelimiter,
  /// The line right after a boundary did not parse as a block ID.
  BadBlockId,
  /// The line was accumulated into the current block.
  Accumulated,
  /// The line terminated the current block.
  Terminator,
}

/// This is the Neutral file scanner -- it doesn't care how lines are fed
/// into it. One-pass, single-thread.
#[derive(Clone, Debug, Default)]
pub struct NeutralParser {
  /// The file being built up.
  file: NeutralFile,
  /// The current scanner state.
  state: ScanState,
  /// The block currently being accumulated, if any.
  current: Option<Block>,
  /// The total number of consumed lines.
  total_lines: usize,
}

impl NeutralParser {
  /// Instantiates a new scanner.
  pub fn new() -> Self {
    return Self::default();
  }

  /// Consumes a line into the scanner.
  pub fn consume(&mut self, line: &str) -> ScanResponse {
    self.total_lines += 1;
    match self.state {
      ScanState::SeekBoundary => {
        if line == BLOCK_DELIMITER {
          self.state = ScanState::ReadId;
          return ScanResponse::Boundary;
        }
        return ScanResponse::Skipped;
      }
      ScanState::ReadId => {
        if line == BLOCK_DELIMITER {
          // consecutive boundaries; keep waiting for an ID
          return ScanResponse::Boundary;
        }
        if line.trim() == "-1" {
          // doubled delimiter without the leading spaces; it would parse as
          // block ID -1, so drop it and resume scanning
          debug!("Stray delimiter on line {}.", self.total_lines);
          self.state = ScanState::SeekBoundary;
          return ScanResponse::StrayDelimiter;
        }
        match line.trim().parse::<i32>() {
          Ok(id) => {
            self.current = Some(Block {
              id,
              lines: Vec::new(),
            });
            self.state = ScanState::Accumulate;
            return ScanResponse::BlockStart(id);
          }
          Err(_) => {
            debug!(
              "Line {} after a boundary is not a block ID.",
              self.total_lines
            );
            self.state = ScanState::SeekBoundary;
            return ScanResponse::BadBlockId;
          }
        }
      }
      ScanState::Accumulate => {
        if line == BLOCK_DELIMITER {
          if let Some(block) = self.current.take() {
            self.file.push_block(block);
          }
          self.state = ScanState::SeekBoundary;
          return ScanResponse::Terminator;
        }
        if let Some(ref mut block) = self.current {
          block.lines.push(line.to_string());
        }
        return ScanResponse::Accumulated;
      }
    }
  }

  /// Finishes up and returns the file struct. A block left open at
  /// end-of-file keeps whatever it accumulated.
  pub fn finish(mut self) -> NeutralFile {
    if let Some(block) = self.current.take() {
      warn!("File ended inside block {}; keeping partial content.", block.id);
      self.file.push_block(block);
    }
    return self.file;
  }

  /// Parses from a BufRead instance.
  pub fn parse_bufread<R: BufRead>(mut reader: R) -> io::Result<NeutralFile> {
    let mut parser = Self::new();
    let mut buf = vec![];
    while reader.read_until(b'\n', &mut buf).is_ok() {
      if buf.is_empty() {
        break;
      }
      if buf.ends_with(b"\n") {
        buf.pop();
      }
      if buf.ends_with(b"\r") {
        buf.pop();
      }
      let line = String::from_utf8_lossy(&buf);
      parser.consume(&line);
      buf.clear();
    }
    return Ok(parser.finish());
  }

  /// Utility method -- reads and parses a file.
  pub fn parse_file<S: AsRef<Path>>(p: S) -> io::Result<NeutralFile> {
    let file = File::open(p.as_ref())?;
    let mut neu = Self::parse_bufread(BufReader::new(file))?;
    neu.filename = p
      .as_ref()
      .file_name()
      .and_then(|s| s.to_str())
      .map(String::from);
    return Ok(neu);
  }
}
