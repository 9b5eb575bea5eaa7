//! This library implements types and functions to parse and manipulate the
//! data within FEMAP Neutral files, the block-structured ASCII format some
//! FEA solvers use to dump geometry and result histories.
//!
//! It was created with the main intent being the development of a tool to
//! convert transient electromagnetic solver output to VTK time-series
//! bundles for visualization.
//!
//! However, the code is modular -- the raw block scanner knows nothing about
//! block contents, so one can easily expand the library to support more
//! block families, richer record payloads, etc.

#![warn(missing_docs)] // almost sure this is default but whatever
#![warn(clippy::missing_docs_in_private_items)] // sue me
#![allow(clippy::needless_return)] // i'll never forgive rust for this

pub mod blocks;
pub mod extract;
pub mod model;
pub mod parser;
pub mod record;

/// Prelude module; includes commonly-used public exports.
pub mod prelude {
  pub use crate::blocks::*;
  pub use crate::extract::*;
  pub use crate::model::*;
  pub use crate::parser::*;
  pub use crate::record::*;
}
