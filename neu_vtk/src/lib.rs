//! This library turns parsed FEMAP Neutral data into a VTK time-series
//! bundle: one collection index (`.pvd`) plus one multi-block document
//! (`.vtm` and its unstructured-grid children) per output set.
//!
//! The heavy lifting is split between a mesh builder (topology mapping and
//! identity bookkeeping), per-channel result resolution (fusing component
//! records into vector arrays), and the per-step writers. The `convert`
//! module drives the whole one-shot pipeline.

#![warn(missing_docs)] // almost sure this is default but whatever
#![warn(clippy::missing_docs_in_private_items)] // sue me
#![allow(clippy::needless_return)] // i'll never forgive rust for this

pub mod channel;
pub mod collection;
pub mod convert;
pub mod mesh;
pub mod results;
mod timestep;
pub mod topology;
pub mod writer;

/// Prelude module; includes commonly-used public exports.
pub mod prelude {
  pub use crate::channel::*;
  pub use crate::collection::*;
  pub use crate::convert::*;
  pub use crate::mesh::*;
  pub use crate::results::*;
  pub use crate::topology::*;
  pub use crate::writer::*;
}

#[cfg(test)]
mod tests;
