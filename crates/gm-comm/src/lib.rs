//! `gm-comm` - Message passing for gridmul workers.
//!
//! This crate provides:
//! - A `Universe` that runs one OS thread per worker and wires their mailboxes
//! - A `Communicator` with tagged point-to-point messaging and wildcard receives
//! - Blocking collectives scoped to a communicator (broadcast, scatter,
//!   gather, sum-reduce, barrier) and an atomic send-receive-replace
//! - `GridShape`/`CartGrid` for ring, mesh and cube topologies with sub-groups

pub mod collective;
pub mod communicator;
pub mod error;
pub mod topology;
pub mod universe;

pub use collective::Reduced;
pub use communicator::{Communicator, Source, Status, TagMatch};
pub use error::{CommError, Result};
pub use topology::{integer_root, CartGrid, GridShape, Shift};
pub use universe::Universe;
