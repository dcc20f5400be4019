//! `gm-algo` - Distributed dense matrix multiplication schedules.
//!
//! Three drivers share one contract ([`Driver`]):
//! - [`Algorithm::Ring`]: Cannon's ring-shift schedule on a periodic 2-D grid
//! - [`Algorithm::Mesh2D`]: one-pass block distribution from a coordinator
//! - [`Algorithm::Dns3D`]: the seed/broadcast/multiply/reduce DNS schedule
//!
//! [`Runner`] validates a [`RunConfig`], starts one worker per rank and
//! collects each worker's [`Product`].

pub mod algorithm;
pub mod config;
pub mod coordinator;
pub mod drivers;
pub mod error;
pub mod plan;
pub mod product;
pub mod runner;
pub mod tasks;

pub use algorithm::Algorithm;
pub use config::{DispatchPolicy, RunConfig};
pub use coordinator::{Coordinator, Role};
pub use drivers::{driver_for, Broadcast2D, Cannon, Dns, Driver, Job, RingSchedule};
pub use error::{AlgoError, Precondition, Result};
pub use plan::Plan;
pub use product::{DispatchReport, DnsTrace, Product, RingTrace, Trace};
pub use runner::{RunOutcome, RunReport, Runner};
pub use tasks::TaskGrid;
