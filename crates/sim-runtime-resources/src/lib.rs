//! Simulated resources for sim-runtime.
//!
//! This crate provides the resource implementations and the facade that
//! wires them to the core runtime:
//! - [`Bucket`] / [`BucketClient`]: Object storage over an isolated area
//! - [`Simulator`]: Builds resources from a simulation file and runs them
//!
//! # Example
//!
//! ```no_run
//! use sim_runtime_common::{ResourceEntry, SimulatorConfig};
//! use sim_runtime_resources::{DeleteOptions, Simulator};
//!
//! # async fn run() -> Result<(), sim_runtime_common::SimError> {
//! let mut sim = Simulator::new(SimulatorConfig::default())?;
//! sim.add_resource(&ResourceEntry::new("root/uploads", "bucket"))?;
//! sim.start().await?;
//!
//! let uploads = sim.bucket("root/uploads")?;
//! uploads.put("a.txt", "hello").await?;
//! assert_eq!(uploads.get_string("a.txt").await?, "hello");
//! uploads.delete("a.txt", DeleteOptions::default()).await?;
//!
//! sim.stop().await.into_result()?;
//! # Ok(())
//! # }
//! ```

pub mod bucket;
pub mod simulator;

pub use bucket::{BUCKET_TYPE, Bucket, BucketClient, BucketProps, DeleteOptions, validate_key};
pub use simulator::{ResourceHandle, ResourceKind, Simulator};
