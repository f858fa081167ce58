// file: src/installer/mod.rs
// version: 2.0.0
// guid: 6a3f0c28-9e47-4d1b-8b52-d04e7f9a3c16

//! Installation orchestrators
//!
//! Each installer owns the transient state of one run (probed node
//! environments, parsed join artifacts and credentials) and turns the
//! first error into a terminal result.

pub mod elastic;
pub mod kubernetes;
pub mod probe;
pub mod result;
pub mod secrets;

pub use elastic::ElasticInstaller;
pub use kubernetes::ClusterInstaller;
pub use probe::{EnvironmentProber, NodeEnvironment, PrivilegeMode};
pub use result::{ExecutionResult, InstallResult, RunOutcome};
