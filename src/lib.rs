//! James - operator tooling for a small swarm cluster
//!
//! The core of the crate is the service spec compiler: operators describe
//! services in HCL and James turns that into a compose stack file, refusing
//! specs that would misconfigure the cluster:
//!
//! - every service has a memory limit and an explicit update policy
//! - at most one ingress per service
//! - stateful services are pinned to a node and acknowledge backups
//! - global services have no replica count

pub mod error;
pub mod servicespec;
pub mod settings;

pub use error::{JamesError, Result};
pub use settings::Settings;
