//! Stack file types produced by the compiler
//!
//! These follow the compose file format (version 3) as accepted by swarm
//! stack deploys. Only the subset the compiler emits is modelled.

use super::update_policy::UpdateOrder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stack file version written to every document
pub const COMPOSE_VERSION: &str = "3.5";

/// Compiler output: services plus the registries they reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorDocument {
    /// Compiled services, scoped first then global
    pub services: Vec<ServiceDescriptor>,
    /// Networks referenced by services, first-seen order
    pub networks: IndexMap<String, NetworkConfig>,
    /// Volumes referenced by services, first-seen order
    pub volumes: IndexMap<String, VolumeConfig>,
}

impl DescriptorDocument {
    /// Register a network unless one with that name already exists
    pub fn register_network(&mut self, name: &str, config: NetworkConfig) -> bool {
        if self.networks.contains_key(name) {
            return false;
        }
        self.networks.insert(name.to_string(), config);
        true
    }

    /// Register a volume unless one with that name already exists
    pub fn register_volume(&mut self, name: &str) -> bool {
        if self.volumes.contains_key(name) {
            return false;
        }
        self.volumes.insert(name.to_string(), VolumeConfig::default());
        true
    }

    /// View as a stack file, services keyed by name
    pub fn to_compose(&self) -> ComposeFile<'_> {
        ComposeFile {
            version: COMPOSE_VERSION,
            services: self
                .services
                .iter()
                .map(|service| (service.name.as_str(), service))
                .collect(),
            networks: &self.networks,
            volumes: &self.volumes,
        }
    }
}

/// Serializable stack file
#[derive(Debug, Serialize)]
pub struct ComposeFile<'a> {
    pub version: &'static str,
    pub services: IndexMap<&'a str, &'a ServiceDescriptor>,
    #[serde(skip_serializing_if = "is_empty_registry")]
    pub networks: &'a IndexMap<String, NetworkConfig>,
    #[serde(skip_serializing_if = "is_empty_registry")]
    pub volumes: &'a IndexMap<String, VolumeConfig>,
}

fn is_empty_registry<V>(registry: &&IndexMap<String, V>) -> bool {
    registry.is_empty()
}

/// Compiled, orchestrator-ready service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Service name (the key in the stack file)
    #[serde(skip)]
    pub name: String,
    /// `image:version`
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Attached networks; values are always empty
    #[serde(default)]
    pub networks: IndexMap<String, Option<ServiceNetworkConfig>>,
    /// PID namespace (`host` when shared)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    pub deploy: DeployConfig,
}

/// Long-syntax volume mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    #[serde(rename = "type")]
    pub mount_type: MountType,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

/// Mount kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    /// Named volume from the top-level registry
    Volume,
    /// Host path
    Bind,
}

/// Long-syntax published port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub mode: String,
    pub target: u16,
    pub published: u16,
    pub protocol: Protocol,
}

/// Transport protocol of a published port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Per-service network attachment settings (none are emitted)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNetworkConfig {}

/// Deploy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// `global`, or absent for replicated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "PlacementConfig::is_empty")]
    pub placement: PlacementConfig,
    pub update_config: UpdateConfig,
    pub resources: ResourcesConfig,
}

/// Placement configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

impl PlacementConfig {
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Rolling update configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u64>,
    pub order: UpdateOrder,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            parallelism: None,
            order: UpdateOrder::StopFirst,
        }
    }
}

/// Resources configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesConfig {
    pub limits: ResourceSpec,
}

/// Resource limits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Memory ceiling in bytes
    pub memory: u64,
}

/// Top-level network entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub external: ExternalConfig,
}

impl NetworkConfig {
    /// Network managed outside the stack
    pub fn external(name: &str) -> Self {
        Self {
            external: ExternalConfig {
                name: name.to_string(),
            },
        }
    }
}

/// Reference to an externally managed resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalConfig {
    pub name: String,
}

/// Top-level volume entry. Storage is provisioned out of band, so the entry
/// only has to exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {}
