//! Service spec input model
//!
//! These types are what the loader decodes a spec file into. They carry no
//! semantic validation; that happens in the compiler.

/// Parsed spec file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecDocument {
    /// Scoped (replicated) services, in declaration order
    pub services: Vec<ServiceDeclaration>,
    /// Services running once per cluster node, in declaration order
    pub global_services: Vec<ServiceDeclaration>,
}

/// Whether a declaration came from a `service` or a `global_service` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Replicated,
    Global,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Replicated => write!(f, "service"),
            Scope::Global => write!(f, "global_service"),
        }
    }
}

/// One deployable unit as written by the operator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDeclaration {
    /// Service name (block label)
    pub name: String,
    /// Image repository
    pub image: String,
    /// Image tag
    pub version: String,
    /// Replica count, scoped services only
    pub replicas: Option<u64>,
    /// Update policy preset token
    pub how_to_update: String,
    /// Environment variables in declaration order
    pub env: Vec<(String, String)>,
    /// Command (argv form)
    pub command: Vec<String>,
    /// Runtime flags
    pub privileged: bool,
    pub devices: Vec<String>,
    pub caps: Vec<String>,
    pub user: Option<String>,
    pub pid_host: bool,
    pub net_host: bool,
    /// Pins the service to one named node
    pub placement_node_hostname: Option<String>,
    /// Ingress blocks as declared; at most one is allowed
    pub ingress: Vec<Ingress>,
    /// Backup section
    pub backup: Option<Backup>,
    /// Memory ceiling in MiB
    pub ram_mb: Option<u64>,
    pub tcp_ports: Vec<Port>,
    pub udp_ports: Vec<Port>,
    pub persistent_volumes: Vec<PersistentVolume>,
    pub bind_mounts: Vec<BindMount>,
}

/// Routing settings shared by every ingress kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressRoute {
    /// Edge router rule, e.g. `Host(api.example.com)`
    pub rule: String,
    /// Explicit container port for the router
    pub port: Option<u16>,
}

/// How external traffic reaches a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingress {
    Public(IngressRoute),
    BearerToken {
        route: IngressRoute,
        token: String,
    },
    Sso {
        route: IngressRoute,
        tenant: String,
        users: Vec<String>,
    },
}

impl Ingress {
    /// Routing settings of this ingress
    pub fn route(&self) -> &IngressRoute {
        match self {
            Ingress::Public(route) => route,
            Ingress::BearerToken { route, .. } => route,
            Ingress::Sso { route, .. } => route,
        }
    }

    /// Value of the edge router auth mode label
    pub fn auth_mode(&self) -> &'static str {
        match self {
            Ingress::Public(_) => "public",
            Ingress::BearerToken { .. } => "bearer_token",
            Ingress::Sso { .. } => "sso",
        }
    }
}

/// Backup acknowledgment. An empty command is a deliberate opt-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Backup {
    pub command: String,
}

/// Published port pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub public: u16,
    pub container: u16,
}

/// Named, orchestrator-provisioned volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentVolume {
    pub name: String,
    pub target: String,
}

/// Host path mounted into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host: String,
    pub container: String,
    pub read_only: bool,
}

/// Compiler-wide defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    /// External overlay network non-host-networked services attach to
    pub docker_network_name: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            docker_network_name: DEFAULT_NETWORK_NAME.to_string(),
        }
    }
}

/// Overlay network used when nothing else is configured
pub const DEFAULT_NETWORK_NAME: &str = "fn61";
