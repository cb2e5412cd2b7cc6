//! Spec to stack file compiler
//!
//! Each declaration is converted on its own into a [`ConvertedService`]; the
//! compiler then folds the results into one [`DescriptorDocument`]. The first
//! failing service aborts the whole compile.

use super::descriptor::{
    DeployConfig, DescriptorDocument, MountType, NetworkConfig, PlacementConfig, PortConfig,
    Protocol, ResourceSpec, ResourcesConfig, ServiceDescriptor, UpdateConfig, VolumeMount,
};
use super::spec::{Defaults, Ingress, Port, Scope, ServiceDeclaration, SpecDocument};
use super::update_policy::UpdatePolicy;
use crate::error::{JamesError, Result};
use std::collections::BTreeMap;

/// Network key used for host networking
pub const HOST_NETWORK: &str = "host";

/// Network key used for the default overlay network
pub const DEFAULT_NETWORK: &str = "default";

pub const LABEL_ROUTER_RULE: &str = "traefik.frontend.rule";
pub const LABEL_ROUTER_PORT: &str = "traefik.port";
pub const LABEL_AUTH: &str = "edgerouter.auth";
pub const LABEL_AUTH_BEARER_TOKEN: &str = "edgerouter.auth_bearer_token";
pub const LABEL_AUTH_SSO_TENANT: &str = "edgerouter.auth_sso.tenant";
pub const LABEL_AUTH_SSO_USERS: &str = "edgerouter.auth_sso.users";
pub const LABEL_BACKUP_COMMAND: &str = "ubackup.command";

/// Tells the service's logger to leave timestamps to the log collector
pub const ENV_SUPPRESS_TIMESTAMPS: &str = "LOGGER_SUPPRESS_TIMESTAMPS";
/// Older backup agents read the command from the environment
pub const ENV_BACKUP_COMMAND: &str = "BACKUP_COMMAND";

const MIB: u64 = 1024 * 1024;

/// One compiled service plus the registry entries it needs
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedService {
    pub descriptor: ServiceDescriptor,
    /// Network key and its top-level definition
    pub network: (String, NetworkConfig),
    /// Names of persistent volumes to register
    pub volumes: Vec<String>,
}

/// Compile a spec document. Scoped services come first, then global ones.
pub fn compile(spec: &SpecDocument, defaults: &Defaults) -> Result<DescriptorDocument> {
    let declarations = spec
        .services
        .iter()
        .map(|decl| (decl, Scope::Replicated))
        .chain(spec.global_services.iter().map(|decl| (decl, Scope::Global)));

    let mut document = DescriptorDocument::default();

    for (decl, scope) in declarations {
        tracing::debug!("Converting {} {}", scope, decl.name);

        let converted = convert_service(decl, scope, defaults)?;

        if document
            .services
            .iter()
            .any(|existing| existing.name == converted.descriptor.name)
        {
            return Err(JamesError::DuplicateService(converted.descriptor.name));
        }

        let (network_name, network) = converted.network;
        if document.register_network(&network_name, network) {
            tracing::debug!("Registered network {}", network_name);
        }
        for volume in &converted.volumes {
            if document.register_volume(volume) {
                tracing::debug!("Registered volume {}", volume);
            }
        }

        document.services.push(converted.descriptor);
    }

    tracing::info!(
        "Compiled {} services ({} networks, {} volumes)",
        document.services.len(),
        document.networks.len(),
        document.volumes.len()
    );

    Ok(document)
}

/// Convert one declaration. Checks run in a fixed order so the reported
/// error for a service with several problems is stable.
pub fn convert_service(
    decl: &ServiceDeclaration,
    scope: Scope,
    defaults: &Defaults,
) -> Result<ConvertedService> {
    let name = &decl.name;

    let ram_mb = decl
        .ram_mb
        .ok_or_else(|| JamesError::MissingResourceLimit(name.clone()))?;

    let memory = ram_mb
        .checked_mul(MIB)
        .ok_or_else(|| JamesError::ResourceLimitOverflow {
            service: name.clone(),
            ram_mb,
        })?;

    let policy = UpdatePolicy::from_token(&decl.how_to_update).ok_or_else(|| {
        JamesError::UnknownUpdatePolicy {
            service: name.clone(),
            policy: decl.how_to_update.clone(),
        }
    })?;

    let mut labels = BTreeMap::new();

    if let Some(ingress) = single_ingress(decl)? {
        ingress_labels(ingress, &mut labels);
    }

    if scope == Scope::Global && decl.replicas.is_some() {
        return Err(JamesError::GlobalServiceHasReplicas(name.clone()));
    }

    if !decl.persistent_volumes.is_empty() {
        if decl.placement_node_hostname.is_none() {
            return Err(JamesError::PersistentVolumeWithoutPlacement(name.clone()));
        }
        if decl.backup.is_none() {
            return Err(JamesError::StatefulServiceWithoutBackup(name.clone()));
        }
    }

    let network = if decl.net_host {
        (HOST_NETWORK.to_string(), NetworkConfig::external(HOST_NETWORK))
    } else {
        (
            DEFAULT_NETWORK.to_string(),
            NetworkConfig::external(&defaults.docker_network_name),
        )
    };

    let mut mounts = Vec::new();
    let mut volumes = Vec::new();
    for pv in &decl.persistent_volumes {
        volumes.push(pv.name.clone());
        mounts.push(VolumeMount {
            mount_type: MountType::Volume,
            source: pv.name.clone(),
            target: pv.target.clone(),
            read_only: false,
        });
    }
    for bind in &decl.bind_mounts {
        mounts.push(VolumeMount {
            mount_type: MountType::Bind,
            source: bind.host.clone(),
            target: bind.container.clone(),
            read_only: bind.read_only,
        });
    }

    let ports = decl
        .tcp_ports
        .iter()
        .map(|port| port_config(port, Protocol::Tcp))
        .chain(
            decl.udp_ports
                .iter()
                .map(|port| port_config(port, Protocol::Udp)),
        )
        .collect();

    // last one wins on duplicate keys
    let mut environment: BTreeMap<String, String> = decl.env.iter().cloned().collect();
    environment.insert(ENV_SUPPRESS_TIMESTAMPS.to_string(), "1".to_string());

    if let Some(backup) = &decl.backup {
        labels.insert(LABEL_BACKUP_COMMAND.to_string(), backup.command.clone());
        environment.insert(ENV_BACKUP_COMMAND.to_string(), backup.command.clone());
    }

    let placement = PlacementConfig {
        constraints: decl
            .placement_node_hostname
            .iter()
            .map(|hostname| format!("node.hostname == {}", hostname))
            .collect(),
    };

    let deploy = DeployConfig {
        mode: match scope {
            Scope::Global => Some("global".to_string()),
            Scope::Replicated => None,
        },
        replicas: match scope {
            Scope::Global => None,
            Scope::Replicated => decl.replicas,
        },
        labels: labels.clone(),
        placement,
        update_config: UpdateConfig {
            parallelism: policy.parallelism(),
            order: policy.order(),
        },
        resources: ResourcesConfig {
            limits: ResourceSpec { memory },
        },
    };

    let descriptor = ServiceDescriptor {
        name: name.clone(),
        image: format!("{}:{}", decl.image, decl.version),
        command: decl.command.clone(),
        environment,
        volumes: mounts,
        devices: decl.devices.clone(),
        cap_add: decl.caps.clone(),
        privileged: decl.privileged,
        user: decl.user.clone(),
        ports,
        // edge router reads container labels when the service is host-networked
        labels,
        networks: [(network.0.clone(), None)].into_iter().collect(),
        pid: decl.pid_host.then(|| "host".to_string()),
        deploy,
    };

    Ok(ConvertedService {
        descriptor,
        network,
        volumes,
    })
}

/// The service's ingress, if any. More than one is an error.
fn single_ingress(decl: &ServiceDeclaration) -> Result<Option<&Ingress>> {
    match decl.ingress.as_slice() {
        [] => Ok(None),
        [ingress] => Ok(Some(ingress)),
        _ => Err(JamesError::ConflictingIngress(decl.name.clone())),
    }
}

fn ingress_labels(ingress: &Ingress, labels: &mut BTreeMap<String, String>) {
    let route = ingress.route();
    labels.insert(LABEL_ROUTER_RULE.to_string(), route.rule.clone());
    if let Some(port) = route.port {
        labels.insert(LABEL_ROUTER_PORT.to_string(), port.to_string());
    }

    // explicit opt-in, a missing block never exposes anything publicly
    labels.insert(LABEL_AUTH.to_string(), ingress.auth_mode().to_string());

    match ingress {
        Ingress::Public(_) => {}
        Ingress::BearerToken { token, .. } => {
            labels.insert(LABEL_AUTH_BEARER_TOKEN.to_string(), token.clone());
        }
        Ingress::Sso { tenant, users, .. } => {
            labels.insert(LABEL_AUTH_SSO_TENANT.to_string(), tenant.clone());
            labels.insert(LABEL_AUTH_SSO_USERS.to_string(), users.join(","));
        }
    }
}

fn port_config(port: &Port, protocol: Protocol) -> PortConfig {
    PortConfig {
        mode: "ingress".to_string(),
        target: port.container,
        published: port.public,
        protocol,
    }
}
