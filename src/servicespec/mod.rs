//! Service spec to stack file conversion
//!
//! Operators describe services in HCL spec files. This module turns such a
//! file into a compose stack file that can be deployed to the cluster as is.

pub mod compiler;
pub mod descriptor;
pub mod loader;
pub mod spec;
pub mod update_policy;

pub use compiler::{compile, convert_service, ConvertedService};
pub use descriptor::{DescriptorDocument, ServiceDescriptor};
pub use loader::SpecLoader;
pub use spec::{Defaults, Scope, ServiceDeclaration, SpecDocument};
pub use update_policy::UpdatePolicy;

use crate::error::{JamesError, Result};
use std::path::Path;

/// Serialize a compiled document as a YAML stack file
pub fn serialize(document: &DescriptorDocument) -> Result<String> {
    serde_yaml::to_string(&document.to_compose())
        .map_err(|e| JamesError::InternalSerialization(e.to_string()))
}

/// Load, compile and serialize a spec
pub fn spec_to_compose(content: &str, defaults: &Defaults) -> Result<String> {
    let spec = SpecLoader::parse_str(content)?;
    let document = compile(&spec, defaults)?;
    serialize(&document)
}

/// Like [`spec_to_compose`], reading the spec from a file
pub fn spec_to_compose_by_path(path: &Path, defaults: &Defaults) -> Result<String> {
    tracing::debug!("Reading spec file {}", path.display());
    let content = std::fs::read_to_string(path)?;
    spec_to_compose(&content, defaults)
}
