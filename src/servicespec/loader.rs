//! Service spec file loader
//!
//! Spec files are HCL. `hcl::parse` gives a generic body which is decoded
//! here into a [`SpecDocument`], evaluating each attribute without any
//! variables or functions in scope. Only structure and value types are checked;
//! semantic rules belong to the compiler.

use super::spec::{
    Backup, BindMount, Ingress, IngressRoute, PersistentVolume, Port, ServiceDeclaration,
    SpecDocument,
};
use crate::error::{JamesError, Result};
use hcl::eval::{Context, Evaluate};
use hcl::{Block, Body, Expression, Number, Value};
use indexmap::IndexMap;

/// Spec file loader
pub struct SpecLoader;

impl SpecLoader {
    /// Load spec file from string
    pub fn parse_str(content: &str) -> Result<SpecDocument> {
        let body = hcl::parse(content)
            .map_err(|e| JamesError::Syntax(format!("Failed to parse HCL: {}", e)))?;

        Self::decode(&body)
    }

    /// Decode a parsed HCL body
    pub fn decode(body: &Body) -> Result<SpecDocument> {
        if let Some(attr) = body.attributes().next() {
            return Err(JamesError::Syntax(format!(
                "unexpected top-level attribute '{}'",
                attr.key()
            )));
        }

        let mut spec = SpecDocument::default();

        for block in body.blocks() {
            match block.identifier() {
                "service" => spec.services.push(decode_service(block)?),
                "global_service" => spec.global_services.push(decode_service(block)?),
                other => {
                    return Err(JamesError::Syntax(format!(
                        "unknown block type '{}', expected 'service' or 'global_service'",
                        other
                    )))
                }
            }
        }

        Ok(spec)
    }
}

fn decode_service(block: &Block) -> Result<ServiceDeclaration> {
    let name = single_label(block, block.identifier())?;
    let context = format!("{} \"{}\"", block.identifier(), name);

    let mut attrs = Attributes::collect(block.body(), &context)?;

    let mut service = ServiceDeclaration {
        name,
        image: attrs.required_string("image")?,
        version: attrs.required_string("version")?,
        replicas: attrs.optional_u64("replicas")?,
        how_to_update: attrs.required_string("how_to_update")?,
        command: attrs.optional_string_list("command")?,
        privileged: attrs.optional_bool("privileged")?,
        devices: attrs.optional_string_list("devices")?,
        caps: attrs.optional_string_list("caps")?,
        user: attrs.optional_string("user")?,
        pid_host: attrs.optional_bool("pid_host")?,
        net_host: attrs.optional_bool("net_host")?,
        placement_node_hostname: attrs.optional_string("placement_node_hostname")?,
        ram_mb: attrs.optional_u64("ram_mb")?,
        ..Default::default()
    };
    attrs.finish()?;

    for child in block.body().blocks() {
        let child_context = format!("{}: {}", context, child.identifier());

        match child.identifier() {
            "env" => {
                let key = single_label(child, &child_context)?;
                let mut attrs = leaf_body(child, &child_context)?;
                let value = attrs.required_string("value")?;
                attrs.finish()?;
                service.env.push((key, value));
            }
            "ingress_public" => {
                let mut attrs = leaf_attributes(child, &child_context)?;
                let route = attrs.ingress_route()?;
                attrs.finish()?;
                service.ingress.push(Ingress::Public(route));
            }
            "ingress_bearer" => {
                let mut attrs = leaf_attributes(child, &child_context)?;
                let route = attrs.ingress_route()?;
                let token = attrs.required_string("token")?;
                attrs.finish()?;
                service.ingress.push(Ingress::BearerToken { route, token });
            }
            "ingress_sso" => {
                let mut attrs = leaf_attributes(child, &child_context)?;
                let route = attrs.ingress_route()?;
                let tenant = attrs.required_string("tenant")?;
                let users = attrs.required_string_list("users")?;
                attrs.finish()?;
                service.ingress.push(Ingress::Sso {
                    route,
                    tenant,
                    users,
                });
            }
            "backup" => {
                if service.backup.is_some() {
                    return Err(JamesError::Syntax(format!(
                        "{}: duplicate block",
                        child_context
                    )));
                }
                let mut attrs = leaf_attributes(child, &child_context)?;
                let command = attrs.optional_string("command")?.unwrap_or_default();
                attrs.finish()?;
                service.backup = Some(Backup { command });
            }
            "tcp_port" => service.tcp_ports.push(decode_port(child, &child_context)?),
            "udp_port" => service.udp_ports.push(decode_port(child, &child_context)?),
            "persistentvolume" => {
                let mut attrs = leaf_attributes(child, &child_context)?;
                let volume = PersistentVolume {
                    name: attrs.required_string("name")?,
                    target: attrs.required_string("target")?,
                };
                attrs.finish()?;
                service.persistent_volumes.push(volume);
            }
            "bindmount" => {
                let mut attrs = leaf_attributes(child, &child_context)?;
                let mount = BindMount {
                    host: attrs.required_string("host")?,
                    container: attrs.required_string("container")?,
                    read_only: attrs.optional_bool("readonly")?,
                };
                attrs.finish()?;
                service.bind_mounts.push(mount);
            }
            other => {
                return Err(JamesError::Syntax(format!(
                    "{}: unknown block type '{}'",
                    context, other
                )))
            }
        }
    }

    Ok(service)
}

fn decode_port(block: &Block, context: &str) -> Result<Port> {
    let mut attrs = leaf_attributes(block, context)?;
    let port = Port {
        public: attrs.required_port("public")?,
        container: attrs.required_port("container")?,
    };
    attrs.finish()?;
    Ok(port)
}

/// Block with exactly one label, e.g. `service "web" { .. }`
fn single_label(block: &Block, context: &str) -> Result<String> {
    match block.labels() {
        [label] => Ok(label.as_str().to_string()),
        labels => Err(JamesError::Syntax(format!(
            "{}: expected exactly one label, got {}",
            context,
            labels.len()
        ))),
    }
}

/// Attributes of a block that may not have labels or nested blocks
fn leaf_attributes<'a>(block: &'a Block, context: &str) -> Result<Attributes<'a>> {
    if !block.labels().is_empty() {
        return Err(JamesError::Syntax(format!("{}: unexpected label", context)));
    }
    leaf_body(block, context)
}

/// Attributes of a block that may not have nested blocks
fn leaf_body<'a>(block: &'a Block, context: &str) -> Result<Attributes<'a>> {
    if let Some(nested) = block.body().blocks().next() {
        return Err(JamesError::Syntax(format!(
            "{}: unexpected block '{}'",
            context,
            nested.identifier()
        )));
    }
    Attributes::collect(block.body(), context)
}

/// Attributes of one block, consumed by key
struct Attributes<'a> {
    context: String,
    values: IndexMap<&'a str, &'a Expression>,
}

impl<'a> Attributes<'a> {
    fn collect(body: &'a Body, context: &str) -> Result<Self> {
        let mut values = IndexMap::new();
        for attr in body.attributes() {
            if values.insert(attr.key(), attr.expr()).is_some() {
                return Err(JamesError::Syntax(format!(
                    "{}: duplicate attribute '{}'",
                    context,
                    attr.key()
                )));
            }
        }

        Ok(Self {
            context: context.to_string(),
            values,
        })
    }

    /// Fail on anything not consumed
    fn finish(self) -> Result<()> {
        match self.values.keys().next() {
            Some(key) => Err(JamesError::Syntax(format!(
                "{}: unknown attribute '{}'",
                self.context, key
            ))),
            None => Ok(()),
        }
    }

    /// Remove and evaluate an attribute. Constant expressions, heredocs and
    /// literal templates evaluate; variable and function references do not.
    fn take(&mut self, key: &str) -> Result<Option<Value>> {
        let Some(expr) = self.values.shift_remove(key) else {
            return Ok(None);
        };
        expr.evaluate(&Context::new()).map(Some).map_err(|e| {
            JamesError::Syntax(format!(
                "{}: attribute '{}' cannot be evaluated: {}",
                self.context, key, e
            ))
        })
    }

    fn missing(&self, key: &str) -> JamesError {
        JamesError::Syntax(format!(
            "{}: missing required attribute '{}'",
            self.context, key
        ))
    }

    fn wrong_type(&self, key: &str, expected: &str, value: &Value) -> JamesError {
        JamesError::Syntax(format!(
            "{}: attribute '{}' must be {}, got {}",
            self.context,
            key,
            expected,
            describe(value)
        ))
    }

    fn optional_string(&mut self, key: &str) -> Result<Option<String>> {
        match self.take(key)? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.wrong_type(key, "a string", &other)),
        }
    }

    fn required_string(&mut self, key: &str) -> Result<String> {
        self.optional_string(key)?.ok_or_else(|| self.missing(key))
    }

    fn optional_bool(&mut self, key: &str) -> Result<bool> {
        match self.take(key)? {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(other) => Err(self.wrong_type(key, "a bool", &other)),
        }
    }

    fn optional_u64(&mut self, key: &str) -> Result<Option<u64>> {
        let Some(value) = self.take(key)? else {
            return Ok(None);
        };
        match &value {
            Value::Number(n) => whole_number(n)
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "a non-negative integer", &value)),
            other => Err(self.wrong_type(key, "a non-negative integer", other)),
        }
    }

    fn optional_port(&mut self, key: &str) -> Result<Option<u16>> {
        match self.optional_u64(key)? {
            None => Ok(None),
            Some(n) => u16::try_from(n).map(Some).map_err(|_| {
                JamesError::Syntax(format!(
                    "{}: attribute '{}' is not a valid port: {}",
                    self.context, key, n
                ))
            }),
        }
    }

    fn required_port(&mut self, key: &str) -> Result<u16> {
        self.optional_port(key)?.ok_or_else(|| self.missing(key))
    }

    fn optional_string_list(&mut self, key: &str) -> Result<Vec<String>> {
        match self.take(key)? {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(self.wrong_type(key, "a list of strings", &other)),
                })
                .collect(),
            Some(other) => Err(self.wrong_type(key, "a list of strings", &other)),
        }
    }

    fn required_string_list(&mut self, key: &str) -> Result<Vec<String>> {
        if !self.values.contains_key(key) {
            return Err(self.missing(key));
        }
        self.optional_string_list(key)
    }

    fn ingress_route(&mut self) -> Result<IngressRoute> {
        Ok(IngressRoute {
            rule: self.required_string("rule")?,
            port: self.optional_port("port")?,
        })
    }
}

/// Integer value of a number. Arithmetic may yield whole floats.
fn whole_number(n: &Number) -> Option<u64> {
    n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KITCHEN_SINK: &str = r#"
service "web" {
  image         = "nginx"
  version       = "1.21"
  replicas      = 2
  how_to_update = "parallel-one-at-a-time"
  ram_mb        = 128
  command       = ["nginx", "-g", "daemon off;"]
  caps          = ["NET_ADMIN"]
  user          = "1000:1000"

  env "FOO" {
    value = "bar"
  }

  env "FOO" {
    value = "baz"
  }

  ingress_sso {
    rule   = "Host(web.example.com)"
    port   = 8080
    tenant = "acme"
    users  = ["alice", "bob"]
  }

  tcp_port {
    public    = 80
    container = 8080
  }

  udp_port {
    public    = 53
    container = 5353
  }

  bindmount {
    host      = "/etc/ssl"
    container = "/ssl"
    readonly  = true
  }
}

global_service "agent" {
  image                   = "agent"
  version                 = "2"
  how_to_update           = "stop-old-first"
  ram_mb                  = 32
  net_host                = true
  pid_host                = true
  privileged              = true
  devices                 = ["/dev/kmsg"]
  placement_node_hostname = "node1"

  backup {
  }

  persistentvolume {
    name   = "agent-data"
    target = "/data"
  }
}
"#;

    #[test]
    fn test_parse_kitchen_sink() {
        let spec = SpecLoader::parse_str(KITCHEN_SINK).unwrap();
        assert_eq!(spec.services.len(), 1);
        assert_eq!(spec.global_services.len(), 1);

        let web = &spec.services[0];
        assert_eq!(web.name, "web");
        assert_eq!(web.image, "nginx");
        assert_eq!(web.version, "1.21");
        assert_eq!(web.replicas, Some(2));
        assert_eq!(web.ram_mb, Some(128));
        assert_eq!(web.command, vec!["nginx", "-g", "daemon off;"]);
        assert_eq!(web.user.as_deref(), Some("1000:1000"));
        assert_eq!(
            web.env,
            vec![
                ("FOO".to_string(), "bar".to_string()),
                ("FOO".to_string(), "baz".to_string())
            ]
        );
        assert_eq!(
            web.ingress,
            vec![Ingress::Sso {
                route: IngressRoute {
                    rule: "Host(web.example.com)".to_string(),
                    port: Some(8080),
                },
                tenant: "acme".to_string(),
                users: vec!["alice".to_string(), "bob".to_string()],
            }]
        );
        assert_eq!(
            web.tcp_ports,
            vec![Port {
                public: 80,
                container: 8080
            }]
        );
        assert_eq!(web.udp_ports[0].container, 5353);
        assert!(web.bind_mounts[0].read_only);
        assert!(web.backup.is_none());

        let agent = &spec.global_services[0];
        assert!(agent.net_host && agent.pid_host && agent.privileged);
        assert_eq!(agent.replicas, None);
        assert_eq!(agent.backup, Some(Backup::default()));
        assert_eq!(agent.persistent_volumes[0].name, "agent-data");
        assert_eq!(agent.placement_node_hostname.as_deref(), Some("node1"));
    }

    #[test]
    fn test_block_order_is_preserved() {
        let hcl = r#"
service "b" {
  image         = "b"
  version       = "1"
  how_to_update = "stop-old-first"
}

global_service "g" {
  image         = "g"
  version       = "1"
  how_to_update = "stop-old-first"
}

service "a" {
  image         = "a"
  version       = "1"
  how_to_update = "stop-old-first"
}
"#;

        let spec = SpecLoader::parse_str(hcl).unwrap();
        let names: Vec<&str> = spec.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(spec.global_services[0].name, "g");
    }

    #[test]
    fn test_multiple_ingress_blocks_are_kept_for_validation() {
        let hcl = r#"
service "web" {
  image         = "nginx"
  version       = "1"
  how_to_update = "stop-old-first"

  ingress_public {
    rule = "Host(a)"
  }

  ingress_bearer {
    rule  = "Host(a)"
    token = "secret"
  }
}
"#;

        let spec = SpecLoader::parse_str(hcl).unwrap();
        assert_eq!(spec.services[0].ingress.len(), 2);
    }

    #[test]
    fn test_missing_how_to_update() {
        let hcl = r#"
service "web" {
  image   = "nginx"
  version = "1"
  ram_mb  = 16
}
"#;

        let err = SpecLoader::parse_str(hcl).unwrap_err();
        assert!(matches!(err, JamesError::Syntax(_)));
        assert!(err.to_string().contains("how_to_update"));
    }

    #[test]
    fn test_unknown_attribute() {
        let hcl = r#"
service "web" {
  image         = "nginx"
  version       = "1"
  how_to_update = "stop-old-first"
  colour        = "blue"
}
"#;

        let err = SpecLoader::parse_str(hcl).unwrap_err();
        assert!(matches!(err, JamesError::Syntax(_)));
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_wrong_value_type() {
        let hcl = r#"
service "web" {
  image         = "nginx"
  version       = "1"
  how_to_update = "stop-old-first"
  ram_mb        = "lots"
}
"#;

        let err = SpecLoader::parse_str(hcl).unwrap_err();
        assert!(matches!(err, JamesError::Syntax(_)));
    }

    #[test]
    fn test_port_out_of_range() {
        let hcl = r#"
service "web" {
  image         = "nginx"
  version       = "1"
  how_to_update = "stop-old-first"

  tcp_port {
    public    = 70000
    container = 80
  }
}
"#;

        let err = SpecLoader::parse_str(hcl).unwrap_err();
        assert!(err.to_string().contains("not a valid port"));
    }

    #[test]
    fn test_heredoc_backup_command() {
        let hcl = r#"
service "db" {
  image         = "postgres"
  version       = "16"
  how_to_update = "stop-old-first"

  backup {
    command = <<EOT
pg_dumpall -U postgres
EOT
  }
}
"#;

        let spec = SpecLoader::parse_str(hcl).unwrap();
        let backup = spec.services[0].backup.as_ref().unwrap();
        assert_eq!(backup.command.trim_end(), "pg_dumpall -U postgres");
    }

    #[test]
    fn test_constant_expressions() {
        let hcl = r#"
service "web" {
  image         = "nginx"
  version       = "1"
  how_to_update = "stop-old-first"
  ram_mb        = 64 * 2
  replicas      = 1 + 2

  tcp_port {
    public    = 8000 + 80
    container = 80
  }
}
"#;

        let spec = SpecLoader::parse_str(hcl).unwrap();
        let web = &spec.services[0];
        assert_eq!(web.ram_mb, Some(128));
        assert_eq!(web.replicas, Some(3));
        assert_eq!(web.tcp_ports[0].public, 8080);
    }

    #[test]
    fn test_variable_reference_is_rejected() {
        let hcl = r#"
service "web" {
  image         = "nginx"
  version       = "${var.tag}"
  how_to_update = "stop-old-first"
}
"#;

        let err = SpecLoader::parse_str(hcl).unwrap_err();
        assert!(matches!(err, JamesError::Syntax(_)));
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_unknown_block_type() {
        let err = SpecLoader::parse_str("job \"x\" {\n}\n").unwrap_err();
        assert!(matches!(err, JamesError::Syntax(_)));
    }

    #[test]
    fn test_service_without_label() {
        let hcl = r#"
service {
  image         = "nginx"
  version       = "1"
  how_to_update = "stop-old-first"
}
"#;

        assert!(SpecLoader::parse_str(hcl).is_err());
    }

    #[test]
    fn test_malformed_input() {
        let err = SpecLoader::parse_str("service \"web\" {\n  image = \n").unwrap_err();
        assert!(matches!(err, JamesError::Syntax(_)));
    }

    #[test]
    fn test_empty_input() {
        let spec = SpecLoader::parse_str("").unwrap();
        assert_eq!(spec, SpecDocument::default());
    }
}
