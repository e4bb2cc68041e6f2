use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use prov_action::{ActionTypeRegistry, PayloadKind, WrapperType};
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};

/// Node configuration. Every field has a default, so an empty TOML
/// document is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub name: String,
    pub policy: PolicyKind,
    pub registry: RegistryConfig,
    pub log: LogConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "provenant".into(),
            policy: PolicyKind::Roles,
            registry: RegistryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn from_toml_str(source: &str) -> NodeResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> NodeResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
            .map_err(|e| NodeError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Reject settings that parse but cannot be applied.
    pub fn validate(&self) -> NodeResult<()> {
        if self.name.trim().is_empty() {
            return Err(NodeError::Config("node name must not be empty".into()));
        }
        for kind in self.registry.types.keys() {
            if PayloadKind::from_name(kind).is_none() {
                return Err(NodeError::Config(format!("unknown payload kind '{kind}'")));
            }
        }
        Ok(())
    }
}

/// Which permission policy guards the node's store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Every credential may do everything.
    AllowAll,
    /// Credentials need an explicitly granted role.
    Roles,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// When false, a configured wrapper that conflicts with a default one
    /// is a configuration error instead of a replacement.
    pub allow_overwrite: bool,
    /// Extra wrappers by payload kind name, e.g. `str = "TextObject"`.
    pub types: BTreeMap<String, String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            allow_overwrite: true,
            types: BTreeMap::new(),
        }
    }
}

impl RegistryConfig {
    /// A registry with the default types plus the configured ones.
    pub fn build(&self) -> NodeResult<ActionTypeRegistry> {
        let registry = ActionTypeRegistry::with_defaults();
        for (name, wrapper) in &self.types {
            let kind = PayloadKind::from_name(name)
                .ok_or_else(|| NodeError::Config(format!("unknown payload kind '{name}'")))?;
            let wrapper = WrapperType::new(wrapper.as_str());
            if self.allow_overwrite {
                registry.register(kind, wrapper);
            } else {
                registry.try_register(kind, wrapper)?;
            }
        }
        Ok(registry)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `PROV_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}
