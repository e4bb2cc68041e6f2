//! Payload kind to wrapper type mapping.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ActionError, ActionResult};
use crate::payload::PayloadKind;

/// Tag naming the action-object wrapper for a payload kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrapperType(String);

impl WrapperType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WrapperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps each [`PayloadKind`] to the [`WrapperType`] its computed values are
/// wrapped in. Kinds with no entry pass through the dispatcher unwrapped.
#[derive(Debug, Default)]
pub struct ActionTypeRegistry {
    types: RwLock<BTreeMap<PayloadKind, WrapperType>>,
}

static GLOBAL: OnceLock<Arc<ActionTypeRegistry>> = OnceLock::new();

impl ActionTypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry populated with [`register_default_types`](Self::register_default_types).
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_default_types();
        registry
    }

    /// The process-wide registry, initialized with the default types on
    /// first access.
    pub fn global() -> Arc<ActionTypeRegistry> {
        GLOBAL
            .get_or_init(|| Arc::new(Self::with_defaults()))
            .clone()
    }

    /// Register the built-in wrappers for numeric scalars and arrays.
    /// Strings are left unregistered.
    pub fn register_default_types(&self) {
        self.register(PayloadKind::Int, WrapperType::new("IntObject"));
        self.register(PayloadKind::Float, WrapperType::new("FloatObject"));
        self.register(PayloadKind::Bool, WrapperType::new("BoolObject"));
        self.register(PayloadKind::Array, WrapperType::new("ArrayObject"));
    }

    /// Register `wrapper` for `kind`. A different existing wrapper is
    /// replaced. Returns the previous wrapper, if any.
    pub fn register(&self, kind: PayloadKind, wrapper: WrapperType) -> Option<WrapperType> {
        // Entries are replaced whole, so a poisoned map is still consistent.
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        let previous = types.insert(kind, wrapper.clone());
        match &previous {
            Some(old) if *old != wrapper => {
                warn!(%kind, old = %old, new = %wrapper, "overwrote action type registration");
            }
            Some(_) => {}
            None => debug!(%kind, wrapper = %wrapper, "registered action type"),
        }
        previous
    }

    /// Register `wrapper` for `kind`, refusing to replace a different
    /// existing wrapper.
    pub fn try_register(&self, kind: PayloadKind, wrapper: WrapperType) -> ActionResult<()> {
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        match types.get(&kind) {
            Some(existing) if *existing == wrapper => Ok(()),
            Some(existing) => Err(ActionError::RegistryConflict {
                kind,
                existing: existing.clone(),
                requested: wrapper,
            }),
            None => {
                debug!(%kind, wrapper = %wrapper, "registered action type");
                types.insert(kind, wrapper);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, kind: PayloadKind) -> Option<WrapperType> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    /// All registrations, ordered by kind.
    pub fn entries(&self) -> Vec<(PayloadKind, WrapperType)> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, w)| (*k, w.clone()))
            .collect()
    }
}
