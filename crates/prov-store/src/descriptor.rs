//! Explicit per-type serialization descriptors.
//!
//! A [`Descriptor`] lists every field of a type and what happens to it when
//! the object is rendered for display or export. Fields marked
//! [`FieldPolicy::Redact`] never leave the store in plain form.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// What happens to a field in the plain rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Emit the field as-is.
    Include,
    /// Omit the field.
    Redact,
    /// Emit the field rendered as a string.
    Stringify,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub policy: FieldPolicy,
}

impl FieldSpec {
    pub const fn include(name: &'static str) -> Self {
        Self {
            name,
            policy: FieldPolicy::Include,
        }
    }

    pub const fn redact(name: &'static str) -> Self {
        Self {
            name,
            policy: FieldPolicy::Redact,
        }
    }

    pub const fn stringify(name: &'static str) -> Self {
        Self {
            name,
            policy: FieldPolicy::Stringify,
        }
    }
}

/// Field list for one object type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub type_name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Descriptor {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the fields that appear in the plain rendering.
    pub fn visible_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|f| f.policy != FieldPolicy::Redact)
            .map(|f| f.name)
    }

    /// Render `value` as a plain map following the field policies.
    ///
    /// Every serialized field must be declared; an undeclared field is a
    /// [`StoreError::Serialization`] so new fields cannot leak unnoticed.
    pub fn to_plain<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<Map<String, Value>> {
        let body = match serde_json::to_value(value)? {
            Value::Object(map) => map,
            _ => {
                return Err(StoreError::Serialization(format!(
                    "{} does not serialize to an object",
                    self.type_name
                )));
            }
        };

        if let Some(undeclared) = body.keys().find(|name| self.field(name).is_none()) {
            return Err(StoreError::Serialization(format!(
                "{} has undeclared field '{undeclared}'",
                self.type_name
            )));
        }

        let mut plain = Map::new();
        for entry in self.fields {
            let Some(field) = body.get(entry.name) else {
                continue;
            };
            match entry.policy {
                FieldPolicy::Include => {
                    plain.insert(entry.name.to_string(), field.clone());
                }
                FieldPolicy::Redact => {}
                FieldPolicy::Stringify => {
                    let rendered = match field {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    plain.insert(entry.name.to_string(), Value::String(rendered));
                }
            }
        }
        Ok(plain)
    }
}

/// Types that carry a [`Descriptor`].
pub trait Described: Serialize {
    const DESCRIPTOR: Descriptor;

    fn to_plain(&self) -> StoreResult<Map<String, Value>> {
        Self::DESCRIPTOR.to_plain(self)
    }
}
