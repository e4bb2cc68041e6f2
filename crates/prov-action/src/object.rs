use prov_store::{Described, Descriptor, FieldSpec};
use prov_types::Uid;
use serde::{Deserialize, Serialize};

use crate::payload::{Payload, PayloadKind};
use crate::registry::{ActionTypeRegistry, WrapperType};

/// An immutable wrapper around a payload with identity and provenance.
///
/// Root objects have no parents. Objects produced by the dispatcher list
/// the UIDs of their inputs in encounter order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionObject {
    id: Uid,
    data: Payload,
    wrapper: WrapperType,
    parents: Vec<Uid>,
}

impl ActionObject {
    /// A root object with a fresh UID.
    pub fn new(data: impl Into<Payload>, wrapper: WrapperType) -> Self {
        Self {
            id: Uid::new(),
            data: data.into(),
            wrapper,
            parents: Vec::new(),
        }
    }

    /// A root object wrapped with whatever `registry` maps its kind to.
    /// Returns `None` for unregistered kinds.
    pub fn root(data: impl Into<Payload>, registry: &ActionTypeRegistry) -> Option<Self> {
        let data = data.into();
        let wrapper = registry.resolve(data.kind())?;
        Some(Self::new(data, wrapper))
    }

    /// A derived object with a fresh UID and the given parents.
    pub(crate) fn derived(data: Payload, wrapper: WrapperType, parents: Vec<Uid>) -> Self {
        Self {
            id: Uid::new(),
            data,
            wrapper,
            parents,
        }
    }

    pub fn id(&self) -> Uid {
        self.id
    }

    pub fn data(&self) -> &Payload {
        &self.data
    }

    pub fn wrapper(&self) -> &WrapperType {
        &self.wrapper
    }

    pub fn parents(&self) -> &[Uid] {
        &self.parents
    }

    pub fn kind(&self) -> PayloadKind {
        self.data.kind()
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn into_data(self) -> Payload {
        self.data
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} ({} parents)",
            self.wrapper,
            self.id.short_id(),
            self.parents.len()
        )
    }
}

/// Value equality: same payload value and same wrapper. Identity and
/// provenance are ignored.
impl PartialEq for ActionObject {
    fn eq(&self, other: &Self) -> bool {
        self.wrapper == other.wrapper && self.data.same_value(&other.data)
    }
}

impl Described for ActionObject {
    const DESCRIPTOR: Descriptor = Descriptor {
        type_name: "ActionObject",
        fields: &[
            FieldSpec::stringify("id"),
            FieldSpec::include("data"),
            FieldSpec::include("wrapper"),
            FieldSpec::include("parents"),
        ],
    };
}
