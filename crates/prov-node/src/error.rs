use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store error: {0}")]
    Store(#[from] prov_store::StoreError),

    #[error("action error: {0}")]
    Action(#[from] prov_action::ActionError),

    #[error("password error: {0}")]
    Password(#[from] prov_crypto::PasswordError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for NodeError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
