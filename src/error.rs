use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Identifier derivation failed: {0}")]
    HashDerivation(String),

    #[error("Gateway {gateway} unreachable: {reason}")]
    GatewayUnreachable { gateway: String, reason: String },

    #[error("All {attempts} gateways failed for {identifier}")]
    AllGatewaysExhausted { identifier: String, attempts: usize },

    #[error("Stats persistence failed: {0}")]
    StatsPersistence(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
