use super::roles::Role;

/// Errors reported by the store and the transition engine.
#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("invalid shipment: {0}")]
    Validation(#[from] ValidationError),
    #[error("shipment {0} not found")]
    ShipmentNotFound(String),
    #[error("state {target} is not a valid target for shipment {shipment_id}: {reason}")]
    InvalidTargetState {
        shipment_id: String,
        target: String,
        reason: String,
    },
    #[error("role {role} may not move shipment {shipment_id} into {target}")]
    Unauthorized {
        shipment_id: String,
        target: String,
        role: Role,
    },
    #[error("shipment {shipment_id} is in terminal state {status}")]
    TerminalStateViolation { shipment_id: String, status: String },
    #[error("shipment {shipment_id} would lose recorded data: {reason}")]
    IntegrityViolation { shipment_id: String, reason: String },
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("encoding failure: {0}")]
    Encoding(String),
}

/// Reasons a new shipment is rejected before it reaches the store.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("counterpart name is empty")]
    MissingCounterpart,
    #[error("counterpart location is empty")]
    MissingLocation,
    #[error("goods description is empty")]
    MissingGoods,
    #[error("value is empty, use \"Pending\" when unknown")]
    MissingValue,
    #[error("actor name is empty")]
    MissingActor,
    #[error("action label is empty")]
    MissingAction,
    #[error("message content is empty")]
    EmptyMessage,
    #[error("attachment {0:?} has no name")]
    UnnamedAttachment(String),
}

/// Fatal startup errors. These are never surfaced to an end user.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("workflow table {track}: {reason}")]
    WorkflowTable { track: String, reason: String },
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to open store: {0}")]
    Store(#[from] sled::Error),
}

impl From<minicbor::decode::Error> for WorkflowError {
    fn from(value: minicbor::decode::Error) -> Self {
        WorkflowError::Encoding(value.to_string())
    }
}

impl From<minicbor::encode::Error<std::convert::Infallible>> for WorkflowError {
    fn from(value: minicbor::encode::Error<std::convert::Infallible>) -> Self {
        WorkflowError::Encoding(value.to_string())
    }
}
