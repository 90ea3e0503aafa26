use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every lifecycle operation returns one of these on failure. The variants
/// are part of the wire protocol so callers can distinguish a refusal they
/// must re-decide from a failure they may simply retry.
#[derive(Error, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum WagerError {
    /// The caller is not entitled to perform the operation. Never retried.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// The referenced wager or participant does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not valid from the entity's current status. The
    /// caller should refresh state and re-decide.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// No counterpart participant could be resolved. A unilateral resolution
    /// is acceptable only for a self-declared loss.
    #[error("no opponent: {0}")]
    OpponentNotFound(String),

    /// The request itself is malformed (empty responder list, zero stake).
    #[error("invalid request: {0}")]
    Validation(String),

    /// Transaction conflict or connectivity failure in the store. Retrying
    /// the whole operation is safe: every operation re-reads current state.
    #[error("store failure: {0}")]
    TransientStore(String),
}
