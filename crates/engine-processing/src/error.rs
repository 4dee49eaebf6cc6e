use connectors::error::ErpError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("ERP call failed: {0}")]
    Erp(#[from] ErpError),

    /// The engine reached a state it should never be in (bad cursor, missing
    /// handler). Distinct from remote failures so callers can alert on it.
    #[error("Invariant violated: {0}")]
    Invariant(String),
}
