use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown entity '{0}' (expected products, customers or orders)")]
    UnknownEntity(String),

    #[error("unknown direction '{0}' (expected erp_to_store or store_to_erp)")]
    UnknownDirection(String),

    #[error("invalid filter '{0}' (expected key=value)")]
    InvalidFilter(String),
}
