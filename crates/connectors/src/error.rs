use thiserror::Error;

/// Page-level failures of an ERP call. Item-level problems never surface
/// here; they are classified by the sync handlers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ErpError {
    #[error("ERP session expired or was rejected")]
    AuthExpired,

    #[error("ERP transport error: {0}")]
    Transport(String),

    #[error("Malformed ERP response: {0}")]
    MalformedResponse(String),

    #[error("ERP rejected the request ({code}): {message}")]
    RemoteRejected { code: String, message: String },
}
