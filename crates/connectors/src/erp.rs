use crate::error::ErpError;
use async_trait::async_trait;
use model::{core::entity::Entity, execution::run::Filters, records::erp::ErpPage};

/// Credentials forwarded verbatim to the ERP on each call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Fetches pages of normalized records from the ERP.
///
/// Adapters are responsible for turning whatever the remote API returns
/// into an [`ErpPage`].
#[async_trait]
pub trait ErpClient: Send + Sync {
    async fn fetch_page(
        &self,
        entity: Entity,
        offset: u64,
        batch_size: usize,
        filters: &Filters,
        session: &Session,
    ) -> Result<ErpPage, ErpError>;
}
