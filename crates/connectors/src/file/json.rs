use super::{check_session, entity_file, paginate, read_export};
use crate::{
    erp::{ErpClient, Session},
    error::ErpError,
};
use async_trait::async_trait;
use model::{
    core::entity::Entity,
    execution::run::Filters,
    records::erp::{ErpPage, ErpRecord},
};
use std::path::PathBuf;
use tracing::debug;

/// Reads `<dir>/<entity>.json`, a JSON array of records.
///
/// The file is re-read on every call, which matches the stateless tick model.
pub struct JsonFileErpClient {
    dir: PathBuf,
    token: Option<String>,
}

impl JsonFileErpClient {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl ErpClient for JsonFileErpClient {
    async fn fetch_page(
        &self,
        entity: Entity,
        offset: u64,
        batch_size: usize,
        filters: &Filters,
        session: &Session,
    ) -> Result<ErpPage, ErpError> {
        check_session(self.token.as_deref(), session)?;

        let path = entity_file(&self.dir, entity.as_str(), "json");
        let contents = read_export(&path).await?;
        let records: Vec<ErpRecord> = serde_json::from_str(&contents)
            .map_err(|e| ErpError::MalformedResponse(format!("{}: {e}", path.display())))?;

        debug!(
            entity = %entity,
            offset,
            batch_size,
            available = records.len(),
            "Fetched JSON export"
        );
        Ok(paginate(records, offset, batch_size, filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_entity_export() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("customers.json"),
            r#"[
                {"reference": "C-1", "label": "Ada", "payload": {"tier": "gold"}},
                {"reference": "C-2", "payload": {"tier": "silver"}},
                {"reference": "C-3"}
            ]"#,
        )
        .unwrap();

        let client = JsonFileErpClient::new(dir.path());
        let page = client
            .fetch_page(Entity::Customers, 1, 5, &Filters::new(), &Session::anonymous())
            .await
            .unwrap();

        assert_eq!(page.total, Some(3));
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].reference, "C-2");
    }

    #[tokio::test]
    async fn missing_export_is_transport_error() {
        let dir = tempdir().unwrap();
        let client = JsonFileErpClient::new(dir.path());
        let err = client
            .fetch_page(Entity::Orders, 0, 5, &Filters::new(), &Session::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, ErpError::Transport(_)));
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("orders.json"), "{\"not\": \"an array\"}").unwrap();
        let client = JsonFileErpClient::new(dir.path());
        let err = client
            .fetch_page(Entity::Orders, 0, 5, &Filters::new(), &Session::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, ErpError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn wrong_token_is_auth_expired() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("orders.json"), "[]").unwrap();
        let client = JsonFileErpClient::new(dir.path()).with_token("secret");
        let err = client
            .fetch_page(Entity::Orders, 0, 5, &Filters::new(), &Session::new("stale"))
            .await
            .unwrap_err();
        assert_eq!(err, ErpError::AuthExpired);
    }
}
