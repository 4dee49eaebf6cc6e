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
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::debug;

const REFERENCE_COLUMN: &str = "reference";
const LABEL_COLUMN: &str = "label";

/// Reads `<dir>/<entity>.csv`. The `reference` column is required, `label`
/// is optional, and every other column lands in the payload as a string.
pub struct CsvFileErpClient {
    dir: PathBuf,
    delimiter: u8,
    token: Option<String>,
}

impl CsvFileErpClient {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            delimiter: b',',
            token: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn parse(&self, contents: &str) -> Result<Vec<ErpRecord>, ErpError> {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(::csv::Trim::All)
            .from_reader(contents.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| ErpError::MalformedResponse(format!("CSV header: {e}")))?
            .clone();
        let reference_idx = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(REFERENCE_COLUMN))
            .ok_or_else(|| {
                ErpError::MalformedResponse(format!("missing '{REFERENCE_COLUMN}' column"))
            })?;
        let label_idx = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(LABEL_COLUMN));

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| {
                ErpError::MalformedResponse(format!("CSV record {}: {e}", line + 1))
            })?;

            let mut payload = Map::new();
            for (idx, (header, cell)) in headers.iter().zip(row.iter()).enumerate() {
                if idx != reference_idx && Some(idx) != label_idx {
                    payload.insert(header.to_string(), Value::String(cell.to_string()));
                }
            }

            let mut record = ErpRecord::new(row.get(reference_idx).unwrap_or_default())
                .with_payload(Value::Object(payload));
            if let Some(label) = label_idx.and_then(|idx| row.get(idx)).filter(|l| !l.is_empty()) {
                record = record.with_label(label);
            }
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl ErpClient for CsvFileErpClient {
    async fn fetch_page(
        &self,
        entity: Entity,
        offset: u64,
        batch_size: usize,
        filters: &Filters,
        session: &Session,
    ) -> Result<ErpPage, ErpError> {
        check_session(self.token.as_deref(), session)?;

        let path = entity_file(&self.dir, entity.as_str(), "csv");
        let contents = read_export(&path).await?;
        let records = self.parse(&contents)?;

        debug!(
            entity = %entity,
            offset,
            batch_size,
            available = records.len(),
            "Fetched CSV export"
        );
        Ok(paginate(records, offset, batch_size, filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn maps_columns_into_records() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("products.csv"),
            "reference,label,category,price\nSKU-1,Blue shoe,shoes,49.90\nSKU-2,,hats,15\n",
        )
        .unwrap();

        let client = CsvFileErpClient::new(dir.path());
        let filters = Filters::from([("category".to_string(), "hats".to_string())]);
        let page = client
            .fetch_page(Entity::Products, 0, 10, &filters, &Session::anonymous())
            .await
            .unwrap();

        assert_eq!(page.total, Some(1));
        let record = &page.records[0];
        assert_eq!(record.reference, "SKU-2");
        assert_eq!(record.label, None);
        assert_eq!(record.payload["price"], "15");
    }

    #[tokio::test]
    async fn semicolon_delimiter() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("customers.csv"),
            "reference;label\nC-1;Ada\n",
        )
        .unwrap();

        let client = CsvFileErpClient::new(dir.path()).with_delimiter(b';');
        let page = client
            .fetch_page(Entity::Customers, 0, 10, &Filters::new(), &Session::anonymous())
            .await
            .unwrap();
        assert_eq!(page.records[0].display_label(), "Ada");
    }

    #[tokio::test]
    async fn missing_reference_column_is_malformed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("orders.csv"), "id,total\n1,10\n").unwrap();

        let client = CsvFileErpClient::new(dir.path());
        let err = client
            .fetch_page(Entity::Orders, 0, 10, &Filters::new(), &Session::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, ErpError::MalformedResponse(_)));
    }
}
