//! ERP clients backed by export files, one file per entity.

use crate::{erp::Session, error::ErpError};
use model::{
    execution::run::Filters,
    records::erp::{ErpPage, ErpRecord},
};
use std::path::{Path, PathBuf};

pub mod csv_file;
pub mod json;

pub use csv_file::CsvFileErpClient;
pub use json::JsonFileErpClient;

/// Rejects sessions that do not carry the expected token, if one is set.
fn check_session(expected: Option<&str>, session: &Session) -> Result<(), ErpError> {
    match expected {
        Some(expected) if session.token.as_deref() != Some(expected) => Err(ErpError::AuthExpired),
        _ => Ok(()),
    }
}

/// A record matches when every filter equals the payload field of that name
/// (compared as strings) or, for `reference`/`label`, the record attribute.
fn matches_filters(record: &ErpRecord, filters: &Filters) -> bool {
    filters.iter().all(|(key, expected)| match key.as_str() {
        "reference" => &record.reference == expected,
        "label" => record.label.as_deref() == Some(expected.as_str()),
        field => match record.payload.get(field) {
            Some(serde_json::Value::String(value)) => value == expected,
            Some(value) => value.to_string() == *expected,
            None => false,
        },
    })
}

/// Filters, then slices out one page. The total counts filtered records.
fn paginate(records: Vec<ErpRecord>, offset: u64, batch_size: usize, filters: &Filters) -> ErpPage {
    let matching: Vec<ErpRecord> = records
        .into_iter()
        .filter(|record| matches_filters(record, filters))
        .collect();
    let total = matching.len() as u64;
    let start = usize::try_from(offset).unwrap_or(usize::MAX);

    let records = matching.into_iter().skip(start).take(batch_size).collect();
    ErpPage::new(records, Some(total))
}

fn entity_file(dir: &Path, entity: &str, extension: &str) -> PathBuf {
    dir.join(format!("{entity}.{extension}"))
}

async fn read_export(path: &Path) -> Result<String, ErpError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ErpError::Transport(format!("cannot read {}: {e}", path.display())))
}
