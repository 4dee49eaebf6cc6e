use serde::{Deserialize, Serialize};

/// Normalized record returned by an ERP client, whatever shape the remote
/// API answered with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErpRecord {
    /// Stable identifier in the ERP (SKU, customer number, order number).
    pub reference: String,
    /// Human-readable descriptor shown as the current item in progress.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ErpRecord {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            label: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Label if present, otherwise the reference.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.reference)
    }
}

/// One page of records, plus the remote total when the ERP reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErpPage {
    pub records: Vec<ErpRecord>,
    pub total: Option<u64>,
}

impl ErpPage {
    pub fn new(records: Vec<ErpRecord>, total: Option<u64>) -> Self {
        Self { records, total }
    }
}
