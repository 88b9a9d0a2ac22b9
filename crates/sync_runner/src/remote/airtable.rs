use async_trait::async_trait;
use serde::Deserialize;

use super::ApiClient;
use crate::record::SourceRecord;
use crate::{ClientError, SourceClient};

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<SourceRecord>,
}

/// Source client for an Airtable base.
///
/// Reads `GET {base_url}/{base_id}/{collection}`.
#[derive(Debug, Clone)]
pub struct AirtableClient {
    api: ApiClient,
    base_id: String,
}

impl AirtableClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        base_id: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            api: ApiClient::new("Airtable", base_url, api_key)?,
            base_id: base_id.into(),
        })
    }
}

#[async_trait]
impl SourceClient for AirtableClient {
    async fn fetch_records(&self, collection: &str) -> Result<Vec<SourceRecord>, ClientError> {
        let page: RecordPage = self.api.get_json(&[self.base_id.as_str(), collection]).await?;
        tracing::debug!(collection, records = page.records.len(), "Fetched source records");
        Ok(page.records)
    }
}
