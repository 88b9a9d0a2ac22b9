use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::record::{MappedFields, TargetItem};
use crate::{ClientError, TargetClient};

#[derive(Debug, Deserialize)]
struct ItemPage {
    #[serde(default)]
    items: Vec<TargetItem>,
}

#[derive(Debug, Serialize)]
struct ItemBody<'a> {
    #[serde(rename = "fieldData")]
    field_data: &'a MappedFields,
}

/// Target client for one Webflow CMS collection.
#[derive(Debug, Clone)]
pub struct WebflowClient {
    api: ApiClient,
    collection_id: String,
}

impl WebflowClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        collection_id: impl Into<String>,
        api_version: &str,
    ) -> Result<Self, ClientError> {
        let api = ApiClient::new("Webflow", base_url, api_key)?
            .with_header("accept-version", api_version);
        Ok(Self {
            api,
            collection_id: collection_id.into(),
        })
    }

    fn items_path(&self) -> [&str; 3] {
        ["collections", self.collection_id.as_str(), "items"]
    }

    fn item_path<'a>(&'a self, item_id: &'a str) -> [&'a str; 4] {
        ["collections", self.collection_id.as_str(), "items", item_id]
    }
}

#[async_trait]
impl TargetClient for WebflowClient {
    async fn fetch_items(&self) -> Result<Vec<TargetItem>, ClientError> {
        let page: ItemPage = self.api.get_json(&self.items_path()).await?;
        Ok(page.items)
    }

    async fn create_item(&self, fields: &MappedFields) -> Result<TargetItem, ClientError> {
        let body = ItemBody { field_data: fields };
        self.api.send_json(Method::POST, &self.items_path(), &body).await
    }

    async fn update_item(
        &self,
        item_id: &str,
        fields: &MappedFields,
    ) -> Result<TargetItem, ClientError> {
        let body = ItemBody { field_data: fields };
        self.api.send_json(Method::PATCH, &self.item_path(item_id), &body).await
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), ClientError> {
        self.api.delete(&self.item_path(item_id)).await
    }
}
