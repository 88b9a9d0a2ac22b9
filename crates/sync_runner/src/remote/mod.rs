//! Remote stores - HTTP clients for the source and target services
//!
//! Both clients sit on top of one [`ApiClient`] which owns the
//! `reqwest::Client`, the bearer token and the status handling.

mod airtable;
mod webflow;

pub use airtable::AirtableClient;
pub use webflow::WebflowClient;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tablesync_config::{SourceConfig, SourceKind, TargetConfig, TargetKind};

use crate::{ClientError, SourceClient, SyncError, TargetClient};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated JSON client for one remote service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    service: &'static str,
    base_url: String,
    api_key: String,
    headers: Vec<(&'static str, String)>,
}

impl ApiClient {
    pub fn new(
        service: &'static str,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            service,
            base_url: base_url.into(),
            api_key: api_key.into(),
            headers: Vec::new(),
        })
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Url(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::Url(format!("{}: cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let response = self.dispatch(Method::GET, segments, |req| req).await?;
        Ok(response.json().await?)
    }

    pub async fn send_json<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.dispatch(method, segments, |req| req.json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, segments: &[&str]) -> Result<(), ClientError> {
        self.dispatch(Method::DELETE, segments, |req| req).await?;
        Ok(())
    }

    async fn dispatch<F>(
        &self,
        method: Method,
        segments: &[&str],
        build: F,
    ) -> Result<Response, ClientError>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = self.url(segments)?;
        tracing::debug!(service = self.service, %method, %url, "Sending request");

        let mut request = self.http.request(method, url).bearer_auth(&self.api_key);
        for (name, value) in &self.headers {
            request = request.header(*name, value);
        }

        let response = build(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                service: self.service,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Builds the source client selected by `config.kind`.
pub fn source_from_config(config: &SourceConfig) -> Result<Arc<dyn SourceClient>, SyncError> {
    let credentials = config.credentials()?;
    match config.kind {
        SourceKind::Airtable => {
            let client =
                AirtableClient::new(&config.base_url, credentials.api_key, credentials.base_id)
                    .map_err(SyncError::SourceFetch)?;
            Ok(Arc::new(client))
        }
    }
}

/// Builds the target client selected by `config.kind`.
pub fn target_from_config(config: &TargetConfig) -> Result<Arc<dyn TargetClient>, SyncError> {
    let credentials = config.credentials()?;
    match config.kind {
        TargetKind::Webflow => {
            let client = WebflowClient::new(
                &config.base_url,
                credentials.api_key,
                credentials.collection_id,
                &config.api_version,
            )
            .map_err(SyncError::TargetFetch)?;
            Ok(Arc::new(client))
        }
    }
}
