use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use super::definition::FunnelDefinition;
use super::dispatch::{
    ConversionEvent, ConversionEventStore, LeadRecord, LeadStore, StoreError, WebhookBody,
    WebhookError, WebhookTransport,
};
use super::service::FunnelDirectory;

/// Webhook delivery over plain HTTP POST. At-most-once: a non-2xx response
/// or transport failure is reported to the dispatcher and never retried.
#[derive(Debug, Clone, Default)]
pub struct HttpWebhookTransport {
    client: Client,
}

impl HttpWebhookTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn deliver(&self, url: &str, body: &WebhookBody) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| WebhookError::Transport(err.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(WebhookError::Status(response.status().as_u16()))
        }
    }
}

/// Connection settings for the hosted relational backend.
#[derive(Debug, Clone)]
pub struct HostedBackendSettings {
    pub base_url: String,
    pub api_key: String,
}

/// REST adapter for the hosted backend: slug lookup against the funnel
/// table, row inserts for leads and conversion events. CRUD over the
/// backend's row API; no persistence logic lives on this side.
#[derive(Debug, Clone)]
pub struct HostedBackendClient {
    client: Client,
    settings: HostedBackendSettings,
}

impl HostedBackendClient {
    pub fn new(client: Client, settings: HostedBackendSettings) -> Self {
        Self { client, settings }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.settings.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.settings.api_key)
            .bearer_auth(&self.settings.api_key)
    }

    async fn insert_row<T: serde::Serialize + Sync>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<serde_json::Value, StoreError> {
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected(format!(
                "{table} insert returned status {status}"
            )));
        }

        let mut rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|err| StoreError::Rejected(err.to_string()))?;
        if rows.is_empty() {
            return Err(StoreError::Rejected(format!(
                "{table} insert returned no representation"
            )));
        }
        Ok(rows.remove(0))
    }
}

#[async_trait]
impl FunnelDirectory for HostedBackendClient {
    async fn find_active(&self, slug: &str) -> Result<Option<Arc<FunnelDefinition>>, StoreError> {
        let response = self
            .authorized(self.client.get(self.table_url("step_forms")))
            .query(&[
                ("slug", format!("eq.{slug}")),
                ("active", "eq.true".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected(format!(
                "funnel lookup returned status {status}"
            )));
        }

        let mut rows: Vec<FunnelDefinition> = response
            .json()
            .await
            .map_err(|err| StoreError::Rejected(err.to_string()))?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Arc::new(rows.remove(0))))
        }
    }
}

#[async_trait]
impl LeadStore for HostedBackendClient {
    async fn insert_lead(&self, lead: LeadRecord) -> Result<String, StoreError> {
        let row = self.insert_row("step_form_leads", &lead).await?;
        row.get("id")
            .and_then(|id| id.as_str().map(str::to_string).or_else(|| id.as_i64().map(|n| n.to_string())))
            .ok_or_else(|| StoreError::Rejected("lead row has no id".to_string()))
    }
}

#[async_trait]
impl ConversionEventStore for HostedBackendClient {
    async fn insert_event(&self, event: ConversionEvent) -> Result<(), StoreError> {
        self.insert_row("conversion_events", &event).await.map(|_| ())
    }
}
