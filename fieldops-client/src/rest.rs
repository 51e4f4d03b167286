//! REST backend speaking PostgREST conventions.

use crate::backend::{Backend, Subscription};
use crate::config::ClientConfig;
use crate::error::{BackendError, BackendResult};
use crate::realtime::RealtimeClient;
use async_trait::async_trait;
use fieldops_core::{Fields, Record, RecordId};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const PREFER_RETURN_REPRESENTATION: &str = "return=representation";

/// Error body returned by the REST endpoint on non-2xx responses.
#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

impl RemoteErrorBody {
    fn describe(&self) -> String {
        let mut text = match &self.code {
            Some(code) => format!("{}: {}", code, self.message),
            None => self.message.clone(),
        };
        if let Some(details) = &self.details {
            text.push_str(&format!(" ({})", details));
        }
        if let Some(hint) = &self.hint {
            text.push_str(&format!(" hint: {}", hint));
        }
        text
    }
}

#[derive(Clone)]
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
    realtime: RealtimeClient,
}

impl RestBackend {
    pub fn new(config: &ClientConfig) -> BackendResult<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let auth_header = build_auth_headers(config)?;
        Ok(Self {
            client,
            base_url: config.rest_url.trim_end_matches('/').to_string(),
            auth_header,
            realtime: RealtimeClient::new(config),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> BackendResult<T> {
        let response = self.check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Pass a 2xx response through; map anything else to `Rejected`.
    async fn check_status(&self, response: reqwest::Response) -> BackendResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await?;
        if let Ok(remote) = serde_json::from_str::<RemoteErrorBody>(&text) {
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message: remote.describe(),
            });
        }
        let message = if text.trim().is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            text.trim().to_string()
        };
        Err(BackendError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn fetch_all(&self, table: &str, order_column: &str) -> BackendResult<Vec<Record>> {
        let order = format!("{}.desc", order_column);
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.auth_header.clone())
            .query(&[("select", "*"), ("order", order.as_str())])
            .send()
            .await?;
        let records: Vec<Record> = self.parse_response(response).await?;
        debug!(table = %table, count = records.len(), "Fetched collection");
        Ok(records)
    }

    async fn insert(&self, table: &str, fields: &Fields) -> BackendResult<Record> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.auth_header.clone())
            .header("prefer", PREFER_RETURN_REPRESENTATION)
            .json(fields)
            .send()
            .await?;
        let rows: Vec<Record> = self.parse_response(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, id: &RecordId, patch: &Fields) -> BackendResult<Record> {
        let response = self
            .client
            .patch(self.table_url(table))
            .headers(self.auth_header.clone())
            .header("prefer", PREFER_RETURN_REPRESENTATION)
            .query(&[("id", id_filter(id))])
            .json(patch)
            .send()
            .await?;
        let rows: Vec<Record> = self.parse_response(response).await?;
        rows.into_iter().next().ok_or_else(|| BackendError::NotFound {
            table: table.to_string(),
            id: id.clone(),
        })
    }

    async fn delete(&self, table: &str, id: &RecordId) -> BackendResult<()> {
        // A filter matching no row is still a successful delete.
        let response = self
            .client
            .delete(self.table_url(table))
            .headers(self.auth_header.clone())
            .query(&[("id", id_filter(id))])
            .send()
            .await?;
        self.check_status(response).await?;
        debug!(table = %table, id = %id, "Deleted row");
        Ok(())
    }

    async fn subscribe(&self, table: &str) -> BackendResult<Subscription> {
        Ok(self.realtime.subscribe(table))
    }
}

fn id_filter(id: &RecordId) -> String {
    format!("eq.{}", id)
}

fn build_auth_headers(config: &ClientConfig) -> BackendResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("apikey"),
        HeaderValue::from_str(&config.api_key).map_err(|e| BackendError::Config(e.to_string()))?,
    );
    let bearer = format!("Bearer {}", config.bearer_token());
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&bearer).map_err(|e| BackendError::Config(e.to_string()))?,
    );
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_description() {
        let body: RemoteErrorBody = serde_json::from_str(
            r#"{"code":"23505","message":"duplicate key","details":"Key (part_number)=(A1) already exists.","hint":null}"#,
        )
        .expect("error body");
        assert_eq!(
            body.describe(),
            "23505: duplicate key (Key (part_number)=(A1) already exists.)"
        );
    }

    #[test]
    fn test_id_filter() {
        assert_eq!(id_filter(&RecordId::Number(12)), "eq.12");
        assert_eq!(id_filter(&RecordId::from("abc")), "eq.abc");
    }
}
