//! Aptos REST and indexer client
//!
//! Thin wrapper over the fullnode `/view` and `/accounts/{a}/resource/{t}`
//! endpoints plus the GraphQL indexer. Every failure is reported as a
//! [`ResolutionError`] so it can flow straight out of a resolver batch.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use vaultlens_common::config::AppConfig;
use vaultlens_common::error::ResolutionError;
use vaultlens_common::types::AccountAddress;

#[derive(Clone)]
pub struct AptosClient {
    client: Client,
    node_url: String,
    indexer_url: String,
}

impl AptosClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        if let Some(api_key) = &config.aptos_api_key {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {api_key}")
                    .parse()
                    .context("Invalid APTOS_API_KEY")?,
            );
            builder = builder.default_headers(headers);
        }

        let client = builder.build().context("Failed to build AptosClient")?;

        Ok(Self {
            client,
            node_url: config.aptos_node_url.trim_end_matches('/').to_string(),
            indexer_url: config.aptos_indexer_url.clone(),
        })
    }

    /// Call a Move view function and return its return values.
    pub async fn view(
        &self,
        function: &str,
        type_arguments: &[String],
        arguments: Vec<Value>,
    ) -> Result<Vec<Value>, ResolutionError> {
        let url = format!("{}/view", self.node_url);
        let body = json!({
            "function": function,
            "type_arguments": type_arguments,
            "arguments": arguments,
        });

        tracing::debug!(function, "Calling view function");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResolutionError::Transport(format!("POST /view {function}: {e}")))?;

        let resp = check_status(resp, function).await?;
        resp.json::<Vec<Value>>()
            .await
            .map_err(|e| ResolutionError::Decode(format!("{function} response: {e}")))
    }

    /// Read a resource's `data` object from an account.
    pub async fn resource(
        &self,
        account: AccountAddress,
        resource_type: &str,
    ) -> Result<Value, ResolutionError> {
        let url = format!(
            "{}/accounts/{}/resource/{}",
            self.node_url, account, resource_type
        );

        tracing::debug!(account = %account.short(), resource_type, "Reading resource");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                ResolutionError::Transport(format!("GET resource {resource_type}: {e}"))
            })?;

        let what = format!("{resource_type} at {account}");
        let resp = check_status(resp, &what).await?;
        let mut body = resp
            .json::<Value>()
            .await
            .map_err(|e| ResolutionError::Decode(format!("{what}: {e}")))?;

        match body.get_mut("data") {
            Some(data) => Ok(data.take()),
            None => Err(ResolutionError::Decode(format!(
                "{what}: response has no data field"
            ))),
        }
    }

    /// Run a GraphQL query against the indexer and return its `data` object.
    pub async fn graphql(&self, query: &str, variables: Value) -> Result<Value, ResolutionError> {
        let body = json!({ "query": query, "variables": variables });

        let resp = self
            .client
            .post(&self.indexer_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResolutionError::Transport(format!("POST indexer: {e}")))?;

        let resp = check_status(resp, "indexer query").await?;
        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| ResolutionError::Decode(format!("indexer response: {e}")))?;

        graphql_data(body)
    }
}

async fn check_status(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, ResolutionError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(ResolutionError::NotFound(format!("{what}: {text}")));
    }
    Err(ResolutionError::Transport(format!("{what} {status}: {text}")))
}

/// Split a GraphQL response into its data or its first error.
pub(crate) fn graphql_data(mut body: Value) -> Result<Value, ResolutionError> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if let Some(first) = errors.first() {
            let message = first
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ResolutionError::Transport(format!(
                "indexer query failed: {message}"
            )));
        }
    }

    match body.get_mut("data") {
        Some(data) if !data.is_null() => Ok(data.take()),
        _ => Err(ResolutionError::Decode(
            "indexer response has no data".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_data_extracted() {
        let body = json!({ "data": { "rows": [1, 2] } });
        assert_eq!(graphql_data(body).unwrap(), json!({ "rows": [1, 2] }));
    }

    #[test]
    fn test_graphql_error_reported() {
        let body = json!({
            "data": null,
            "errors": [{ "message": "field 'nope' not found" }]
        });
        let err = graphql_data(body).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::Transport("indexer query failed: field 'nope' not found".to_string())
        );
    }

    #[test]
    fn test_graphql_missing_data() {
        assert!(matches!(
            graphql_data(json!({})).unwrap_err(),
            ResolutionError::Decode(_)
        ));
    }
}
