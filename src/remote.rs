//! HTTP client for the remote semantic search endpoint.
//!
//! Implements [`RemoteSearch`] over `reqwest`. One `POST` per call with no
//! retry, no backoff and, unless `remote.timeout_secs` is set, no
//! client-side timeout. Every failure collapses into [`RemoteUnavailable`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use contact_search_core::models::Dictionaries;
use contact_search_core::remote::{
    parse_response, RemoteRequest, RemoteResponse, RemoteSearch, RemoteUnavailable,
};

use crate::config::RemoteConfig;

/// Remote client posting JSON to a configured URL.
pub struct HttpRemoteClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpRemoteClient {
    /// Build a client from `[remote]` config.
    ///
    /// # Errors
    ///
    /// Fails if `url` is missing, or if `api_key_env` names an unset
    /// environment variable.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("remote.url required for http provider"))?;

        let api_key = match config.api_key_env.as_deref() {
            Some(var) => match std::env::var(var) {
                Ok(key) => Some(key),
                Err(_) => bail!("{} environment variable not set", var),
            },
            None => None,
        };

        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }

        Ok(Self {
            client: builder.build()?,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl RemoteSearch for HttpRemoteClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn call_remote(
        &self,
        raw: &str,
        dictionaries: &Dictionaries,
    ) -> Result<RemoteResponse, RemoteUnavailable> {
        let body = RemoteRequest::new(raw, dictionaries);
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteUnavailable::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteUnavailable::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteUnavailable::Transport(e.to_string()))?;
        parse_response(&bytes)
    }
}

/// Create the configured remote client, or `None` when the provider is
/// `"disabled"`.
pub fn create_remote(config: &RemoteConfig) -> Result<Option<Arc<dyn RemoteSearch>>> {
    if !config.is_enabled() {
        return Ok(None);
    }
    match config.provider.as_str() {
        "http" => Ok(Some(Arc::new(HttpRemoteClient::new(config)?))),
        other => bail!("Unknown remote provider: {}", other),
    }
}
