use crate::application::ports::identity::CredentialStore;
use crate::application::ports::transport::{
    Method, Transport, TransportRequest, TransportResponse,
};
use crate::shared::config::ApiConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP adapter over the authoritative store. Authenticated requests carry
/// the best-available bearer token and are retried exactly once on an
/// authorization failure when a refreshed credential is obtainable; all other
/// outcomes surface as-is. The client's own timeout is the only deadline.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(AppError::from)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn build(&self, request: &TransportRequest, token: Option<&str>) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(
        &self,
        request: &TransportRequest,
        token: Option<&str>,
    ) -> Result<TransportResponse, AppError> {
        debug!(method = %request.method, path = %request.path, "issuing request");
        let response = self.build(request, token).send().await?;
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok(TransportResponse::new(status, body))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn authenticated(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, AppError> {
        let token = self.credentials.access_token().await;
        let response = self.send(&request, token.as_deref()).await?;

        if response.status != 401 && response.status != 403 {
            return Ok(response);
        }

        // One retry with a refreshed credential, if one is obtainable.
        match self.credentials.refresh_token().await {
            Some(refreshed) => {
                debug!(path = %request.path, "retrying once with refreshed credential");
                self.send(&request, Some(&refreshed)).await
            }
            None => {
                warn!(path = %request.path, status = response.status, "credential refresh unavailable");
                Ok(response)
            }
        }
    }

    async fn public(&self, request: TransportRequest) -> Result<TransportResponse, AppError> {
        self.send(&request, None).await
    }
}
