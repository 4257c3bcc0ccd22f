//! Line protocol writer over HTTP
//!
//! Implements [`LineWriter`] against the database's `/write` endpoint:
//! one `POST {write_url}?db={database}&precision=ms` per call with the
//! newline-delimited body. Non-2xx statuses come back as responses; only
//! failures without a response become [`TransportError`]s. No retries here;
//! the submitter owns the per-item fallback.

use std::time::Duration;

use async_trait::async_trait;
use metricbuf_core::{LineWriter, TransportError, WriteResponse};
use metricbuf_domain::constants::{DEFAULT_TIMEOUT_MS, USER_AGENT, WRITE_PRECISION};
use metricbuf_domain::{MetricbufError, PipelineConfig};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as ReqwestClient;
use tracing::debug;
use url::Url;

use crate::errors::conversions::transport_error;
use crate::errors::InfraError;

/// HTTP writer for one write endpoint.
#[derive(Clone)]
pub struct InfluxWriter {
    client: ReqwestClient,
    write_url: Url,
    credentials: Option<(String, String)>,
    timeout: Duration,
}

impl InfluxWriter {
    /// Start building a writer for `write_url`.
    pub fn builder(write_url: impl Into<String>) -> InfluxWriterBuilder {
        InfluxWriterBuilder::new(write_url)
    }

    /// Writer for the endpoint, credentials and timeout in `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, MetricbufError> {
        let mut builder = Self::builder(config.write_url()).timeout(config.timeout());
        if let Some((user, password)) = config.credentials() {
            builder = builder.credentials(user, password);
        }
        builder.build()
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

#[async_trait]
impl LineWriter for InfluxWriter {
    async fn write(&self, database: &str, body: String) -> Result<WriteResponse, TransportError> {
        let mut request = self
            .client
            .post(self.write_url.clone())
            .query(&[("db", database), ("precision", WRITE_PRECISION)])
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        debug!(url = %self.write_url, database, "sending write request");
        let response =
            request.send().await.map_err(|err| transport_error(&err, self.timeout))?;

        let status = response.status();
        debug!(database, %status, "received write response");
        let body = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };
        Ok(WriteResponse::new(status.as_u16(), body))
    }
}

impl std::fmt::Debug for InfluxWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxWriter")
            .field("write_url", &self.write_url.as_str())
            .field("authenticated", &self.credentials.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for [`InfluxWriter`].
#[derive(Debug)]
pub struct InfluxWriterBuilder {
    write_url: String,
    timeout: Duration,
    user_agent: String,
    credentials: Option<(String, String)>,
    accept_invalid_certs: bool,
}

impl InfluxWriterBuilder {
    fn new(write_url: impl Into<String>) -> Self {
        Self {
            write_url: write_url.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            user_agent: USER_AGENT.to_string(),
            credentials: None,
            accept_invalid_certs: false,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Basic auth credentials sent with every request.
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    /// Test-only helper to allow insecure TLS (e.g., self-signed certs).
    #[cfg(test)]
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn build(self) -> Result<InfluxWriter, MetricbufError> {
        let write_url = Url::parse(&self.write_url).map_err(|err| {
            MetricbufError::Config(format!("invalid write URL '{}': {err}", self.write_url))
        })?;

        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).user_agent(self.user_agent).no_proxy();
        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(|err| MetricbufError::from(InfraError::from(err)))?;

        Ok(InfluxWriter { client, write_url, credentials: self.credentials, timeout: self.timeout })
    }
}
