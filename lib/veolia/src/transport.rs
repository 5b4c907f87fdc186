use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_tracing::TracingMiddleware;

use crate::error::Result;

const CONTENT_TYPE_XML: &str = "application/xml; charset=UTF-8";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP session against the service endpoint.
///
/// One POST per request, no retry. Timeouts and connection failures surface
/// as transport errors for the caller to handle.
pub(crate) struct Session {
    client: ClientWithMiddleware,
    endpoint: String,
}

impl Session {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let client = reqwest_middleware::ClientBuilder::new(client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self::with_client(endpoint, client))
    }

    pub fn with_client(endpoint: impl Into<String>, client: ClientWithMiddleware) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Posts one envelope and returns the HTTP status with the raw body.
    pub async fn post(&self, body: String) -> Result<(StatusCode, String)> {
        let response = self
            .client
            .post(self.endpoint.as_str())
            .header(header::CONTENT_TYPE, CONTENT_TYPE_XML)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        tracing::debug!("Response status={status}");
        tracing::debug!("Response text={text}");

        Ok((status, text))
    }
}
