//! `reqwest` binding for the query and export endpoints.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::endpoint::{
    ExportEndpoint, ExportPayload, ExportRequest, QueryEndpoint, QueryPage, QueryRequest,
    RawQueryPage,
};
use crate::error::{ClientError, Result};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP client for the audit log service.
#[derive(Debug, Clone)]
pub struct HttpAuditClient {
    config: ClientConfig,
    base: String,
    http: reqwest::Client,
}

impl HttpAuditClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use auditscope_client::{ClientConfig, HttpAuditClient};
    ///
    /// let config = ClientConfig::new("https://audit.example.com/api");
    /// let client = HttpAuditClient::new(config)?;
    /// # Ok::<(), auditscope_client::ClientError>(())
    /// ```
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let base = config.base_url()?.as_str().trim_end_matches('/').to_string();

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ClientError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self { config, base, http })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the full URL for `path` below the base URL.
    #[must_use]
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> (String, reqwest::RequestBuilder) {
        let request_id = Uuid::now_v7().to_string();
        let builder = self
            .http
            .request(method, self.endpoint_url(path))
            .header(REQUEST_ID_HEADER, &request_id);
        (request_id, self.config.auth.apply(builder))
    }
}

#[async_trait]
impl QueryEndpoint for HttpAuditClient {
    async fn query(&self, request: QueryRequest) -> Result<QueryPage> {
        let (request_id, builder) = self.request(reqwest::Method::GET, "audit-logs");

        tracing::debug!(
            request_id = %request_id,
            page = request.page,
            page_size = request.page_size,
            "Querying audit logs"
        );

        let response = builder.query(&request.query_pairs()).send().await?;
        let response = error_for_status(response).await?;

        let raw: RawQueryPage = response.json().await?;
        let page = QueryPage::try_from(raw)?;

        tracing::debug!(
            request_id = %request_id,
            entries = page.entries.len(),
            total = page.total,
            "Audit log page received"
        );

        Ok(page)
    }
}

#[async_trait]
impl ExportEndpoint for HttpAuditClient {
    async fn export(&self, request: ExportRequest) -> Result<ExportPayload> {
        let (request_id, builder) = self.request(reqwest::Method::POST, "audit-logs/export");

        tracing::info!(
            request_id = %request_id,
            format = %request.format,
            selected = request.ids.as_ref().map_or(0, Vec::len),
            "Requesting audit log export"
        );

        let response = builder.json(&request).send().await?;
        let response = error_for_status(response).await?;

        let headers = response.headers();
        let filename = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition);
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value: &HeaderValue| value.to_str().ok())
            .map(ToString::to_string);

        let bytes = response.bytes().await?.to_vec();

        Ok(ExportPayload {
            bytes,
            filename,
            content_type,
        })
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), message = %message, "Audit log service returned an error");

    Err(ClientError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Extracts the filename from a `Content-Disposition` header value.
pub(crate) fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
