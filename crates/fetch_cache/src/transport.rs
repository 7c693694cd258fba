/// The HTTP seam: a trait the cache talks through, so tests can script
/// responses without a network.
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum FetchError {
    #[error("{method:?} {url} failed with status {status}")]
    Status {
        url: String,
        method: HttpMethod,
        status: u16,
    },
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
    #[error("{url} returned text/html where a module payload was expected")]
    HtmlPayload { url: String },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
}

/// A fully-buffered response. `final_url` is the URL after any redirect
/// chain; it is the cache identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub final_url: String,
    // lowercased header names
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_html(&self) -> bool {
        self.content_type()
            .map(|ct| ct.trim_start().starts_with("text/html"))
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs one request, following redirects. Network-level failures
    /// are `FetchError::Network`; any status is returned as a response.
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, FetchError>;
}

/// The production transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("module-resolver")
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, FetchError> {
        let builder = match req.method {
            HttpMethod::Get => self.client.get(&req.url),
            HttpMethod::Head => self.client.head(&req.url),
        };
        let response = builder.send().await.map_err(|e| FetchError::Network {
            url: req.url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = if req.method == HttpMethod::Head {
            Vec::new()
        } else {
            response
                .bytes()
                .await
                .map_err(|e| FetchError::Network {
                    url: req.url.clone(),
                    message: e.to_string(),
                })?
                .to_vec()
        };

        Ok(HttpResponse {
            status,
            final_url,
            headers,
            body,
        })
    }
}
