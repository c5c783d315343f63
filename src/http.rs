use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("GET {url}: HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("GET {url}: read body: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text; invalid UTF-8 is replaced rather than rejected.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The only way the scraper talks to the network.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &Url, headers: &HeaderMap) -> Result<HttpResponse, FetchError>;
}

/// GET that treats any non-2xx status as a failure.
pub async fn get_success<F: HttpFetch + ?Sized>(
    fetcher: &F,
    url: &Url,
    headers: &HeaderMap,
) -> Result<HttpResponse, FetchError> {
    let response = fetcher.get(url, headers).await?;
    if !response.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status,
        });
    }
    Ok(response)
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &Url, headers: &HeaderMap) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Body {
                url: url.to_string(),
                source,
            })?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
