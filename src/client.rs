use std::env;
use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use futures::stream::{self, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config_loader::ConfigSource;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUESTS, CLIENT_REQUEST_ERRORS};
use crate::sse::{SseFrame, process_sse};
use crate::stream::{ChatBackend, ChatStream};
use crate::types::{ChatStreamBody, ChatTurnRequest, RuntimeConfig};

const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
const API_URL_ENV: &str = "ANAFLOW_API_URL";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the AnaFlow service.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct AnaFlow {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl AnaFlow {
    /// Create a new AnaFlow client.
    ///
    /// The base URL can be provided directly or read from the ANAFLOW_API_URL environment
    /// variable, and defaults to a local development server.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `timeout` bounds non-streaming requests.  Streams are only bounded while connecting,
    /// because a research turn can legitimately stream for many minutes.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => url,
            None => env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
        };
        let base_url = parse_base_url(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The base URL every service path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a service path such as `chat/stream` against the base URL.
    pub fn resolve_service_url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Create and return default headers for API requests.
    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let url = response.url().to_string();

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };
        let message = if error_body.trim().is_empty() {
            format!("request to {url} failed")
        } else {
            error_body
        };

        match status_code {
            404 => Error::not_found(message, Some("endpoint".to_string()), Some(url)),
            408 | 504 => Error::timeout(message, None),
            _ => Error::api(status_code, message),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Fetch the runtime configuration from `GET <base>/config`.
    pub async fn fetch_config(&self) -> Result<RuntimeConfig> {
        let url = self.resolve_service_url("./config")?;
        CLIENT_REQUESTS.click();

        let response = self
            .client
            .get(url)
            .headers(Self::default_headers())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.map_send_error(e)
            })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        response.json::<RuntimeConfig>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse config: {e}"), Some(Box::new(e)))
        })
    }

    /// Open `POST <base>/chat/stream` and return its SSE frames.
    async fn open_event_stream(
        &self,
        body: ChatStreamBody,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<SseFrame>> + Send>>> {
        let url = self.resolve_service_url("chat/stream")?;
        let mut headers = Self::default_headers();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        CLIENT_REQUESTS.click();

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.map_send_error(e)
            })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        Ok(Box::pin(process_sse(response.bytes_stream())))
    }

    /// Start a chat turn and stream its events.
    ///
    /// The request is not sent until the returned stream is first polled.  Firing `cancel`
    /// aborts the request and ends the stream with [`Error::Cancelled`].
    pub fn chat_stream(&self, request: &ChatTurnRequest, cancel: CancellationToken) -> ChatStream {
        if request.message.trim().is_empty() {
            return ChatStream::failed(Error::validation(
                "message must not be empty",
                Some("message".to_string()),
            ));
        }
        let body = ChatStreamBody::from(request);
        let client = self.clone();
        let frames =
            stream::once(async move { client.open_event_stream(body).await }).try_flatten();
        ChatStream::from_frames(frames, cancel)
    }
}

impl ChatBackend for AnaFlow {
    fn chat_stream(&self, request: &ChatTurnRequest, cancel: CancellationToken) -> ChatStream {
        AnaFlow::chat_stream(self, request, cancel)
    }
}

#[async_trait::async_trait]
impl ConfigSource for AnaFlow {
    async fn fetch_config(&self) -> Result<RuntimeConfig> {
        AnaFlow::fetch_config(self).await
    }
}

/// Parse a base URL, appending the trailing `/` that `Url::join` needs to keep the last
/// path segment.
fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut base_url = base_url.trim().to_string();
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    Url::parse(&base_url)
        .map_err(|e| Error::url(format!("invalid base URL {base_url:?}: {e}"), Some(e)))
}
