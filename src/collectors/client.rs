//! HTTP client creation and request dispatch for search providers.

use reqwest::header;
use serde_json::Value;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::types::{HttpMethod, SearchRequest, USER_AGENT};
use crate::error::{PipelineError, Result};
use crate::util::truncate_chars;
use crate::TARGET_WEB_REQUEST;

/// Shared client with a per-request timeout.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::default())
            .build()
            .map_err(|e| {
                PipelineError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            timeout: request_timeout,
        })
    }

    /// Send a provider request and decode the JSON body.
    ///
    /// Timeouts, connection failures and non-2xx statuses are transport errors;
    /// an undecodable body is a parse error. Error text never carries the
    /// query string, which may hold an API key.
    pub async fn send(&self, request: SearchRequest) -> Result<Value> {
        debug!(target: TARGET_WEB_REQUEST, "{:?} {}", request.method, request.url);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        builder = builder
            .header(header::ACCEPT, "application/json")
            .query(&request.query);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match timeout(self.timeout, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(PipelineError::Transport(format!(
                    "{}: {}",
                    request.url,
                    e.without_url()
                )))
            }
            Err(_) => {
                return Err(PipelineError::Transport(format!(
                    "{}: timed out after {:?}",
                    request.url, self.timeout
                )))
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = match timeout(self.timeout, response.text()).await {
                Ok(Ok(body)) => body,
                _ => String::new(),
            };
            warn!(
                target: TARGET_WEB_REQUEST,
                "{} returned {}: {}",
                request.url,
                status,
                truncate_chars(&body, 300)
            );
            return Err(PipelineError::Transport(format!(
                "{} returned status {}",
                request.url, status
            )));
        }

        let text = match timeout(self.timeout, response.text()).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(e.without_url().into()),
            Err(_) => {
                return Err(PipelineError::Transport(format!(
                    "{}: body read timed out",
                    request.url
                )))
            }
        };
        serde_json::from_str(&text).map_err(|e| {
            PipelineError::Parse(format!("{}: invalid JSON body: {}", request.url, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_transport_error_hides_query_string() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let http = HttpClient::new(Duration::from_secs(5)).unwrap();
        let request = SearchRequest::get(format!("http://{}/v1/news/all", addr))
            .param("api_token", "SECRET123")
            .param("search", "Valencia flood");

        let err = http.send(request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Transport(_)));
        let message = err.to_string();
        assert!(message.contains("/v1/news/all"));
        assert!(!message.contains("SECRET123"), "leaked: {}", message);
    }

    #[tokio::test]
    async fn test_stalled_error_body_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 503 Service Unavailable\r\nTransfer-Encoding: chunked\r\nContent-Type: application/json\r\n\r\n5\r\n{\"err\r\n",
                    )
                    .await;
                // Never finish the body
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });

        let http = HttpClient::new(Duration::from_millis(300)).unwrap();
        let request = SearchRequest::get(format!("http://{}/search", addr)).param("key", "SECRET123");
        let result = timeout(Duration::from_secs(10), http.send(request)).await;

        let err = result.expect("send must give up on its own").unwrap_err();
        assert!(matches!(err, PipelineError::Transport(_)));
        assert!(!err.to_string().contains("SECRET123"));
    }
}
