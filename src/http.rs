//! Transport boundary for all GitHub API I/O.
//!
//! The client never talks to the network directly; it builds [`HttpRequest`]
//! values and hands them to an [`HttpTransport`]. Production code uses
//! [`ReqwestTransport`]; unit tests use the in-memory `MockTransport`.

use async_trait::async_trait;
use thiserror::Error;

/// HTTP methods used by the GitHub client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// HTTP headers as key/value pairs. Names are matched case-insensitively.
pub type HttpHeaders = Vec<(String, String)>;

/// A minimal HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Get the first header value matching `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

/// Transport seam for all HTTP I/O.
///
/// Implementations must follow redirects themselves if the endpoint needs
/// it (the Actions job-log endpoint redirects to blob storage).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// A real HTTP transport backed by reqwest.
///
/// The underlying client follows redirects by default, which the job-log
/// endpoint relies on.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (k, v) in request.headers {
            builder = builder.header(&k, &v);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let mut headers: HttpHeaders = Vec::new();
        for (name, value) in resp.headers() {
            headers.push((
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            ));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    /// In-memory mock transport: no sockets, no loopback servers.
    ///
    /// Responses are registered per method + URL and returned in FIFO order.
    /// Every request is recorded for later assertions.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        inner: Arc<Mutex<MockTransportInner>>,
    }

    #[derive(Default)]
    struct MockTransportInner {
        routes: HashMap<(HttpMethod, String), VecDeque<MockReply>>,
        requests: Vec<HttpRequest>,
    }

    enum MockReply {
        Response(HttpResponse),
        TransportError(String),
        /// Never resolves; the caller is expected to cancel.
        Pending,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a response for a method + URL.
        pub fn push_response(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            response: HttpResponse,
        ) {
            let mut inner = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner
                .routes
                .entry((method, url.into()))
                .or_default()
                .push_back(MockReply::Response(response));
        }

        /// Register a transport-level failure for a method + URL.
        pub fn push_transport_error(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            message: impl Into<String>,
        ) {
            let mut inner = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner
                .routes
                .entry((method, url.into()))
                .or_default()
                .push_back(MockReply::TransportError(message.into()));
        }

        /// Register a request that hangs until the caller cancels.
        pub fn push_pending(&self, method: HttpMethod, url: impl Into<String>) {
            let mut inner = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner
                .routes
                .entry((method, url.into()))
                .or_default()
                .push_back(MockReply::Pending);
        }

        /// Shorthand for a 200 response with a JSON body.
        pub fn push_json(&self, method: HttpMethod, url: impl Into<String>, body: &str) {
            self.push_response(
                method,
                url,
                HttpResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: body.as_bytes().to_vec(),
                },
            );
        }

        #[must_use]
        pub fn requests(&self) -> Vec<HttpRequest> {
            self.inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .requests
                .clone()
        }

        #[must_use]
        pub fn request_count(&self) -> usize {
            self.inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .requests
                .len()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let key = (request.method, request.url.clone());
            // Take the reply before any await so the lock is never held
            // across a suspension point.
            let reply = {
                let mut inner = self
                    .inner
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                inner.requests.push(request);
                inner.routes.get_mut(&key).and_then(|q| q.pop_front())
            };

            match reply {
                Some(MockReply::Response(resp)) => Ok(resp),
                Some(MockReply::TransportError(message)) => Err(HttpError::Transport(message)),
                Some(MockReply::Pending) => futures::future::pending().await,
                None => Err(HttpError::NoMockResponse {
                    method: key.0.as_str().to_string(),
                    url: key.1,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn response_header_lookup_is_case_insensitive() {
        let resp = HttpResponse {
            status: 200,
            headers: vec![
                ("Link".to_string(), "<a>; rel=\"next\"".to_string()),
                ("link".to_string(), "<b>; rel=\"next\"".to_string()),
            ],
            body: Vec::new(),
        };
        assert_eq!(resp.header("LINK"), Some("<a>; rel=\"next\""));
        assert_eq!(resp.header("missing"), None);
    }

    #[test]
    fn response_text_replaces_invalid_utf8() {
        let resp = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: vec![b'o', b'k', 0xff],
        };
        assert_eq!(resp.text(), "ok\u{fffd}");
    }

    #[tokio::test]
    async fn mock_transport_returns_responses_in_fifo_order() {
        let transport = MockTransport::new();
        let url = "https://api.github.com/x";
        for status in [200u16, 304] {
            transport.push_response(
                HttpMethod::Get,
                url,
                HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: Vec::new(),
                },
            );
        }

        let req = HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        assert_eq!(transport.send(req.clone()).await.unwrap().status, 200);
        assert_eq!(transport.send(req).await.unwrap().status, 304);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn mock_transport_errors_when_no_response_is_registered() {
        let transport = MockTransport::new();
        let req = HttpRequest {
            method: HttpMethod::Post,
            url: "https://api.github.com/missing".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        };

        let err = transport.send(req).await.expect_err("missing mock");
        match err {
            HttpError::NoMockResponse { method, url } => {
                assert_eq!(method, "POST");
                assert_eq!(url, "https://api.github.com/missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
