use crate::{errors::Result, response::StoredResponse};
use bytes::Bytes;
use http::{HeaderMap, Method};
use std::{
    path::Path,
    sync::RwLock,
    time::{Duration, Instant},
};
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::debug;

/// How a request authenticates against the server under test.
#[derive(Debug, Clone, PartialEq)]
pub enum Auth {
    None,
    Basic { username: String, password: String },
    Bearer(String),
}

impl Auth {
    pub fn basic(username: &str, password: &str) -> Self {
        Auth::Basic {
            username: username.to_owned(),
            password: password.to_owned(),
        }
    }
}

/// Shared HTTP client wrapper. Sends a request with the given credentials,
/// optionally retrying exactly once on transport failure, and returns the
/// drained response plus elapsed time. Any status code the server answers
/// with is a final result.
pub struct Dispatcher {
    client: reqwest::Client,
    retry_enabled: bool,
    send_line_references: bool,
    scenario_label: RwLock<Option<String>>,
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) || method.as_str() == "PROPFIND"
}

impl Dispatcher {
    pub fn new(
        timeout: Duration,
        retry_enabled: bool,
        send_line_references: bool,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Dispatcher {
            client,
            retry_enabled,
            send_line_references,
            scenario_label: RwLock::new(None),
        })
    }

    /// Label fed into `X-Request-Id` when line references are enabled.
    pub fn set_scenario_label(&self, label: Option<String>) {
        *self.scenario_label.write().unwrap() = label;
    }

    fn build(
        &self,
        method: &Method,
        url: &str,
        auth: &Auth,
        headers: &HeaderMap,
    ) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method.clone(), url)
            .headers(headers.clone());
        builder = match auth {
            Auth::None => builder,
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Auth::Bearer(token) => builder.bearer_auth(token),
        };
        if self.send_line_references {
            if let Some(label) = self.scenario_label.read().unwrap().as_deref() {
                builder = builder.header("X-Request-Id", label);
            }
        }
        builder
    }

    /// Send a request with an in-memory body (or none at all).
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        auth: &Auth,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<StoredResponse> {
        let started = Instant::now();
        let attempt = || {
            let mut builder = self.build(&method, url, auth, &headers);
            if let Some(body) = &body {
                builder = builder.body(body.clone());
            }
            builder.send()
        };

        let response = match attempt().await {
            Ok(response) => response,
            Err(err) if self.retry_enabled && is_idempotent(&method) => {
                debug!(r#"retrying once "{} {}" after transport failure: {}"#, method, url, err);
                attempt().await?
            }
            Err(err) => return Err(err.into()),
        };
        self.drain(method, url, response, started).await
    }

    /// Send a request streaming its body from a file. Streams cannot be
    /// replayed, so no retry applies here.
    pub async fn send_file(
        &self,
        method: Method,
        url: &str,
        auth: &Auth,
        headers: HeaderMap,
        filepath: &Path,
    ) -> Result<StoredResponse> {
        let started = Instant::now();
        let file = tokio::fs::File::open(filepath).await?;
        let stream = FramedRead::new(file, BytesCodec::new());
        let response = self
            .build(&method, url, auth, &headers)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await?;
        self.drain(method, url, response, started).await
    }

    async fn drain(
        &self,
        method: Method,
        url: &str,
        response: reqwest::Response,
        started: Instant,
    ) -> Result<StoredResponse> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        let elapsed = started.elapsed();
        debug!(
            r#""{} {}" - {} ({} ms)"#,
            method,
            url,
            status.as_u16(),
            elapsed.as_millis()
        );
        Ok(StoredResponse::new(status, headers, body, elapsed))
    }
}
