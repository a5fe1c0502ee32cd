//! The connection-tracked fetch endowment.
//!
//! Wraps a [`reqwest::Client`] so that every outstanding request is
//! registered in an open-connection set owned by this capability instance.
//! The teardown routine cancels every open request, and completions that
//! arrive after the snap's teardown epoch has advanced are discarded
//! instead of delivered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use warden_core::{EpochGuard, TeardownEpoch};

use crate::error::{EndowmentError, EndowmentResult};

/// Maximum bytes read from a response body.
pub const MAX_RESPONSE_BYTES: usize = 32 * 1024 * 1024;

/// Per-request timeout applied by the client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An outbound HTTP request as a snap describes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Absolute request URL.
    pub url: String,
    /// HTTP method, defaulting to GET.
    #[serde(default = "default_method")]
    pub method: String,
    /// Request headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Optional request body.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// The response handed back to the snap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers with string-representable values.
    pub headers: HashMap<String, String>,
    /// Response body (UTF-8, size-capped).
    pub body: String,
}

type ConnectionSet = Arc<Mutex<HashMap<u64, CancellationToken>>>;

/// Per-snap network capability.
#[derive(Debug)]
pub struct NetClient {
    client: reqwest::Client,
    guard: EpochGuard,
    open: ConnectionSet,
    next_id: AtomicU64,
}

impl NetClient {
    /// Build a client bound to the snap's teardown epoch.
    ///
    /// # Errors
    ///
    /// Returns [`EndowmentError::Fetch`] if the HTTP client cannot be
    /// constructed.
    pub fn new(epoch: Arc<TeardownEpoch>) -> EndowmentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EndowmentError::Fetch {
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            guard: EpochGuard::new(epoch),
            open: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        })
    }

    /// Number of requests currently in flight.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        lock_set(&self.open).len()
    }

    /// Perform an outbound request.
    ///
    /// The request is registered in the open-connection set for its whole
    /// lifetime, raced against this instance's cancellation, and its
    /// completion is dropped if the snap is torn down while it is in
    /// flight.
    ///
    /// # Errors
    ///
    /// Returns [`EndowmentError::Fetch`] on transport or shape errors and
    /// [`EndowmentError::TornDown`] if the request was cancelled or its
    /// completion arrived after teardown.
    pub async fn fetch(&self, request: FetchRequest) -> EndowmentResult<FetchResponse> {
        let method = parse_method(&request.method)?;
        let headers = build_headers(&request.headers)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        lock_set(&self.open).insert(id, token.clone());

        let mut builder = self.client.request(method, &request.url).headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let raced = async {
            tokio::select! {
                result = perform(builder) => result,
                () = token.cancelled() => Err(EndowmentError::TornDown),
            }
        };
        let outcome = self.guard.run(raced).await;

        lock_set(&self.open).remove(&id);
        match outcome {
            Ok(result) => result,
            Err(_) => Err(EndowmentError::TornDown),
        }
    }

    /// Cancel every open request. Used by the endowment teardown routine.
    pub fn abort_all(&self) {
        let drained: Vec<CancellationToken> = {
            let mut open = lock_set(&self.open);
            open.drain().map(|(_, token)| token).collect()
        };
        for token in drained {
            token.cancel();
        }
    }
}

async fn perform(builder: reqwest::RequestBuilder) -> EndowmentResult<FetchResponse> {
    let response = builder.send().await.map_err(|e| EndowmentError::Fetch {
        reason: format!("http request failed: {e}"),
    })?;

    let status = response.status().as_u16();
    let mut headers = HashMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }

    let mut response = response;
    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| EndowmentError::Fetch {
        reason: format!("failed to read response body: {e}"),
    })? {
        if bytes.len() + chunk.len() > MAX_RESPONSE_BYTES {
            return Err(EndowmentError::Fetch {
                reason: format!("response body exceeded the {MAX_RESPONSE_BYTES} byte limit"),
            });
        }
        bytes.extend_from_slice(&chunk);
    }

    let body = String::from_utf8(bytes).map_err(|_| EndowmentError::Fetch {
        reason: "response body is not valid UTF-8".to_string(),
    })?;

    Ok(FetchResponse {
        status,
        headers,
        body,
    })
}

fn parse_method(method: &str) -> EndowmentResult<reqwest::Method> {
    match method.to_uppercase().as_str() {
        "GET" => Ok(reqwest::Method::GET),
        "POST" => Ok(reqwest::Method::POST),
        "PUT" => Ok(reqwest::Method::PUT),
        "DELETE" => Ok(reqwest::Method::DELETE),
        "PATCH" => Ok(reqwest::Method::PATCH),
        "HEAD" => Ok(reqwest::Method::HEAD),
        "OPTIONS" => Ok(reqwest::Method::OPTIONS),
        other => Err(EndowmentError::Fetch {
            reason: format!("unsupported http method: {other}"),
        }),
    }
}

fn build_headers(raw: &HashMap<String, String>) -> EndowmentResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in raw {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| EndowmentError::Fetch {
            reason: format!("invalid header name {name}: {e}"),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| EndowmentError::Fetch {
            reason: format!("invalid header value: {e}"),
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn lock_set(
    set: &Mutex<HashMap<u64, CancellationToken>>,
) -> MutexGuard<'_, HashMap<u64, CancellationToken>> {
    set.lock().unwrap_or_else(|e| e.into_inner())
}
