use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn default_method() -> String {
    String::from("POST")
}

/// A request waiting to be replayed.
///
/// Jobs are persisted as camelCase JSON:
///
/// ```json
/// {"url": "/api/bookings", "method": "POST", "body": {"a": 1}, "headers": {}, "timestamp": 1700000000000}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Target endpoint.
    pub url: String,
    /// HTTP verb.
    #[serde(default = "default_method")]
    pub method: String,
    /// Payload, kept as structured data until the job is sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Extra headers, applied over the queue's default content type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// When the job was enqueued, in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// A job that has not been enqueued yet.
///
/// The queue stamps it with the current time on [`enqueue`](crate::OfflineQueue::enqueue).
///
/// ```rust
/// use tower_lifeline_offline::NewJob;
/// use serde_json::json;
///
/// let job = NewJob::post("/api/bookings")
///     .body(json!({ "room": 12 }))
///     .header("x-request-id", "abc");
/// assert_eq!(job.url(), "/api/bookings");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    url: String,
    method: Option<String>,
    body: Option<Value>,
    headers: BTreeMap<String, String>,
}

impl NewJob {
    /// Creates a job for `url` with the default method.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            body: None,
            headers: BTreeMap::new(),
        }
    }

    /// Creates a `POST` job for `url`.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(url)
    }

    /// Sets the HTTP verb. Unset means `POST`.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the payload.
    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a header. A later value for the same name replaces the earlier one.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The target endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.url.trim().is_empty() {
            return Err("job url is empty");
        }
        Ok(())
    }

    pub(crate) fn stamp(self, timestamp: u64) -> Job {
        Job {
            url: self.url,
            method: self.method.unwrap_or_else(default_method),
            body: self.body,
            headers: self.headers,
            timestamp,
        }
    }
}
