//! Per-call options and the fully built request.

use std::fmt;

use reqwest::Method;
use reqwest::header::HeaderMap;

use crate::DebugRecord;

/// What the caller may set on one call. Everything is optional; the
/// default is a `GET` against the configured base URL.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) method: Option<Method>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) base_url: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds a header. Tenant, credential, `user-id`, and `content-type`
    /// headers set by the builder take precedence over the same names
    /// given here.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// JSON request body.
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sends this call to `base_url` instead of the configured one.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// A request ready to send: URL resolved, headers stamped.
///
/// `Debug` shows the redacted [`DebugRecord`], never the raw headers.
#[derive(Clone)]
pub struct RequestDescriptor {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) debug: DebugRecord,
}

impl RequestDescriptor {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The headers that will be sent, credentials included.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn debug(&self) -> &DebugRecord {
        &self.debug
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("debug", &self.debug)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// A successful call's decoded body and its diagnostics.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub data: serde_json::Value,
    pub debug: DebugRecord,
}
