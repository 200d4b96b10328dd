//! Primitive call description and the transport trait.

use async_trait::async_trait;
use quarry_core::TransportError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// HTTP method of a primitive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request/response exchange with the remote service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportRequest {
    pub method: Method,
    /// Path relative to the service base URL, starting with `/`.
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl TransportRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path, Some(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Build a [`TransportError::Network`] for this request.
    pub fn network_error(&self, message: impl Into<String>) -> TransportError {
        TransportError::Network {
            method: self.method.to_string(),
            endpoint: self.path.clone(),
            message: message.into(),
        }
    }

    /// Build a [`TransportError::Status`] for this request.
    pub fn status_error(&self, status: u16, message: impl Into<String>) -> TransportError {
        TransportError::Status {
            method: self.method.to_string(),
            endpoint: self.path.clone(),
            status,
            message: message.into(),
        }
    }

    /// Build a [`TransportError::InvalidResponse`] for this request.
    pub fn invalid_response(&self, message: impl Into<String>) -> TransportError {
        TransportError::InvalidResponse {
            method: self.method.to_string(),
            endpoint: self.path.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Executes primitive calls against the remote service.
///
/// Implementations perform exactly one exchange per `call` and never retry;
/// rate limiting and caching happen above this boundary.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: TransportRequest) -> Result<Value, TransportError>;
}
