//! Request parameters and the canonical cache key derived from them.
//!
//! Two requests with equal method, path, params and body produce the same
//! cache key and therefore share one [`crate::Query`].


use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Headers and other response/request metadata, ordered for determinism
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters describing one remote resource.
///
/// Headers are sent with the request but are not part of the cache key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRequest {
    pub method: Method,
    pub path: String,
    pub params: BTreeMap<String, String>,
    pub headers: Metadata,
    pub body: Option<serde_json::Value>,
}

impl QueryRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(
        path: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn with_param(
        mut self,
        name: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(
        mut self,
        body: serde_json::Value,
    ) -> Self {
        self.body = Some(body);
        self
    }

    /// Canonical cache key: `METHOD path?k=v&k=v` plus ` body` when a body is set.
    ///
    /// Params are emitted in key order and the body is serialized from
    /// `serde_json::Value`, whose maps are ordered, so the key is a pure function
    /// of the request parameters.
    pub fn cache_key(&self) -> String {
        let mut key = format!("{} {}", self.method, self.path);
        if !self.params.is_empty() {
            key.push('?');
            key.push_str(&self.query_string());
        }
        if let Some(body) = &self.body {
            key.push(' ');
            key.push_str(&body.to_string());
        }
        key
    }

    /// `k=v` pairs joined by `&`, in key order. Values are not percent-encoded;
    /// encoding is the transport's concern.
    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}
