//! Piwigo web API adapter.
//!
//! [`PiwigoApi`] implements [`crate::NetworkClient`] by translating each
//! operation into a `pwg.*` method call and decoding the JSON answer. The
//! HTTP side stays behind [`Transport`], which only moves a method name, its
//! form parameters and an optional file part, and hands back the parsed JSON
//! document.

mod client;
mod wire;

use async_trait::async_trait;

use crate::error::ClientResult;

pub use client::PiwigoApi;

/// One call of the Piwigo web API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwgRequest {
    /// Method name, e.g. `pwg.categories.getList`.
    pub method: &'static str,
    /// Form fields, in insertion order.
    pub params: Vec<(String, String)>,
    /// Binary part for upload calls.
    pub file: Option<Vec<u8>>,
}

impl PwgRequest {
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            params: Vec::new(),
            file: None,
        }
    }

    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn param_opt(self, name: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    pub fn with_file(mut self, data: Vec<u8>) -> Self {
        self.file = Some(data);
        self
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Moves requests to the server. Implementations own the session (cookies,
/// token) and report HTTP-level failures as [`crate::ClientError::Network`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the response body parsed as JSON.
    async fn call(&self, request: PwgRequest) -> ClientResult<serde_json::Value>;
}
