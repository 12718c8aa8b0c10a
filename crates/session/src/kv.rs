//! REST key-value backend
//!
//! Speaks the Redis-over-HTTP protocol used by Upstash/Vercel KV: each
//! command is POSTed as a JSON array (`["SET", key, value, "EX", secs]`)
//! with a bearer token, and the reply is `{"result": …}` or
//! `{"error": "…"}`.
//!
//! Every command carries the client-wide timeout. Dropping the returned
//! future aborts the in-flight request.

use std::time::Duration;

use common::Secret;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::store::{SessionStore, StoreError, StoreFuture, StoreResult, expiry_secs};

/// Reply envelope from the REST endpoint.
#[derive(Debug, Deserialize)]
struct KvReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Session store backed by a REST key-value service.
pub struct KvRestStore {
    client: reqwest::Client,
    url: String,
    token: Secret<String>,
}

impl KvRestStore {
    /// Build a client for `url` authenticating with `token`.
    pub fn new(url: String, token: Secret<String>, timeout: Duration) -> StoreResult<Self> {
        if token.is_empty() {
            return Err(StoreError::Unavailable("store token is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("building HTTP client: {e}")))?;
        Ok(Self { client, url, token })
    }

    /// Send one command and return the raw `result` value.
    async fn execute(&self, command: Value) -> StoreResult<Value> {
        let verb = command
            .get(0)
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_owned();

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.token.expose())
            .json(&command)
            .send()
            .await
            .map_err(|e| {
                warn!(command = %verb, error = %e, "store request failed");
                StoreError::Unavailable(format!("{verb} request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            warn!(command = %verb, %status, "store returned non-success status");
            return Err(StoreError::Unavailable(format!(
                "{verb} returned {status}: {body}"
            )));
        }

        let reply: KvReply = response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("{verb} reply is not valid JSON: {e}")))?;

        if let Some(err) = reply.error.filter(|e| !e.is_empty()) {
            warn!(command = %verb, error = %err, "store reported an error");
            return Err(StoreError::Unavailable(format!("{verb} failed: {err}")));
        }

        debug!(command = %verb, "store command completed");
        Ok(reply.result)
    }
}

/// Interpret an integer reply (`DEL`, `EXISTS`).
fn integer_result(verb: &str, value: &Value) -> StoreResult<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or_else(|| StoreError::Unavailable(format!("{verb} returned unexpected result {value}")))
}

impl SessionStore for KvRestStore {
    fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let secs = expiry_secs(ttl)?;
            self.execute(json!(["SET", key, value, "EX", secs])).await?;
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, String> {
        Box::pin(async move {
            match self.execute(json!(["GET", key])).await? {
                Value::Null => Err(StoreError::KeyNotFound),
                Value::String(s) => Ok(s),
                other => Err(StoreError::Unavailable(format!(
                    "GET returned unexpected result {other}"
                ))),
            }
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = self.execute(json!(["DEL", key])).await?;
            Ok(integer_result("DEL", &result)? > 0)
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = self.execute(json!(["EXISTS", key])).await?;
            Ok(integer_result("EXISTS", &result)? > 0)
        })
    }
}
