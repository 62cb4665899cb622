//! Store fetching configuration over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::{RelayError, RelayResult, StoreFetchError};

use super::{ConfigStore, StoreContext, StoreFactory, StorePayload};

const STORE: &str = "http";

/// Factory for the `http` store.
///
/// Options: `host` (default `localhost`), `port` (default 80, or 443 with
/// `ssl`), `path` (default `/`), `ssl`, `timeout` in milliseconds and a
/// `headers` object of string values. The response body is decoded with the
/// store's declared format.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpStoreFactory;

impl StoreFactory for HttpStoreFactory {
    fn create(&self, context: &StoreContext<'_>) -> RelayResult<Box<dyn ConfigStore>> {
        let config = context.config();
        let ssl = context.bool_or("ssl", false);
        let host = config
            .get("host")
            .and_then(Value::as_str)
            .unwrap_or("localhost");
        let port = match config.get("port") {
            None if ssl => 443,
            None => 80,
            Some(value) => value
                .as_u64()
                .and_then(|port| u16::try_from(port).ok())
                .ok_or_else(|| context.invalid("'port' must be a number between 0 and 65535"))?,
        };
        let raw_path = config.get("path").and_then(Value::as_str).unwrap_or("/");
        let path = if raw_path.starts_with('/') {
            raw_path.to_owned()
        } else {
            format!("/{raw_path}")
        };
        let scheme = if ssl { "https" } else { "http" };
        let url = format!("{scheme}://{host}:{port}{path}");

        let timeout = config
            .get("timeout")
            .map(|value| {
                value.as_u64().map(Duration::from_millis).ok_or_else(|| {
                    context.invalid("'timeout' must be a positive number of milliseconds")
                })
            })
            .transpose()?;
        let mut builder = Client::builder();
        if let Some(after) = timeout {
            builder = builder.timeout(after);
        }
        let client = builder
            .build()
            .map_err(|err| context.invalid(format!("cannot build HTTP client: {err}")))?;

        let headers = match config.get("headers") {
            None => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| {
                    value
                        .as_str()
                        .map(|text| (name.clone(), text.to_owned()))
                        .ok_or_else(|| context.invalid(format!("header '{name}' must be a string")))
                })
                .collect::<RelayResult<Vec<_>>>()?,
            Some(_) => return Err(context.invalid("'headers' must be an object")),
        };

        Ok(Box::new(HttpStore {
            client,
            url,
            headers,
            timeout,
        }))
    }
}

struct HttpStore {
    client: Client,
    url: String,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

#[async_trait]
impl ConfigStore for HttpStore {
    async fn fetch(&self) -> RelayResult<StorePayload> {
        let mut request = self.client.get(&self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await.map_err(|err| self.fetch_error(err))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreFetchError::not_found(STORE, self.url.as_str()).into_arc());
        }
        if !status.is_success() {
            return Err(StoreFetchError::unreachable(
                STORE,
                format!("{} answered with status {status}", self.url),
            )
            .into_arc());
        }
        let body = response.bytes().await.map_err(|err| self.fetch_error(err))?;
        Ok(StorePayload::Raw(body.to_vec()))
    }
}

impl HttpStore {
    fn fetch_error(&self, err: reqwest::Error) -> Arc<RelayError> {
        match self.timeout {
            Some(after) if err.is_timeout() => StoreFetchError::timeout(STORE, after).into_arc(),
            _ => StoreFetchError::unreachable(STORE, err).into_arc(),
        }
    }
}
