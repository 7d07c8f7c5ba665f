use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CoordError, Result};

/// Default per-call timeout (§4.2, §5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Typed JSON POST/GET with timeout. Does not retry internally; retry
/// policy belongs to the caller (heartbeat loop, assignment push, etc.).
#[derive(Debug, Clone)]
pub struct ShardHttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for ShardHttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ShardHttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        Self::into_body(url, resp).await
    }

    /// Returns `Ok(None)` on a 404 response instead of an error, matching
    /// the cache-route contract (`Guild | 404`).
    pub async fn get_opt<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::into_body(url, resp).await.map(Some)
    }

    pub async fn post<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        url: &str,
        body: &Req,
    ) -> Result<Resp> {
        let resp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        Self::into_body(url, resp).await
    }

    /// Fire-and-forget acknowledgement: succeeds on any 2xx, discards the
    /// body.
    pub async fn post_ack<Req: Serialize + ?Sized>(&self, url: &str, body: &Req) -> Result<()> {
        let resp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CoordError::Transport {
                url: url.to_string(),
                cause: format!("non-2xx status {status}"),
            });
        }
        Ok(())
    }

    async fn into_body<T: DeserializeOwned>(url: &str, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            return Err(CoordError::Transport {
                url: url.to_string(),
                cause: format!("non-2xx status {status}"),
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| transport_error(url, e))
    }
}

fn transport_error(url: &str, cause: reqwest::Error) -> CoordError {
    CoordError::Transport {
        url: url.to_string(),
        cause: cause.to_string(),
    }
}
