use anyhow::{Context, Result};
use async_nats::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::pipeline::RetryPolicy;

/// Request/reply access to the engines on the NATS bus
pub struct NatsClient {
    client: Client,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, request_timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            request_timeout,
            retry,
        })
    }

    /// Send a JSON request and decode the JSON reply.
    ///
    /// Timeouts and transport errors are retried per the retry policy;
    /// a reply that does not decode is not.
    pub async fn request<Req, Resp>(&self, subject: &str, request: &Req) -> Result<Resp, EngineError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request).map_err(|e| EngineError::Malformed(e.to_string()))?;

        let reply = self
            .retry
            .run(subject, || {
                let payload = payload.clone();
                async move {
                    debug!("Requesting {} ({} bytes)", subject, payload.len());
                    match tokio::time::timeout(
                        self.request_timeout,
                        self.client.request(subject.to_string(), payload.into()),
                    )
                    .await
                    {
                        Ok(Ok(message)) => Ok(message),
                        Ok(Err(e)) => Err(EngineError::Unavailable(e.to_string())),
                        Err(_) => Err(EngineError::Unavailable(format!(
                            "no reply on {} within {:?}",
                            subject, self.request_timeout
                        ))),
                    }
                }
            })
            .await?;

        serde_json::from_slice(&reply.payload).map_err(|e| EngineError::Malformed(e.to_string()))
    }

    /// Flush pending requests before the connection is dropped
    pub async fn close(&self) -> Result<()> {
        info!("Closing NATS connection");
        self.client.flush().await.context("Failed to flush NATS")?;
        Ok(())
    }
}
