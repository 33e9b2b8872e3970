// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Redis pub/sub transport driver
//!
//! Publishes relay commands and telemetry payloads to redis channels. The
//! connection is established lazily on the first publish and dropped on any
//! error, so the next publish attempts a fresh connect; the control loop
//! treats each failed publish as an isolated, non-fatal event.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, warn};
use redis::aio::MultiplexedConnection;
use redis::Client;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{RelaySwitch, RelayTransport, TelemetryTransport};

/// Redis transport, shared by the actuator and the telemetry publisher
pub struct RedisTransport {
    url: String,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisTransport {
    /// Create a transport for the given redis URL (e.g.
    /// `redis://127.0.0.1:6379`); no connection is made yet
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection: Mutex::new(None),
        }
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            let client = Client::open(self.url.clone())
                .map_err(|e| anyhow!("invalid redis URL {}: {e}", self.url))?;
            match client.get_multiplexed_async_connection().await {
                Ok(conn) => {
                    debug!("connected to redis at {}", self.url);
                    *guard = Some(conn);
                }
                Err(e) => {
                    return Err(anyhow!("redis connection error: {e}"));
                }
            }
        }

        let conn = guard.as_mut().expect("connection just established");
        let result: Result<(), redis::RedisError> = redis::cmd("PUBLISH")
            .arg(topic)
            .arg(&payload)
            .query_async(conn)
            .await;

        if let Err(e) = result {
            // drop the connection so the next publish reconnects
            warn!("redis publish on '{topic}' failed, will reconnect: {e}");
            *guard = None;
            return Err(anyhow!("redis publish error: {e}"));
        }
        Ok(())
    }
}

#[async_trait]
impl RelayTransport for RedisTransport {
    async fn publish_relay(&self, state: RelaySwitch, topic: &str) -> Result<()> {
        self.publish(topic, state.as_str().to_string()).await
    }
}

#[async_trait]
impl TelemetryTransport for RedisTransport {
    async fn publish_telemetry(&self, payload: Value, topic: &str) -> Result<()> {
        self.publish(topic, payload.to_string()).await
    }
}
