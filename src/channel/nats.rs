use super::transport::{PayloadStream, RoomTransport, TransportConnector};
use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use std::sync::Arc;
use tracing::{debug, info};

/// [`RoomTransport`] over a NATS connection
pub struct NatsTransport {
    client: Client,
}

impl NatsTransport {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl RoomTransport for NatsTransport {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .context("Failed to publish room message")?;

        debug!("Published to {}", subject);

        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<PayloadStream> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .context("Failed to subscribe to room subject")?;

        info!("Subscribed to {}", subject);

        Ok(subscriber.map(|msg| msg.payload.to_vec()).boxed())
    }
}

/// Opens a fresh [`NatsTransport`] per connection attempt
#[derive(Debug, Clone)]
pub struct NatsConnector {
    url: String,
}

impl NatsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait::async_trait]
impl TransportConnector for NatsConnector {
    async fn connect(&self) -> Result<Arc<dyn RoomTransport>> {
        let transport = NatsTransport::connect(&self.url).await?;
        Ok(Arc::new(transport))
    }
}
