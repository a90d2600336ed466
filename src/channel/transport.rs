use anyhow::Result;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Stream of raw message payloads from one subscription
pub type PayloadStream = BoxStream<'static, Vec<u8>>;

/// Publish/subscribe transport the room channel rides on
#[async_trait::async_trait]
pub trait RoomTransport: Send + Sync {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()>;

    /// Dropping the returned stream detaches the subscription
    async fn subscribe(&self, subject: &str) -> Result<PayloadStream>;
}

/// Opens transport connections; called again for every reconnect attempt
#[async_trait::async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn RoomTransport>>;
}

/// Subjects used by one client in one room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSubjects {
    /// Room-wide broadcasts
    pub events: String,
    /// Replies addressed to this user only
    pub direct: String,
    /// Messages from clients to the room server
    pub client: String,
}

impl RoomSubjects {
    pub fn new(room_id: &str, user_id: &str) -> Self {
        Self {
            events: format!("interview.room.{}.events", room_id),
            direct: format!("interview.room.{}.user.{}", room_id, user_id),
            client: format!("interview.room.{}.client", room_id),
        }
    }
}
