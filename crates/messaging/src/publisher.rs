use async_trait::async_trait;

use crate::{Ack, Message, Result};

/// The publish half of a broker.
///
/// `publish` resolves only once the broker has durably appended the record;
/// a returned `Ack` means the record is queued for every consumer of its
/// topic. Implementations must be safe to share between workers.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Appends a record and waits for the acknowledgment.
    async fn publish(&self, message: Message) -> Result<Ack>;
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for std::sync::Arc<P> {
    async fn publish(&self, message: Message) -> Result<Ack> {
        (**self).publish(message).await
    }
}
