//! Outbound channel used by the binary: records each delivery in the log.

use async_trait::async_trait;
use common::UserId;
use domain::notification::{DeliveryChannel, DeliveryError, NotificationRecord};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogDeliveryChannel;

#[async_trait]
impl DeliveryChannel for LogDeliveryChannel {
    async fn deliver(
        &self,
        recipient: UserId,
        record: &NotificationRecord,
    ) -> Result<(), DeliveryError> {
        tracing::info!(
            %recipient,
            notification_id = %record.id,
            target = %record.target,
            title = %record.title,
            "notification delivered"
        );
        Ok(())
    }
}
