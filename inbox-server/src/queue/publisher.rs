//! Async RabbitMQ publisher for accepted messages.
//!
//! One connection and channel are shared by every request task and are
//! re-established lazily after the broker drops them.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{InboundMessage, INBOUND_MESSAGES_QUEUE};
use crate::store::MessageSink;

#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl Publisher {
    pub fn new(url: String) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                url,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    async fn ensure_connected(&self) -> Result<Channel> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Another task may have reconnected while we waited
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!("rabbitmq_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        ch.confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        ch.queue_declare(
            INBOUND_MESSAGES_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare inbound messages queue")?;

        info!(queue = INBOUND_MESSAGES_QUEUE, "rabbitmq_publisher_connected");

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Publish a message record and wait for the broker to confirm it.
    pub async fn publish_message(&self, message: &InboundMessage) -> Result<()> {
        let channel = self.ensure_connected().await?;

        let body = serde_json::to_vec(message).context("Failed to serialize message")?;

        let confirmation = channel
            .basic_publish(
                "",
                INBOUND_MESSAGES_QUEUE,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into())
                    .with_message_id(message.message_id.clone().into()),
            )
            .await
            .context("Failed to publish message")?
            .await
            .context("Failed to confirm publish")?;

        if confirmation.is_nack() {
            anyhow::bail!("broker rejected message {}", message.message_id);
        }

        info!(
            queue = INBOUND_MESSAGES_QUEUE,
            message_id = %message.message_id,
            alias_id = message.recipient_alias_id,
            body_length = body.len(),
            "rabbitmq_message_published"
        );

        Ok(())
    }

    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        info!("rabbitmq_publisher_closed");
    }
}

#[async_trait]
impl MessageSink for Publisher {
    /// The broker assigns no identifier, so the message id is returned.
    async fn store(&self, message: InboundMessage) -> anyhow::Result<String> {
        self.publish_message(&message).await?;
        Ok(message.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_is_lazy() {
        let publisher = Publisher::new("amqp://localhost:5672".to_string());
        let clone = publisher.clone();
        assert_eq!(Arc::strong_count(&clone.inner), 2);
    }

    #[tokio::test]
    async fn test_publish_fails_without_broker() {
        let publisher = Publisher::new("amqp://127.0.0.1:1/%2f".to_string());
        let message = InboundMessage {
            recipient_alias_id: 1,
            alias_local_part: "river-ab12".to_string(),
            received_at: chrono::Utc::now(),
            message_id: "id".to_string(),
            subject: "s".to_string(),
            from_address: "f".to_string(),
            preview_snippet: None,
            has_html_body: false,
            raw_body: String::new(),
            parsed: None,
        };
        assert!(publisher.store(message).await.is_err());
    }
}
