use crate::config::MessageBrokerConfig;
use crate::db::models::Alert;
use crate::error::Error;
use crate::messaging::event::AlertMessage;
use crate::services::AlertNotifier;
use anyhow::Result;
use async_trait::async_trait;
use deadpool_lapin::{Config, Manager, Pool};
use lapin::{
    options::{BasicPublishOptions, ExchangeDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, ConnectionProperties, ExchangeKind,
};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// RabbitMQ alert publisher
pub struct MessageBroker {
    /// Connection pool
    pool: Pool,
    config: MessageBrokerConfig,
    /// Cached publishing channel
    channel: Arc<Mutex<Option<Channel>>>,
}

impl MessageBroker {
    /// Create the pool and declare the alert exchange
    pub async fn new(config: MessageBrokerConfig) -> Result<Self> {
        let timeout = Some(Duration::from_millis(config.timeout_ms));
        let pool_config = Config {
            url: Some(config.uri.clone()),
            pool: Some(deadpool_lapin::PoolConfig {
                max_size: config.pool_size as usize,
                queue_mode: deadpool::managed::QueueMode::Fifo,
                timeouts: deadpool::managed::Timeouts {
                    wait: timeout,
                    create: timeout,
                    recycle: timeout,
                },
            }),
            connection_properties: ConnectionProperties::default(),
        };
        let pool = pool_config
            .create_pool(Some(deadpool_lapin::Runtime::Tokio1))
            .map_err(|e| Error::Config(format!("Invalid RabbitMQ pool config: {}", e)))?;

        let broker = Self {
            pool,
            config,
            channel: Arc::new(Mutex::new(None)),
        };
        broker.init().await?;

        Ok(broker)
    }

    async fn init(&self) -> Result<()> {
        let channel = self.open_channel().await?;

        channel
            .exchange_declare(
                &self.config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::Service(format!("Failed to declare exchange: {}", e)))?;

        *self.channel.lock().await = Some(channel);
        info!(
            "RabbitMQ alert publisher ready on exchange {}",
            self.config.exchange
        );

        Ok(())
    }

    /// Get a connection from the pool with retry
    async fn get_connection(&self) -> Result<deadpool::managed::Object<Manager>> {
        let mut attempts = 0;
        let max_attempts = self.config.retry_attempts.max(1);

        loop {
            attempts += 1;
            match self.pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(err) => {
                    if attempts >= max_attempts {
                        return Err(Error::Service(format!(
                            "Failed to get RabbitMQ connection after {} attempts: {}",
                            attempts, err
                        ))
                        .into());
                    }

                    warn!(
                        "Failed to get RabbitMQ connection (attempt {}/{}): {}",
                        attempts, max_attempts, err
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }
    }

    async fn open_channel(&self) -> Result<Channel> {
        let conn = self.get_connection().await?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| Error::Service(format!("Failed to create RabbitMQ channel: {}", e)))?;
        Ok(channel)
    }

    /// Reuse the cached channel while it is connected
    async fn get_channel(&self) -> Result<Channel> {
        let mut channel_guard = self.channel.lock().await;

        if let Some(channel) = &*channel_guard {
            if channel.status().connected() {
                return Ok(channel.clone());
            }
        }

        let channel = self.open_channel().await?;
        *channel_guard = Some(channel.clone());

        Ok(channel)
    }

    pub async fn publish(&self, message: &AlertMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        let routing_key = message.routing_key();
        let channel = self.get_channel().await?;

        channel
            .basic_publish(
                &self.config.exchange,
                &routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2),
            )
            .await
            .map_err(|e| Error::Service(format!("Failed to publish message: {}", e)))?;

        debug!(
            "Published alert {} with routing key: {}",
            message.alert_id, routing_key
        );

        Ok(())
    }
}

#[async_trait]
impl AlertNotifier for MessageBroker {
    fn name(&self) -> &str {
        "rabbitmq"
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        self.publish(&AlertMessage::from(alert)).await
    }
}

/// Create a shared broker
pub async fn create_message_broker(config: MessageBrokerConfig) -> Result<Arc<MessageBroker>> {
    let broker = MessageBroker::new(config).await?;

    Ok(Arc::new(broker))
}
