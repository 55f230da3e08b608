//! Messaging contracts and the in-process channel implementation.
//!
//! # Data Flow
//! ```text
//! Producer::publish(topic, key, value)
//!     → ChannelBroker (one broadcast channel per topic)
//!     → ChannelConsumer (subscribed at construction)
//!     → consume loop spawned by on_start
//!     → MessageHandler::handle
//! ```
//!
//! # Design Decisions
//! - on_start spawns the loop and returns; on_stop cancels it and waits for
//!   the in-flight message up to the hook deadline
//! - A handler error is logged and the loop moves on to the next message
//! - The consumer subscribes when it is built, so messages published by
//!   other start hooks are not lost

pub mod channel;

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::config::{ConfigSource, MessagingConfig};
use crate::contract;
use crate::kernel::{AppBuilder, BoxError, KernelError};
use crate::lifecycle::Hook;
use crate::observability::Logger;

pub use channel::{ChannelBroker, ChannelConsumer};

/// A message as seen by handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub topic: String,
    pub timestamp: SystemTime,
}

impl Message {
    pub fn new(topic: impl Into<String>, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            topic: topic.into(),
            timestamp: SystemTime::now(),
        }
    }
}

/// Processes consumed messages.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> Result<(), BoxError>;
}
contract!(MessageHandler);

/// A background message consumer.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Begin consuming. Returns once the consume loop is running.
    async fn start(&self) -> Result<(), BoxError>;

    /// Stop consuming, waiting for in-flight processing until `deadline`.
    async fn stop(&self, deadline: Instant) -> Result<(), BoxError>;
}
contract!(Consumer);

/// Publishes messages to topics.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn publish(&self, topic: &str, key: Vec<u8>, value: Vec<u8>) -> Result<(), BoxError>;

    async fn publish_batch(&self, topic: &str, messages: Vec<Message>) -> Result<(), BoxError>;

    async fn close(&self) -> Result<(), BoxError>;
}
contract!(Producer);

/// Register `ChannelBroker` as `dyn Producer` and `ChannelConsumer` as
/// `dyn Consumer` for the `[messaging]` topic.
///
/// Requires bindings for `dyn MessageHandler` and `dyn Logger`.
pub fn module(app: &AppBuilder) -> Result<(), KernelError> {
    app.provide(|(config,): (Option<Arc<ConfigSource>>,), lifecycle| {
        let settings = settings(config.as_deref())?;
        let broker = ChannelBroker::new(settings.buffer);
        let closing = broker.clone();
        lifecycle.append(Hook::new().on_stop(move |_| async move { closing.close().await }));
        Ok(broker)
    })?;
    app.provide(
        |(config, broker, handler, logger): (
            Option<Arc<ConfigSource>>,
            Arc<ChannelBroker>,
            Arc<dyn MessageHandler>,
            Arc<dyn Logger>,
        ),
         lifecycle| {
            let settings = settings(config.as_deref())?;
            let consumer = ChannelConsumer::new(&broker, &settings.topic, handler, logger);
            let (starting, stopping) = (consumer.clone(), consumer.clone());
            lifecycle.append(
                Hook::new()
                    .on_start(move |_| async move { starting.start().await })
                    .on_stop(move |ctx| async move { stopping.stop(ctx.deadline()).await }),
            );
            Ok(consumer)
        },
    )?;
    app.bind::<dyn Producer, ChannelBroker>()?;
    app.bind::<dyn Consumer, ChannelConsumer>()
}

fn settings(config: Option<&ConfigSource>) -> Result<MessagingConfig, BoxError> {
    match config {
        Some(source) => Ok(source.section::<MessagingConfig>()?),
        None => Ok(MessagingConfig::default()),
    }
}
