//! In-process broker built on tokio broadcast channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::kernel::BoxError;
use crate::lifecycle::Shutdown;
use crate::messaging::{Consumer, Message, MessageHandler, Producer};
use crate::observability::{Field, Logger};

/// Topic registry. Cloning shares the same topics.
#[derive(Clone, Debug)]
pub struct ChannelBroker {
    topics: Arc<DashMap<String, broadcast::Sender<Message>>>,
    buffer: usize,
    closed: Arc<AtomicBool>,
}

impl ChannelBroker {
    /// `buffer` is the per-topic capacity; slow consumers past it lag.
    pub fn new(buffer: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            buffer: buffer.max(1),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Message> {
        self.sender(topic).subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Message> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .clone()
    }

    fn send(&self, message: Message) -> Result<(), BoxError> {
        if self.is_closed() {
            return Err(format!("broker closed, dropping message for {:?}", message.topic).into());
        }
        let topic = message.topic.clone();
        if self.sender(&topic).send(message).is_err() {
            tracing::debug!(topic = %topic, "No subscribers, message dropped");
        }
        Ok(())
    }
}

#[async_trait]
impl Producer for ChannelBroker {
    async fn publish(&self, topic: &str, key: Vec<u8>, value: Vec<u8>) -> Result<(), BoxError> {
        self.send(Message::new(topic, key, value))
    }

    async fn publish_batch(&self, topic: &str, messages: Vec<Message>) -> Result<(), BoxError> {
        for mut message in messages {
            message.topic = topic.to_string();
            self.send(message)?;
        }
        Ok(())
    }

    /// Rejects further publishes. Subscribers drain what is buffered.
    async fn close(&self) -> Result<(), BoxError> {
        self.closed.store(true, Ordering::SeqCst);
        self.topics.clear();
        Ok(())
    }
}

struct Running {
    cancel: Arc<Shutdown>,
    task: JoinHandle<()>,
}

struct ConsumerState {
    topic: String,
    handler: Arc<dyn MessageHandler>,
    logger: Arc<dyn Logger>,
    receiver: Mutex<Option<broadcast::Receiver<Message>>>,
    running: Mutex<Option<Running>>,
}

/// Consumes one topic of a [`ChannelBroker`]. Cloning shares the consumer.
#[derive(Clone)]
pub struct ChannelConsumer {
    state: Arc<ConsumerState>,
}

impl ChannelConsumer {
    /// Subscribes immediately; messages published before `start` are kept
    /// up to the broker's buffer.
    pub fn new(
        broker: &ChannelBroker,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            state: Arc::new(ConsumerState {
                topic: topic.to_string(),
                handler,
                logger,
                receiver: Mutex::new(Some(broker.subscribe(topic))),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn topic(&self) -> &str {
        &self.state.topic
    }

    pub fn is_running(&self) -> bool {
        self.state
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }
}

async fn consume(
    mut receiver: broadcast::Receiver<Message>,
    state: Arc<ConsumerState>,
    cancel: Arc<Shutdown>,
) {
    loop {
        tokio::select! {
            _ = cancel.wait() => break,
            received = receiver.recv() => match received {
                Ok(message) => {
                    if let Err(e) = state.handler.handle(message).await {
                        state.logger.error(
                            "Failed to handle message",
                            e.as_ref(),
                            &[Field::new("topic", state.topic.as_str())],
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => state.logger.warn(
                    "Consumer lagged behind",
                    &[Field::new("topic", state.topic.as_str()), Field::new("skipped", skipped)],
                ),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

#[async_trait]
impl Consumer for ChannelConsumer {
    async fn start(&self) -> Result<(), BoxError> {
        let receiver = self
            .state
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| format!("consumer for {:?} already started", self.state.topic))?;

        self.state
            .logger
            .info("Starting consumer", &[Field::new("topic", self.state.topic.as_str())]);

        let cancel = Arc::new(Shutdown::new());
        let task = tokio::spawn(consume(receiver, self.state.clone(), cancel.clone()));
        *self.state.running.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Running { cancel, task });
        Ok(())
    }

    async fn stop(&self, deadline: Instant) -> Result<(), BoxError> {
        let running = self
            .state
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Running { cancel, mut task }) = running else {
            return Ok(());
        };

        self.state
            .logger
            .info("Stopping consumer", &[Field::new("topic", self.state.topic.as_str())]);
        cancel.trigger();
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                task.abort();
                Err(format!("consumer for {:?} did not stop before the deadline", self.state.topic).into())
            }
        }
    }
}
