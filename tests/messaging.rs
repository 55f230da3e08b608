//! Messaging module: consumer loop bound to the application lifecycle.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use service_kernel::messaging::{self, Consumer, Message, MessageHandler, Producer};
use service_kernel::testing::TestApp;
use service_kernel::BoxError;

mod common;

#[derive(Default)]
struct Collect {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl MessageHandler for Collect {
    async fn handle(&self, message: Message) -> Result<(), BoxError> {
        let value = String::from_utf8(message.value)?;
        self.seen.lock().unwrap().push(value);
        Ok(())
    }
}

fn app() -> TestApp {
    TestApp::new(|app| {
        app.supply(Collect::default())?;
        app.bind::<dyn MessageHandler, Collect>()?;
        app.module("messaging", messaging::module)
    })
}

#[tokio::test]
async fn published_messages_reach_the_handler_while_running() {
    let mut app = app();
    app.require_start().await;

    let producer = app.get::<dyn Producer>();
    producer.publish("events", b"k".to_vec(), b"one".to_vec()).await.unwrap();
    producer
        .publish_batch("events", vec![Message::new("", "k", "two")])
        .await
        .unwrap();
    producer.publish("other", b"k".to_vec(), b"ignored".to_vec()).await.unwrap();

    let collect = app.get::<Collect>();
    let delivered = common::wait_until(Duration::from_secs(2), || {
        collect.seen.lock().unwrap().len() == 2
    })
    .await;
    assert!(delivered, "messages not delivered");
    assert_eq!(*collect.seen.lock().unwrap(), vec!["one", "two"]);

    app.require_stop().await;
    assert!(producer.publish("events", vec![], vec![]).await.is_err());
}

#[tokio::test]
async fn consumer_starts_after_broker_and_stops_before_it() {
    let app = app();
    let graph = app.app().graph();
    assert!(
        graph.position_of::<messaging::ChannelBroker>()
            < graph.position_of::<messaging::ChannelConsumer>()
    );
    assert!(graph.position_of::<dyn Consumer>().is_some());
}
