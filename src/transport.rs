//! Inbound message transport.
//!
//! The ingestion loop only needs "give me the next payload". The shipped
//! implementation is a bounded in-process channel; its publishing half is
//! exposed over HTTP (`POST /ingest`) and can be fed by any bridge from the
//! real pub/sub broker.

use tokio::sync::mpsc;

use crate::pipeline::types::RawMessage;

#[async_trait::async_trait]
pub trait MessageSource: Send {
    /// Next message, or `None` once the subscription is gone.
    async fn next_message(&mut self) -> Option<RawMessage>;
    fn topic(&self) -> &str;
}

/// Subscriber half of a [`channel`].
pub struct ChannelSource {
    topic: String,
    rx: mpsc::Receiver<RawMessage>,
}

/// Publisher half of a [`channel`]. Cheap to clone.
#[derive(Clone)]
pub struct ChannelPublisher {
    topic: String,
    tx: mpsc::Sender<RawMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// The subscriber side has been dropped.
    #[error("ingestion channel closed")]
    Closed,
}

pub fn channel(topic: impl Into<String>, capacity: usize) -> (ChannelPublisher, ChannelSource) {
    let topic = topic.into();
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChannelPublisher {
            topic: topic.clone(),
            tx,
        },
        ChannelSource { topic, rx },
    )
}

impl ChannelPublisher {
    /// Queue a payload; waits while the channel is full.
    pub async fn publish(&self, payload: impl Into<String>) -> Result<(), PublishError> {
        let msg = RawMessage::new(self.topic.clone(), payload);
        self.tx.send(msg).await.map_err(|_| PublishError::Closed)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait::async_trait]
impl MessageSource for ChannelSource {
    async fn next_message(&mut self) -> Option<RawMessage> {
        self.rx.recv().await
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_publish_order_then_closes() {
        let (publisher, mut source) = channel("t/features", 4);
        publisher.publish("1,2").await.unwrap();
        publisher.publish("3,4").await.unwrap();
        drop(publisher);

        let a = source.next_message().await.unwrap();
        let b = source.next_message().await.unwrap();
        assert_eq!(a, RawMessage::new("t/features", "1,2"));
        assert_eq!(b.payload, "3,4");
        assert!(source.next_message().await.is_none());
    }

    #[tokio::test]
    async fn publish_fails_once_source_is_gone() {
        let (publisher, source) = channel("t", 1);
        drop(source);
        assert_eq!(publisher.publish("1,2").await, Err(PublishError::Closed));
    }
}
