// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory publish/subscribe broker backing resumable streams.
//!
//! Each in-flight generation turn owns a topic keyed by stream id. The
//! orchestrator publishes every frame it produces; a subscriber first
//! replays the topic's buffer from the beginning, then follows the live
//! tail until the publisher closes the topic. This replay-then-tail shape
//! is what lets a reconnecting client catch up without gaps no matter how
//! late it attaches.
//!
//! The broker holds topics only for the lifetime of a turn. `close`
//! removes the topic outright, so a later subscribe observes `None` and
//! the caller falls back to reading the persisted message from storage.

use async_trait::async_trait;
use dashmap::DashMap;
use strand_core::traits::{FrameStream, StreamBroker};
use strand_core::{Frame, StrandError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One in-flight stream: everything published so far plus live listeners.
struct Topic {
    buffer: Vec<Frame>,
    subscribers: Vec<mpsc::UnboundedSender<Frame>>,
}

/// In-process broker keyed by stream id.
///
/// Cheap to clone via `Arc` at the call sites; the map itself is sharded
/// so publishers and subscribers on different topics never contend.
#[derive(Default)]
pub struct MemoryBroker {
    topics: DashMap<String, Topic>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live topics. Exposed for shutdown logging.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

#[async_trait]
impl StreamBroker for MemoryBroker {
    fn is_available(&self) -> bool {
        true
    }

    async fn open(&self, stream_id: &str) -> Result<(), StrandError> {
        debug!(stream_id, "opening stream topic");
        self.topics.insert(
            stream_id.to_string(),
            Topic {
                buffer: Vec::new(),
                subscribers: Vec::new(),
            },
        );
        Ok(())
    }

    async fn publish(&self, stream_id: &str, frame: Frame) -> Result<(), StrandError> {
        let Some(mut topic) = self.topics.get_mut(stream_id) else {
            // Publishing to a topic that was never opened (or already
            // closed) is a programming error upstream, but must not kill
            // the turn that hit it.
            warn!(stream_id, "publish to unknown topic dropped");
            return Ok(());
        };

        topic.buffer.push(frame.clone());
        // A failed send means that subscriber's receiver is gone.
        topic.subscribers.retain(|tx| tx.send(frame.clone()).is_ok());
        Ok(())
    }

    async fn close(&self, stream_id: &str) -> Result<(), StrandError> {
        debug!(stream_id, "closing stream topic");
        // Dropping the topic drops every subscriber's sender, which ends
        // their tails.
        self.topics.remove(stream_id);
        Ok(())
    }

    async fn subscribe(&self, stream_id: &str) -> Result<Option<FrameStream>, StrandError> {
        let Some(mut topic) = self.topics.get_mut(stream_id) else {
            return Ok(None);
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // Replay the buffer through the same channel the tail uses, so the
        // subscriber sees one ordered sequence with no seam.
        for frame in &topic.buffer {
            // Receiver is alive; an unbounded send only fails when it is
            // dropped, which cannot happen before we return the stream.
            let _ = tx.send(frame.clone());
        }
        topic.subscribers.push(tx);
        drop(topic);

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });
        Ok(Some(Box::pin(stream)))
    }

    async fn teardown(&self) -> Result<(), StrandError> {
        let count = self.topics.len();
        if count > 0 {
            debug!(topics = count, "dropping live stream topics on teardown");
        }
        self.topics.clear();
        Ok(())
    }
}

/// The "no resumable transport configured" state, as a first-class broker.
///
/// Every operation is a no-op; `subscribe` always reports a concluded
/// stream. Handlers branch on `is_available` and fall back to plain
/// one-shot delivery.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBroker;

#[async_trait]
impl StreamBroker for DisabledBroker {
    fn is_available(&self) -> bool {
        false
    }

    async fn open(&self, _stream_id: &str) -> Result<(), StrandError> {
        Ok(())
    }

    async fn publish(&self, _stream_id: &str, _frame: Frame) -> Result<(), StrandError> {
        Ok(())
    }

    async fn close(&self, _stream_id: &str) -> Result<(), StrandError> {
        Ok(())
    }

    async fn subscribe(&self, _stream_id: &str) -> Result<Option<FrameStream>, StrandError> {
        Ok(None)
    }

    async fn teardown(&self) -> Result<(), StrandError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use strand_core::TokenUsage;

    fn delta(text: &str) -> Frame {
        Frame::TextDelta {
            delta: text.to_string(),
        }
    }

    #[tokio::test]
    async fn subscribe_replays_buffer_then_tails() {
        let broker = MemoryBroker::new();
        broker.open("s1").await.unwrap();
        broker.publish("s1", delta("a")).await.unwrap();
        broker.publish("s1", delta("b")).await.unwrap();

        let stream = broker.subscribe("s1").await.unwrap().unwrap();

        // Publish more after subscribing, then close.
        broker.publish("s1", delta("c")).await.unwrap();
        broker
            .publish(
                "s1",
                Frame::Finish {
                    usage: TokenUsage::default(),
                },
            )
            .await
            .unwrap();
        broker.close("s1").await.unwrap();

        let frames: Vec<Frame> = stream.collect().await;
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], delta("a"));
        assert_eq!(frames[1], delta("b"));
        assert_eq!(frames[2], delta("c"));
        assert!(matches!(frames[3], Frame::Finish { .. }));
    }

    #[tokio::test]
    async fn late_subscriber_sees_full_replay() {
        let broker = MemoryBroker::new();
        broker.open("s1").await.unwrap();
        for text in ["x", "y", "z"] {
            broker.publish("s1", delta(text)).await.unwrap();
        }

        let stream = broker.subscribe("s1").await.unwrap().unwrap();
        broker.close("s1").await.unwrap();

        let frames: Vec<Frame> = stream.collect().await;
        assert_eq!(frames, vec![delta("x"), delta("y"), delta("z")]);
    }

    #[tokio::test]
    async fn subscribe_after_close_returns_none() {
        let broker = MemoryBroker::new();
        broker.open("s1").await.unwrap();
        broker.publish("s1", delta("a")).await.unwrap();
        broker.close("s1").await.unwrap();

        assert!(broker.subscribe("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn subscribe_to_unknown_stream_returns_none() {
        let broker = MemoryBroker::new();
        assert!(broker.subscribe("never-opened").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn publish_to_unknown_topic_is_dropped_without_error() {
        let broker = MemoryBroker::new();
        broker.publish("ghost", delta("a")).await.unwrap();
        assert_eq!(broker.topic_count(), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_all_frames() {
        let broker = MemoryBroker::new();
        broker.open("s1").await.unwrap();
        broker.publish("s1", delta("a")).await.unwrap();

        let first = broker.subscribe("s1").await.unwrap().unwrap();
        let second = broker.subscribe("s1").await.unwrap().unwrap();

        broker.publish("s1", delta("b")).await.unwrap();
        broker.close("s1").await.unwrap();

        let got_first: Vec<Frame> = first.collect().await;
        let got_second: Vec<Frame> = second.collect().await;
        assert_eq!(got_first, vec![delta("a"), delta("b")]);
        assert_eq!(got_second, got_first);
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_block_publishing() {
        let broker = MemoryBroker::new();
        broker.open("s1").await.unwrap();

        let stream = broker.subscribe("s1").await.unwrap().unwrap();
        drop(stream);

        // Publishing keeps working and prunes the dead subscriber.
        broker.publish("s1", delta("a")).await.unwrap();
        broker.publish("s1", delta("b")).await.unwrap();

        let survivor = broker.subscribe("s1").await.unwrap().unwrap();
        broker.close("s1").await.unwrap();
        let frames: Vec<Frame> = survivor.collect().await;
        assert_eq!(frames, vec![delta("a"), delta("b")]);
    }

    #[tokio::test]
    async fn reopening_a_stream_resets_its_buffer() {
        let broker = MemoryBroker::new();
        broker.open("s1").await.unwrap();
        broker.publish("s1", delta("old")).await.unwrap();
        broker.open("s1").await.unwrap();
        broker.publish("s1", delta("new")).await.unwrap();

        let stream = broker.subscribe("s1").await.unwrap().unwrap();
        broker.close("s1").await.unwrap();
        let frames: Vec<Frame> = stream.collect().await;
        assert_eq!(frames, vec![delta("new")]);
    }

    #[tokio::test]
    async fn teardown_ends_all_tails() {
        let broker = MemoryBroker::new();
        broker.open("s1").await.unwrap();
        broker.open("s2").await.unwrap();
        let s1 = broker.subscribe("s1").await.unwrap().unwrap();
        let s2 = broker.subscribe("s2").await.unwrap().unwrap();

        broker.teardown().await.unwrap();
        assert_eq!(broker.topic_count(), 0);
        assert!(s1.collect::<Vec<Frame>>().await.is_empty());
        assert!(s2.collect::<Vec<Frame>>().await.is_empty());
    }

    #[tokio::test]
    async fn disabled_broker_reports_unavailable() {
        let broker = DisabledBroker;
        assert!(!broker.is_available());
        broker.open("s1").await.unwrap();
        broker.publish("s1", delta("a")).await.unwrap();
        assert!(broker.subscribe("s1").await.unwrap().is_none());
        broker.close("s1").await.unwrap();
        broker.teardown().await.unwrap();
    }
}
