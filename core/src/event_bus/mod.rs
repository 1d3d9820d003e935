//! C1 Event Bus: in-process pub/sub built on `tokio::sync::broadcast` (§4.1).
//! Publish is non-blocking; slow subscribers lose oldest events rather than
//! blocking the publisher or each other.

mod coalesced;

pub use coalesced::CoalescedSnapshot;

use coalesced::Coalesced;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use vla_stream_event::Event;

/// Default per-subscriber ring buffer capacity (§4.1).
pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// Clone-able handle shared by the orchestrator (publisher) and every HTTP/
/// websocket task (subscriber).
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    tx: broadcast::Sender<Event>,
    coalesced: Coalesced,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                tx,
                coalesced: Coalesced::new(),
            }),
        }
    }

    /// Publishes one event to every current subscriber in publication order.
    /// Coalesced kinds (`status`, `voice_state`, `voice_level`, `frame`) also
    /// update the current-value cell new subscribers read on attach.
    pub fn publish(&self, event: Event) {
        if event.is_coalesced() {
            self.inner.coalesced.set(event.clone());
        } else {
            self.inner.coalesced.push_history(event.clone());
        }

        // No receivers is not an error: it just means nobody is subscribed yet.
        let _ = self.inner.tx.send(event);
    }

    /// Registers a new subscriber. It does not see events published before
    /// this call; callers that need current state should also read
    /// `snapshot()`.
    pub fn subscribe(&self) -> Subscriber {
        Subscriber {
            rx: self.inner.tx.subscribe(),
            lost: AtomicU64::new(0),
        }
    }

    /// The coalesced current values plus bounded thought/action/chat history,
    /// as read by a REST latest-snapshot endpoint.
    pub fn snapshot(&self) -> coalesced::CoalescedSnapshot {
        self.inner.coalesced.snapshot()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber's view of the bus: a `Stream<Item = Event>` plus its own
/// lost-event counter (§4.1). Lagging past the ring buffer is surfaced by
/// `broadcast` as `RecvError::Lagged(n)`; the stream swallows it and folds
/// `n` into `lost` rather than ending the stream.
pub struct Subscriber {
    rx: broadcast::Receiver<Event>,
    lost: AtomicU64,
}

impl Subscriber {
    pub fn lost_events(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }
}

impl tokio_stream::Stream for Subscriber {
    type Item = Event;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let fut = this.rx.recv();
            tokio::pin!(fut);
            return match fut.poll(cx) {
                std::task::Poll::Ready(Ok(event)) => std::task::Poll::Ready(Some(event)),
                std::task::Poll::Ready(Err(broadcast::error::RecvError::Lagged(n))) => {
                    this.lost.fetch_add(n, Ordering::Relaxed);
                    continue;
                }
                std::task::Poll::Ready(Err(broadcast::error::RecvError::Closed)) => {
                    std::task::Poll::Ready(None)
                }
                std::task::Poll::Pending => std::task::Poll::Pending,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;
    use vla_stream_event::{EventPayload, ThoughtPayload};

    fn thought(text: &str) -> Event {
        Event::new(EventPayload::Thought(ThoughtPayload {
            text: text.to_string(),
        }))
    }

    #[tokio::test]
    async fn subscriber_sees_events_in_publication_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(thought("one"));
        bus.publish(thought("two"));

        let first = sub.next().await.unwrap();
        let second = sub.next().await.unwrap();
        match (first.payload, second.payload) {
            (EventPayload::Thought(a), EventPayload::Thought(b)) => {
                assert_eq!(a.text, "one");
                assert_eq!(b.text, "two");
            }
            _ => panic!("expected thought events"),
        }
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_increments_lost_counter() {
        let bus = EventBus::with_capacity(2);
        let mut sub = bus.subscribe();
        bus.publish(thought("a"));
        bus.publish(thought("b"));
        bus.publish(thought("c"));

        let first = sub.next().await.unwrap();
        assert!(sub.lost_events() >= 1);
        if let EventPayload::Thought(p) = first.payload {
            assert_eq!(p.text, "b");
        } else {
            panic!("expected thought");
        }
    }

    #[tokio::test]
    async fn dropping_subscriber_lowers_the_count() {
        let bus = EventBus::new();
        {
            let _sub = bus.subscribe();
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }
}
