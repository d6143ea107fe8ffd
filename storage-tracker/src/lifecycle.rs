// SPDX-License-Identifier: GPL-3.0-only

use futures::stream::Stream;
use futures::task::{Context, Poll};
use storage_types::LifecycleEvent;
use tokio::sync::mpsc;

/// Lifecycle notifications for one subscriber.
///
/// Usable as a `Stream`; `try_next` polls without awaiting.
pub struct LifecycleEventStream {
    receiver: mpsc::UnboundedReceiver<LifecycleEvent>,
}

impl LifecycleEventStream {
    pub fn try_next(&mut self) -> Option<LifecycleEvent> {
        self.receiver.try_recv().ok()
    }

    /// Everything delivered so far.
    pub fn drain(&mut self) -> Vec<LifecycleEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl Stream for LifecycleEventStream {
    type Item = LifecycleEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Fan-out of lifecycle notifications to every live subscriber.
#[derive(Debug, Default)]
pub(crate) struct LifecycleFanout {
    senders: Vec<mpsc::UnboundedSender<LifecycleEvent>>,
}

impl LifecycleFanout {
    pub(crate) fn subscribe(&mut self) -> LifecycleEventStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders.push(sender);
        LifecycleEventStream { receiver }
    }

    /// Deliver to all subscribers, forgetting the ones that went away.
    pub(crate) fn emit(&mut self, event: LifecycleEvent) {
        self.senders.retain(|sender| sender.send(event.clone()).is_ok());
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use storage_types::{Volume, VolumeState};

    use super::*;

    fn usable() -> LifecycleEvent {
        LifecycleEvent::VolumeBecameUsable(Volume::new("V1", "abc", "D1", VolumeState::Mounted))
    }

    #[test]
    fn every_subscriber_receives_each_event() {
        let mut fanout = LifecycleFanout::default();
        let mut first = fanout.subscribe();
        let mut second = fanout.subscribe();

        fanout.emit(usable());

        assert_eq!(first.drain(), vec![usable()]);
        assert_eq!(second.drain(), vec![usable()]);
        assert_eq!(first.try_next(), None);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut fanout = LifecycleFanout::default();
        let kept = fanout.subscribe();
        drop(fanout.subscribe());

        fanout.emit(usable());

        assert_eq!(fanout.subscriber_count(), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn stream_yields_emitted_events() {
        let mut fanout = LifecycleFanout::default();
        let mut stream = fanout.subscribe();

        fanout.emit(usable());
        drop(fanout);

        assert_eq!(stream.next().await, Some(usable()));
        assert_eq!(stream.next().await, None);
    }
}
