//! State Notifier
//!
//! Publishes a [`RobotSnapshot`] after every change so that a view can render
//! it. Backed by a `tokio::sync::watch` channel: subscribers can await the next
//! change or just read the latest value, and publishing never blocks.

use tokio::sync::watch;

use crate::robot::RobotSnapshot;

/// Publisher side, owned by [`crate::grid::RobotGrid`]
#[derive(Debug)]
pub struct StateNotifier {
    tx: watch::Sender<RobotSnapshot>,
}

impl StateNotifier {
    /// Create a notifier holding `initial` as the current snapshot
    #[must_use]
    pub fn new(initial: RobotSnapshot) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new snapshot
    ///
    /// Always stores the value, even with no subscribers, so late subscribers
    /// and [`StateNotifier::latest`] see it.
    pub fn publish(&self, snapshot: RobotSnapshot) {
        self.tx.send_replace(snapshot);
    }

    /// Subscribe to future snapshots
    #[must_use]
    pub fn subscribe(&self) -> StateSubscriber {
        StateSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Most recently published snapshot
    #[must_use]
    pub fn latest(&self) -> RobotSnapshot {
        *self.tx.borrow()
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiver side handed to views
#[derive(Debug, Clone)]
pub struct StateSubscriber {
    rx: watch::Receiver<RobotSnapshot>,
}

impl StateSubscriber {
    /// Wait for the next published snapshot
    ///
    /// Returns `None` once the publisher has been dropped.
    pub async fn changed(&mut self) -> Option<RobotSnapshot> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Latest snapshot without waiting
    #[must_use]
    pub fn latest(&self) -> RobotSnapshot {
        *self.rx.borrow()
    }

    /// Wait until a published snapshot satisfies `predicate`, checking the current one first
    ///
    /// Returns `None` if the publisher is dropped first.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&RobotSnapshot) -> bool,
    ) -> Option<RobotSnapshot> {
        self.rx.wait_for(|snap| predicate(snap)).await.ok().map(|s| *s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::Heading;

    fn snap(x: u32, y: u32) -> RobotSnapshot {
        RobotSnapshot {
            x,
            y,
            heading: Heading::North,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let notifier = StateNotifier::new(snap(7, 7));
        assert_eq!(notifier.subscriber_count(), 0);
        notifier.publish(snap(1, 2));
        assert_eq!(notifier.latest(), snap(1, 2));
    }

    #[tokio::test]
    async fn test_subscriber_sees_updates() {
        let notifier = StateNotifier::new(snap(7, 7));
        let mut sub = notifier.subscribe();
        assert_eq!(sub.latest(), snap(7, 7));

        notifier.publish(snap(7, 6));
        assert_eq!(sub.changed().await, Some(snap(7, 6)));
    }

    #[tokio::test]
    async fn test_changed_ends_when_publisher_dropped() {
        let notifier = StateNotifier::new(snap(7, 7));
        let mut sub = notifier.subscribe();
        drop(notifier);
        assert_eq!(sub.changed().await, None);
    }

    #[tokio::test]
    async fn test_wait_for_predicate() {
        let notifier = StateNotifier::new(snap(7, 7));
        let mut sub = notifier.subscribe();

        let waiter = tokio::spawn(async move { sub.wait_for(|s| s.y == 4).await });
        for y in [6, 5, 4] {
            tokio::task::yield_now().await;
            notifier.publish(snap(7, y));
        }
        assert_eq!(waiter.await.unwrap(), Some(snap(7, 4)));
    }
}
