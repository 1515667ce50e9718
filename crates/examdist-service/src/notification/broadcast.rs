//! In-process notifier with one broadcast channel per course owner.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use examdist_core::config::NotificationConfig;
use examdist_core::result::AppResult;
use examdist_core::types::id::UserId;

use super::AllocationNotifier;
use super::message::AllocatedMessage;

/// Fans allocation messages out to subscribers of the owning user.
///
/// Channels are created on first subscribe. Publishing to an owner with no
/// channel, or whose receivers are all gone, drops the message.
#[derive(Debug)]
pub struct BroadcastNotifier {
    channels: DashMap<UserId, broadcast::Sender<AllocatedMessage>>,
    buffer_size: usize,
}

impl BroadcastNotifier {
    /// Create a notifier whose channels buffer `buffer_size` messages.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: DashMap::new(),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Create a notifier from the `[notification]` section.
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.buffer_size)
    }

    /// Subscribe to the messages for one owner.
    pub fn subscribe(&self, owner: UserId) -> broadcast::Receiver<AllocatedMessage> {
        self.channels
            .entry(owner)
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe()
    }

    /// Number of live receivers for an owner.
    pub fn subscriber_count(&self, owner: UserId) -> usize {
        self.channels
            .get(&owner)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl AllocationNotifier for BroadcastNotifier {
    async fn documents_allocated(&self, owner: UserId, message: AllocatedMessage) -> AppResult<()> {
        let Some(tx) = self.channels.get(&owner) else {
            trace!(owner = %owner, "No subscribers for owner");
            return Ok(());
        };

        match tx.send(message) {
            Ok(receivers) => debug!(owner = %owner, receivers, "Allocation notification sent"),
            Err(_) => trace!(owner = %owner, "All subscribers for owner are gone"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examdist_core::types::id::ExamId;

    fn message(n: u32) -> AllocatedMessage {
        AllocatedMessage {
            course_name: "Databases".to_string(),
            exam_id: ExamId::new(),
            exam_name: "Midterm".to_string(),
            student_name: "Ada".to_string(),
            document_names: "q1-a.pdf, q2-c.pdf".to_string(),
            num_downloads: n,
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_owner_messages_only() {
        let notifier = BroadcastNotifier::new(8);
        let owner = UserId::new();
        let stranger = UserId::new();
        let mut rx = notifier.subscribe(owner);
        let mut other = notifier.subscribe(stranger);

        notifier.documents_allocated(owner, message(1)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().num_downloads, 1);
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscriber_is_ok() {
        let notifier = BroadcastNotifier::new(8);
        let owner = UserId::new();
        notifier.documents_allocated(owner, message(1)).await.unwrap();

        let rx = notifier.subscribe(owner);
        drop(rx);
        assert_eq!(notifier.subscriber_count(owner), 0);
        notifier.documents_allocated(owner, message(2)).await.unwrap();
    }
}
