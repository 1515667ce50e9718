//! Course-owner notifications about handed-out documents.

pub mod broadcast;
pub mod message;

pub use broadcast::BroadcastNotifier;
pub use message::AllocatedMessage;

use async_trait::async_trait;

use examdist_core::result::AppResult;
use examdist_core::types::id::UserId;

/// Sink for "documents were allocated" notifications.
#[async_trait]
pub trait AllocationNotifier: Send + Sync + std::fmt::Debug + 'static {
    /// Tell the course owner that a student received documents.
    async fn documents_allocated(&self, owner: UserId, message: AllocatedMessage) -> AppResult<()>;
}
