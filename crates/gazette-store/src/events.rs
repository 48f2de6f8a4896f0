//! Change feed published after every committed mutation.
//!
//! Generalizes the real-time listeners of a managed document store: readers
//! subscribe to a broadcast channel instead of polling.  Publishing is
//! fire-and-forget; a send with no live subscribers is not an error.

use serde::Serialize;
use tokio::sync::broadcast;

use gazette_shared::{ChatId, NotificationKind, PostId, UserId};

/// Capacity of the broadcast channel.  Slow subscribers that fall further
/// behind than this see a `Lagged` error and skip ahead.
const FEED_CAPACITY: usize = 256;

/// A committed store mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    ProfileUpdated {
        uid: UserId,
    },
    /// A follow edge was created or removed between `follower` and `target`.
    FollowEdgeChanged {
        follower: UserId,
        target: UserId,
        following: bool,
    },
    /// A follow request was filed, cancelled, or resolved on `target`.
    FollowRequestChanged {
        requester: UserId,
        target: UserId,
        pending: bool,
    },
    /// An account-type change was fanned out to `posts_updated` posts.
    AccountTypeChanged {
        uid: UserId,
        posts_updated: usize,
    },
    PostCreated {
        id: PostId,
        author: UserId,
    },
    PostUpdated {
        id: PostId,
    },
    PostDeleted {
        id: PostId,
    },
    CommentAdded {
        post_id: PostId,
        author: UserId,
    },
    MessageSent {
        chat_id: ChatId,
        sender: UserId,
    },
    NotificationCreated {
        recipient: UserId,
        kind: NotificationKind,
    },
}

impl StoreEvent {
    /// Stable event name, used as the SSE event type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProfileUpdated { .. } => "profile_updated",
            Self::FollowEdgeChanged { .. } => "follow_edge_changed",
            Self::FollowRequestChanged { .. } => "follow_request_changed",
            Self::AccountTypeChanged { .. } => "account_type_changed",
            Self::PostCreated { .. } => "post_created",
            Self::PostUpdated { .. } => "post_updated",
            Self::PostDeleted { .. } => "post_deleted",
            Self::CommentAdded { .. } => "comment_added",
            Self::MessageSent { .. } => "message_sent",
            Self::NotificationCreated { .. } => "notification_created",
        }
    }
}

/// Broadcast handle owned by the [`Database`](crate::Database).
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<StoreEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Publish an event.  Must only be called after the mutation committed.
    pub fn publish(&self, event: StoreEvent) {
        tracing::trace!(event = event.name(), "publishing store event");
        // A send error just means nobody is listening right now.
        let _ = self.tx.send(event);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();

        let uid = UserId::new();
        feed.publish(StoreEvent::ProfileUpdated { uid });

        match rx.recv().await.unwrap() {
            StoreEvent::ProfileUpdated { uid: got } => assert_eq!(got, uid),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_ok() {
        let feed = ChangeFeed::new();
        feed.publish(StoreEvent::PostDeleted { id: PostId::new() });
    }
}
