//! # gazette-shared
//!
//! Types shared between the Gazette store and server crates: identifier
//! newtypes, the commutative [`IdSet`] relationship-set type, the
//! [`AccountType`] privacy flag, and the [`can_view`] visibility predicate.
//!
//! The visibility predicate lives here so that every content-read path
//! (feed, post detail, profile posts) consults the exact same function.

pub mod constants;
pub mod types;
pub mod visibility;

pub use types::{
    AccountType, ChatId, CommentId, FollowAction, IdSet, MessageId, NotificationId,
    NotificationKind, PostId, UserId,
};
pub use visibility::can_view;
