use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// User identity = UUID v4, assigned at first sign-in and never changed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CommentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat identifier: the two member uids sorted and joined with `_`.
///
/// Deterministic regardless of which member opens the chat, so the same
/// pair of users always lands in the same conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn for_members(a: &UserId, b: &UserId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{lo}_{hi}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account privacy flag.
///
/// Legacy rows may lack the value entirely; [`AccountType::from_db`] is the
/// single place where a missing or unrecognized value becomes `Public`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Public,
    Private,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    /// Decode a stored value, defaulting to `Public` when absent or unknown.
    pub fn from_db(value: Option<&str>) -> Self {
        match value {
            Some("private") => Self::Private,
            _ => Self::Public,
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decision on a pending follow request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FollowAction {
    Accept,
    Decline,
}

/// Notification category, matching the structured event payloads consumed by
/// the notification list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    FollowRequest,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::FollowRequest => "follow_request",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "like" => Some(Self::Like),
            "comment" => Some(Self::Comment),
            "follow_request" => Some(Self::FollowRequest),
            _ => None,
        }
    }
}

/// An order-irrelevant set of user ids with set-union / set-remove update
/// semantics.
///
/// Every relationship field (`followers`, `following`, `follow_requests`)
/// and every reaction field (`likes`, `dislikes`) is an `IdSet`.  Both
/// mutations are idempotent and commutative, so two concurrent writers
/// applying union/remove for the same pair converge to the same final state
/// regardless of interleaving.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct IdSet(BTreeSet<UserId>);

impl IdSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Set-union with a single id.  Returns `true` if the id was newly added.
    pub fn insert(&mut self, id: UserId) -> bool {
        self.0.insert(id)
    }

    /// Set-remove of a single id.  Returns `true` if the id was present.
    pub fn remove(&mut self, id: &UserId) -> bool {
        self.0.remove(id)
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }
}

impl FromIterator<UserId> for IdSet {
    fn from_iter<T: IntoIterator<Item = UserId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for IdSet {
    type Item = UserId;
    type IntoIter = std::collections::btree_set::IntoIter<UserId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a IdSet {
    type Item = &'a UserId;
    type IntoIter = std::collections::btree_set::Iter<'a, UserId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_set_union_is_idempotent() {
        let a = UserId::new();
        let mut set = IdSet::new();

        assert!(set.insert(a));
        assert!(!set.insert(a));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn id_set_remove_is_idempotent() {
        let a = UserId::new();
        let mut set = IdSet::from_iter([a]);

        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert!(set.is_empty());
    }

    #[test]
    fn id_set_union_commutes() {
        let (a, b) = (UserId::new(), UserId::new());

        let mut first = IdSet::new();
        first.insert(a);
        first.insert(b);

        let mut second = IdSet::new();
        second.insert(b);
        second.insert(a);

        assert_eq!(first, second);
    }

    #[test]
    fn id_set_serializes_as_array() {
        let a = UserId::new();
        let set = IdSet::from_iter([a]);

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, format!("[\"{a}\"]"));

        let back: IdSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn chat_id_is_order_independent() {
        let (a, b) = (UserId::new(), UserId::new());
        assert_eq!(ChatId::for_members(&a, &b), ChatId::for_members(&b, &a));
    }

    #[test]
    fn account_type_defaults_to_public() {
        assert_eq!(AccountType::from_db(None), AccountType::Public);
        assert_eq!(AccountType::from_db(Some("garbage")), AccountType::Public);
        assert_eq!(AccountType::from_db(Some("private")), AccountType::Private);
    }

    #[test]
    fn notification_kind_round_trips() {
        for kind in [
            NotificationKind::Like,
            NotificationKind::Comment,
            NotificationKind::FollowRequest,
        ] {
            assert_eq!(NotificationKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::from_str("poke"), None);
    }
}
