//! The account-visibility predicate.
//!
//! Every content-read path (feed list, post detail, profile posts) must call
//! [`can_view`] rather than re-deriving the rule inline; divergent copies of
//! this check are a known bug class.

use crate::types::{AccountType, IdSet, UserId};

/// Whether `viewer` may see content authored by `author`.
///
/// - Public authors are visible to everyone, signed in or not.
/// - Authors always see their own content.
/// - Private authors are visible only to viewers whose `following` set
///   contains the author.
pub fn can_view(
    viewer: Option<&UserId>,
    author_account_type: AccountType,
    author: &UserId,
    viewer_following: &IdSet,
) -> bool {
    if author_account_type == AccountType::Public {
        return true;
    }

    match viewer {
        None => false,
        Some(v) if v == author => true,
        Some(_) => viewer_following.contains(author),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_author_visible_to_anonymous() {
        let author = UserId::new();
        assert!(can_view(None, AccountType::Public, &author, &IdSet::new()));
    }

    #[test]
    fn private_author_hidden_from_anonymous() {
        let author = UserId::new();
        assert!(!can_view(None, AccountType::Private, &author, &IdSet::new()));
    }

    #[test]
    fn private_author_hidden_from_non_follower() {
        let author = UserId::new();
        let viewer = UserId::new();
        assert!(!can_view(
            Some(&viewer),
            AccountType::Private,
            &author,
            &IdSet::new(),
        ));
    }

    #[test]
    fn private_author_visible_to_follower() {
        let author = UserId::new();
        let viewer = UserId::new();
        let following = IdSet::from_iter([author, UserId::new()]);
        assert!(can_view(
            Some(&viewer),
            AccountType::Private,
            &author,
            &following,
        ));
    }

    #[test]
    fn author_always_sees_own_content() {
        let author = UserId::new();
        assert!(can_view(
            Some(&author),
            AccountType::Private,
            &author,
            &IdSet::new(),
        ));
    }
}
