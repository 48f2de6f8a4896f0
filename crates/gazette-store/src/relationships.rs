//! The follow-relationship manager.
//!
//! Owns the follower/following graph, the follow-request queue, and the
//! account-type fan-out.  Graph edges are stored redundantly on both user
//! rows (`following` on the source, `followers` on the target), so every
//! edge mutation touches two rows and runs inside a single transaction.
//!
//! Invariants maintained by every operation:
//! - edge symmetry: `B ∈ A.following ⟺ A ∈ B.followers`
//! - request/edge disjointness: a pending request and an established edge
//!   for the same pair never coexist
//! - no self-relationships
//!
//! All set mutations are union/remove, so retried or concurrently submitted
//! operations converge to the same final state.

use rusqlite::params;

use gazette_shared::{AccountType, FollowAction, NotificationKind, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::NewNotification;
use crate::notifications::insert_notification;
use crate::users::{fetch_user, load_user_set, store_user_set, SetField};
use crate::StoreEvent;

impl Database {
    /// Follow a user, or file a follow request if their account is private.
    ///
    /// Public target: creates both halves of the edge atomically.  Private
    /// target: adds `requester` to the target's request queue and notifies
    /// the target.  Repeating the call while the same state holds is a
    /// no-op.
    pub fn send_follow_request(&mut self, requester: &UserId, target: &UserId) -> Result<()> {
        if requester == target {
            return Err(StoreError::invalid("You cannot follow yourself"));
        }

        let mut events = Vec::new();

        let tx = self.conn_mut().transaction()?;
        {
            let requester_profile = fetch_user(&tx, requester)?;
            let target_profile = fetch_user(&tx, target)?;

            if target_profile.account_type == AccountType::Public {
                let mut following = load_user_set(&tx, requester, SetField::Following)?;
                let mut followers = load_user_set(&tx, target, SetField::Followers)?;

                let edge_added = following.insert(*target);
                followers.insert(*requester);
                store_user_set(&tx, requester, SetField::Following, &following)?;
                store_user_set(&tx, target, SetField::Followers, &followers)?;

                // A request filed while the target was still private must not
                // outlive the edge it asked for.
                let mut requests = load_user_set(&tx, target, SetField::FollowRequests)?;
                if requests.remove(requester) {
                    store_user_set(&tx, target, SetField::FollowRequests, &requests)?;
                    events.push(StoreEvent::FollowRequestChanged {
                        requester: *requester,
                        target: *target,
                        pending: false,
                    });
                }

                if edge_added {
                    events.push(StoreEvent::FollowEdgeChanged {
                        follower: *requester,
                        target: *target,
                        following: true,
                    });
                }
            } else {
                // Already an established edge: nothing to request.
                if target_profile.followers.contains(requester) {
                    tx.commit()?;
                    return Ok(());
                }

                let mut requests = load_user_set(&tx, target, SetField::FollowRequests)?;
                if requests.insert(*requester) {
                    store_user_set(&tx, target, SetField::FollowRequests, &requests)?;

                    let created = insert_notification(
                        &tx,
                        &NewNotification {
                            recipient_id: *target,
                            sender_id: *requester,
                            sender_name: requester_profile.display_name.clone(),
                            sender_photo_url: requester_profile.photo_url.clone(),
                            kind: NotificationKind::FollowRequest,
                            post_id: None,
                            post_title: None,
                            comment_text: None,
                        },
                    )?;

                    events.push(StoreEvent::FollowRequestChanged {
                        requester: *requester,
                        target: *target,
                        pending: true,
                    });
                    if let Some(n) = created {
                        events.push(StoreEvent::NotificationCreated {
                            recipient: n.recipient_id,
                            kind: n.kind,
                        });
                    }
                }
            }
        }
        tx.commit()?;

        for event in events {
            self.feed().publish(event);
        }
        Ok(())
    }

    /// Resolve a pending follow request.
    ///
    /// Always clears the request; on accept, additionally creates both
    /// halves of the edge.  All three field mutations commit together.
    /// Responding to a request that is no longer pending removes nothing
    /// and succeeds, so duplicate client submissions are harmless.
    pub fn respond_to_follow_request(
        &mut self,
        owner: &UserId,
        requester: &UserId,
        action: FollowAction,
    ) -> Result<()> {
        let mut events = Vec::new();

        let tx = self.conn_mut().transaction()?;
        {
            fetch_user(&tx, owner)?;
            fetch_user(&tx, requester)?;

            let mut requests = load_user_set(&tx, owner, SetField::FollowRequests)?;
            let was_pending = requests.remove(requester);
            if was_pending {
                store_user_set(&tx, owner, SetField::FollowRequests, &requests)?;
                events.push(StoreEvent::FollowRequestChanged {
                    requester: *requester,
                    target: *owner,
                    pending: false,
                });
            }

            if action == FollowAction::Accept && was_pending {
                let mut followers = load_user_set(&tx, owner, SetField::Followers)?;
                let mut following = load_user_set(&tx, requester, SetField::Following)?;
                followers.insert(*requester);
                following.insert(*owner);
                store_user_set(&tx, owner, SetField::Followers, &followers)?;
                store_user_set(&tx, requester, SetField::Following, &following)?;

                events.push(StoreEvent::FollowEdgeChanged {
                    follower: *requester,
                    target: *owner,
                    following: true,
                });
            }
        }
        tx.commit()?;

        for event in events {
            self.feed().publish(event);
        }
        Ok(())
    }

    /// Withdraw a pending follow request.  No edge is touched; cancelling a
    /// request that does not exist is a successful no-op.
    pub fn cancel_follow_request(&mut self, requester: &UserId, target: &UserId) -> Result<()> {
        let mut cancelled = false;

        let tx = self.conn_mut().transaction()?;
        {
            let mut requests = load_user_set(&tx, target, SetField::FollowRequests)?;
            if requests.remove(requester) {
                store_user_set(&tx, target, SetField::FollowRequests, &requests)?;
                cancelled = true;
            }
        }
        tx.commit()?;

        if cancelled {
            self.feed().publish(StoreEvent::FollowRequestChanged {
                requester: *requester,
                target: *target,
                pending: false,
            });
        }
        Ok(())
    }

    /// Remove both halves of a follow edge.  The request queue is unrelated
    /// state and is not touched.  Unfollowing a non-followed user is a
    /// successful no-op.
    pub fn unfollow(&mut self, follower: &UserId, target: &UserId) -> Result<()> {
        let mut removed = false;

        let tx = self.conn_mut().transaction()?;
        {
            let mut following = load_user_set(&tx, follower, SetField::Following)?;
            let mut followers = load_user_set(&tx, target, SetField::Followers)?;

            let had_following = following.remove(target);
            let had_follower = followers.remove(follower);
            if had_following || had_follower {
                store_user_set(&tx, follower, SetField::Following, &following)?;
                store_user_set(&tx, target, SetField::Followers, &followers)?;
                removed = true;
            }
        }
        tx.commit()?;

        if removed {
            self.feed().publish(StoreEvent::FollowEdgeChanged {
                follower: *follower,
                target: *target,
                following: false,
            });
        }
        Ok(())
    }

    /// Change a user's account type and fan the new value out to the
    /// denormalized `author_account_type` on every post they authored.
    ///
    /// The fan-out is a single statement, so each post is visited exactly
    /// once and no other author's posts are touched.  Returns the number of
    /// posts updated; a no-change call returns 0 without writing.
    pub fn update_account_type(&mut self, uid: &UserId, new_type: AccountType) -> Result<usize> {
        let current = fetch_user(self.conn(), uid)?;
        if current.account_type == new_type {
            return Ok(0);
        }

        let posts_updated;

        let tx = self.conn_mut().transaction()?;
        {
            tx.execute(
                "UPDATE users SET account_type = ?1 WHERE uid = ?2",
                params![new_type.as_str(), uid.to_string()],
            )?;
            posts_updated = tx.execute(
                "UPDATE posts SET author_account_type = ?1 WHERE author_id = ?2",
                params![new_type.as_str(), uid.to_string()],
            )?;
        }
        tx.commit()?;

        tracing::info!(
            uid = %uid,
            account_type = %new_type,
            posts_updated,
            "account type changed"
        );

        self.feed().publish(StoreEvent::ProfileUpdated { uid: *uid });
        self.feed().publish(StoreEvent::AccountTypeChanged {
            uid: *uid,
            posts_updated,
        });
        Ok(posts_updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazette_shared::{can_view, IdSet};

    use crate::models::UserProfile;
    use crate::testutil::{open_test_db, seed_user};

    /// Edge symmetry: `B ∈ A.following ⟺ A ∈ B.followers` for every pair.
    fn assert_symmetry(profiles: &[UserProfile]) {
        for a in profiles {
            for b in profiles {
                assert_eq!(
                    a.following.contains(&b.uid),
                    b.followers.contains(&a.uid),
                    "asymmetric edge between {} and {}",
                    a.uid,
                    b.uid
                );
            }
        }
    }

    /// Request/edge disjointness for every pair.
    fn assert_disjoint(profiles: &[UserProfile]) {
        for a in profiles {
            for b in profiles {
                assert!(
                    !(b.follow_requests.contains(&a.uid) && b.followers.contains(&a.uid)),
                    "{} both requested and follows {}",
                    a.uid,
                    b.uid
                );
            }
        }
    }

    fn reload(db: &Database, profiles: &[&UserProfile]) -> Vec<UserProfile> {
        profiles.iter().map(|p| db.get_user(&p.uid).unwrap()).collect()
    }

    #[test]
    fn follow_public_account_creates_both_edge_halves() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");

        db.send_follow_request(&a.uid, &b.uid).unwrap();

        let reloaded = reload(&db, &[&a, &b]);
        assert!(reloaded[0].following.contains(&b.uid));
        assert!(reloaded[1].followers.contains(&a.uid));
        assert!(reloaded[1].follow_requests.is_empty());
        assert_symmetry(&reloaded);
    }

    #[test]
    fn follow_private_account_files_request_only() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");
        db.update_account_type(&b.uid, AccountType::Private).unwrap();

        db.send_follow_request(&a.uid, &b.uid).unwrap();

        let reloaded = reload(&db, &[&a, &b]);
        assert!(reloaded[1].follow_requests.contains(&a.uid));
        assert!(reloaded[1].followers.is_empty());
        assert!(reloaded[0].following.is_empty());
        assert_disjoint(&reloaded);

        // The target was notified, attributed to the requester.
        let notifications = db.list_notifications(&b.uid).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::FollowRequest);
        assert_eq!(notifications[0].sender_id, a.uid);
    }

    #[test]
    fn repeated_request_is_idempotent_and_notifies_once() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");
        db.update_account_type(&b.uid, AccountType::Private).unwrap();

        db.send_follow_request(&a.uid, &b.uid).unwrap();
        db.send_follow_request(&a.uid, &b.uid).unwrap();

        let target = db.get_user(&b.uid).unwrap();
        assert_eq!(target.follow_requests.len(), 1);
        assert_eq!(db.list_notifications(&b.uid).unwrap().len(), 1);
    }

    #[test]
    fn accept_clears_request_and_creates_edge_atomically() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");
        db.update_account_type(&b.uid, AccountType::Private).unwrap();
        db.send_follow_request(&a.uid, &b.uid).unwrap();

        db.respond_to_follow_request(&b.uid, &a.uid, FollowAction::Accept)
            .unwrap();

        let reloaded = reload(&db, &[&a, &b]);
        assert!(reloaded[1].followers.contains(&a.uid));
        assert!(reloaded[0].following.contains(&b.uid));
        assert!(reloaded[1].follow_requests.is_empty());
        assert_symmetry(&reloaded);
        assert_disjoint(&reloaded);
    }

    #[test]
    fn decline_clears_request_without_edge() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");
        db.update_account_type(&b.uid, AccountType::Private).unwrap();
        db.send_follow_request(&a.uid, &b.uid).unwrap();

        db.respond_to_follow_request(&b.uid, &a.uid, FollowAction::Decline)
            .unwrap();

        let reloaded = reload(&db, &[&a, &b]);
        assert!(reloaded[1].follow_requests.is_empty());
        assert!(reloaded[1].followers.is_empty());
        assert!(reloaded[0].following.is_empty());
    }

    #[test]
    fn respond_to_absent_request_is_a_noop_success() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");

        // Never requested: accept must not conjure an edge.
        db.respond_to_follow_request(&b.uid, &a.uid, FollowAction::Accept)
            .unwrap();
        let reloaded = reload(&db, &[&a, &b]);
        assert!(reloaded[1].followers.is_empty());
        assert!(reloaded[0].following.is_empty());

        // Already resolved: a retried decline is equally harmless.
        db.respond_to_follow_request(&b.uid, &a.uid, FollowAction::Decline)
            .unwrap();
    }

    #[test]
    fn cancel_is_idempotent() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");
        db.update_account_type(&b.uid, AccountType::Private).unwrap();
        db.send_follow_request(&a.uid, &b.uid).unwrap();

        db.cancel_follow_request(&a.uid, &b.uid).unwrap();
        let after_first = db.get_user(&b.uid).unwrap();
        assert!(after_first.follow_requests.is_empty());

        db.cancel_follow_request(&a.uid, &b.uid).unwrap();
        assert_eq!(db.get_user(&b.uid).unwrap(), after_first);
    }

    #[test]
    fn unfollow_is_idempotent_and_leaves_requests_alone() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");
        db.send_follow_request(&a.uid, &b.uid).unwrap();

        db.unfollow(&a.uid, &b.uid).unwrap();
        let after_first = reload(&db, &[&a, &b]);
        assert!(after_first[0].following.is_empty());
        assert!(after_first[1].followers.is_empty());
        assert_symmetry(&after_first);

        // Second unfollow yields the same end state as the first.
        db.unfollow(&a.uid, &b.uid).unwrap();
        assert_eq!(reload(&db, &[&a, &b]), after_first);
    }

    #[test]
    fn self_follow_is_rejected() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");

        let err = db.send_follow_request(&a.uid, &a.uid).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation(_)));

        let reloaded = db.get_user(&a.uid).unwrap();
        assert!(!reloaded.followers.contains(&a.uid));
        assert!(!reloaded.following.contains(&a.uid));
        assert!(!reloaded.follow_requests.contains(&a.uid));
    }

    #[test]
    fn missing_profiles_are_not_found() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let ghost = UserId::new();

        assert!(matches!(
            db.send_follow_request(&a.uid, &ghost).unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            db.send_follow_request(&ghost, &a.uid).unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            db.unfollow(&a.uid, &ghost).unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[test]
    fn stale_request_is_cleared_when_target_went_public() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");

        db.update_account_type(&b.uid, AccountType::Private).unwrap();
        db.send_follow_request(&a.uid, &b.uid).unwrap();
        db.update_account_type(&b.uid, AccountType::Public).unwrap();

        // Following the now-public account both creates the edge and clears
        // the stale request, keeping request/edge disjointness.
        db.send_follow_request(&a.uid, &b.uid).unwrap();

        let reloaded = reload(&db, &[&a, &b]);
        assert!(reloaded[1].followers.contains(&a.uid));
        assert!(reloaded[1].follow_requests.is_empty());
        assert_disjoint(&reloaded);
    }

    #[test]
    fn request_while_already_following_is_a_noop() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");

        db.send_follow_request(&a.uid, &b.uid).unwrap();
        db.update_account_type(&b.uid, AccountType::Private).unwrap();

        // Existing followers retain access; a fresh request must not be filed.
        db.send_follow_request(&a.uid, &b.uid).unwrap();

        let target = db.get_user(&b.uid).unwrap();
        assert!(target.followers.contains(&a.uid));
        assert!(target.follow_requests.is_empty());
    }

    #[test]
    fn account_type_fan_out_touches_exactly_the_authors_posts() {
        let (mut db, _dir) = open_test_db();
        let x = seed_user(&db, "x@example.org");
        let y = seed_user(&db, "y@example.org");

        for i in 0..3 {
            db.create_post(&x.uid, &format!("x{i}"), "body", None).unwrap();
        }
        db.create_post(&y.uid, "y0", "body", None).unwrap();

        let updated = db.update_account_type(&x.uid, AccountType::Private).unwrap();
        assert_eq!(updated, 3);

        for post in db.list_posts().unwrap() {
            if post.author_id == x.uid {
                assert_eq!(post.author_account_type, AccountType::Private);
            } else {
                assert_eq!(post.author_account_type, AccountType::Public);
            }
        }

        // Same value again: nothing to do.
        assert_eq!(
            db.update_account_type(&x.uid, AccountType::Private).unwrap(),
            0
        );
    }

    #[test]
    fn visibility_follows_the_relationship_state() {
        let (mut db, _dir) = open_test_db();
        let author = seed_user(&db, "author@example.org");
        let viewer = seed_user(&db, "viewer@example.org");
        db.update_account_type(&author.uid, AccountType::Private).unwrap();

        let before = db.get_user(&viewer.uid).unwrap();
        assert!(!can_view(
            Some(&viewer.uid),
            AccountType::Private,
            &author.uid,
            &before.following,
        ));
        assert!(!can_view(None, AccountType::Private, &author.uid, &IdSet::new()));

        db.send_follow_request(&viewer.uid, &author.uid).unwrap();
        db.respond_to_follow_request(&author.uid, &viewer.uid, FollowAction::Accept)
            .unwrap();

        let after = db.get_user(&viewer.uid).unwrap();
        assert!(can_view(
            Some(&viewer.uid),
            AccountType::Private,
            &author.uid,
            &after.following,
        ));
        assert!(can_view(
            Some(&author.uid),
            AccountType::Private,
            &author.uid,
            &IdSet::new(),
        ));
    }
}
