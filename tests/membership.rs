//! Membership, invitations and access checks against a real database.
//!
//! Requires `TEST_DATABASE_URL`; every test is skipped without it.

mod common;

use pantry::models::{inventory, Role};
use pantry::pool::config::{MembershipConfig, PantryConfig};
use pantry::pool::worker::spawn_request;
use pantry::services::InviteInput;
use pantry::ErrorKind;
use uuid::Uuid;

use common::{audit_count, count, fixture, fixture_with, unique_email};

#[test]
fn test_invite_accept_list_remove_scenario() {
    let Some(fx) = fixture() else { return };
    let a = fx.user();
    let b = fx.user();
    let inv = fx.inventory(&a);

    let invitation = fx
        .pantry
        .membership
        .invite_user(&fx.conn, a.id, inv.id, &InviteInput::new(b.email.clone()))
        .expect("invite");
    assert_eq!(invitation.role, Role::Viewer);
    assert_eq!(audit_count(&fx.conn, "invitation.created", invitation.id), 1);

    let membership = fx
        .pantry
        .membership
        .accept_invitation(&fx.conn, b.id, invitation.id)
        .expect("accept");
    assert_eq!(membership.user_id, b.id);
    assert_eq!(membership.role, Role::Viewer);
    assert!(membership.is_active());
    assert_eq!(audit_count(&fx.conn, "invitation.accepted", invitation.id), 1);

    let members = fx.pantry.membership.list_members(&fx.conn, a.id, inv.id).expect("list");
    let ids: Vec<Uuid> = members.iter().map(|m| m.user_id).collect();
    assert_eq!(ids, vec![a.id, b.id]);

    let removed = fx
        .pantry
        .membership
        .remove_member(&fx.conn, a.id, inv.id, b.id)
        .expect("remove");
    assert!(!removed.is_active());
    assert_eq!(audit_count(&fx.conn, "member.removed", removed.id), 1);

    let members = fx.pantry.membership.list_members(&fx.conn, a.id, inv.id).expect("list");
    assert_eq!(members.iter().map(|m| m.user_id).collect::<Vec<_>>(), vec![a.id]);

    let err = fx.pantry.membership.list_members(&fx.conn, b.id, inv.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[test]
fn test_owner_is_member_without_membership_rows() {
    let Some(fx) = fixture() else { return };
    let owner = fx.user();
    // Bypass the service so no admin membership row is written.
    let bare = inventory::insert(&fx.conn, "Cellar", owner.id).expect("insert inventory");
    assert_eq!(
        count(
            &fx.conn,
            "SELECT COUNT(*) FROM inventory_memberships WHERE inventory_id = $1",
            bare.id
        ),
        0
    );

    let authz = fx.pantry.membership.authorizer();
    assert!(authz.is_member_or_owner(&fx.conn, owner.id, bare.id).unwrap());
    assert!(!authz.is_member_or_owner(&fx.conn, fx.user().id, bare.id).unwrap());
    assert!(!authz.is_member_or_owner(&fx.conn, owner.id, Uuid::new_v4()).unwrap());
}

#[test]
fn test_invitation_is_single_use() {
    let Some(fx) = fixture() else { return };
    let a = fx.user();
    let b = fx.user();
    let c = fx.user();
    let inv = fx.inventory(&a);

    let invitation = fx
        .pantry
        .membership
        .invite_user(&fx.conn, a.id, inv.id, &InviteInput::new(b.email.clone()))
        .unwrap();
    fx.pantry.membership.accept_invitation(&fx.conn, b.id, invitation.id).unwrap();

    let again = fx.pantry.membership.accept_invitation(&fx.conn, b.id, invitation.id);
    assert_eq!(again.unwrap_err().kind(), ErrorKind::Conflict);
    let other = fx.pantry.membership.accept_invitation(&fx.conn, c.id, invitation.id);
    assert_eq!(other.unwrap_err().kind(), ErrorKind::Conflict);

    assert_eq!(
        count(
            &fx.conn,
            "SELECT COUNT(*) FROM inventory_memberships WHERE inventory_id = $1",
            inv.id
        ),
        2
    );
    assert_eq!(audit_count(&fx.conn, "invitation.accepted", invitation.id), 1);
}

#[test]
fn test_concurrent_accepts_admit_one_member() {
    let Some(fx) = fixture() else { return };
    let pool = fx.db.pool(2, 10).expect("pool");
    let a = fx.user();
    let b = fx.user();
    let c = fx.user();
    let inv = fx.inventory(&a);
    let invitation = fx
        .pantry
        .membership
        .invite_user(&fx.conn, a.id, inv.id, &InviteInput::new(b.email.clone()))
        .unwrap();

    let handles: Vec<_> = [b.id, c.id]
        .into_iter()
        .map(|user_id| {
            let pantry = fx.pantry.clone();
            let invitation_id = invitation.id;
            spawn_request(&pool, move |conn| {
                pantry.membership.accept_invitation(conn, user_id, invitation_id)
            })
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("coroutine panicked"))
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let failure = results.into_iter().find_map(Result::err).expect("one accept fails");
    assert_eq!(failure.kind(), ErrorKind::Conflict);
    let joined = fx.pantry.membership.list_members(&fx.conn, a.id, inv.id).unwrap();
    assert_eq!(joined.len(), 2);
}

#[test]
fn test_only_owner_or_admin_may_invite() {
    let Some(fx) = fixture() else { return };
    let owner = fx.user();
    let viewer = fx.user();
    let admin = fx.user();
    let outsider = fx.user();
    let inv = fx.inventory(&owner);
    fx.join(&owner, &inv, &viewer);

    let promote = fx
        .pantry
        .membership
        .invite_user(
            &fx.conn,
            owner.id,
            inv.id,
            &InviteInput::new(admin.email.clone()).with_role(Role::Admin),
        )
        .unwrap();
    fx.pantry.membership.accept_invitation(&fx.conn, admin.id, promote.id).unwrap();

    let by_viewer = fx
        .pantry
        .membership
        .invite_user(&fx.conn, viewer.id, inv.id, &InviteInput::new(unique_email()));
    assert_eq!(by_viewer.unwrap_err().kind(), ErrorKind::Unauthorized);

    let by_outsider = fx
        .pantry
        .membership
        .invite_user(&fx.conn, outsider.id, inv.id, &InviteInput::new(unique_email()));
    assert_eq!(by_outsider.unwrap_err().kind(), ErrorKind::Unauthorized);

    let by_admin = fx
        .pantry
        .membership
        .invite_user(&fx.conn, admin.id, inv.id, &InviteInput::new(unique_email()).with_role(Role::Editor))
        .unwrap();
    assert_eq!(by_admin.role, Role::Editor);
}

#[test]
fn test_invite_rejects_malformed_email() {
    let Some(fx) = fixture() else { return };
    let a = fx.user();
    let inv = fx.inventory(&a);
    let err = fx
        .pantry
        .membership
        .invite_user(&fx.conn, a.id, inv.id, &InviteInput::new("not-an-email"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_accept_unknown_invitation_is_not_found() {
    let Some(fx) = fixture() else { return };
    let b = fx.user();
    let err = fx
        .pantry
        .membership
        .accept_invitation(&fx.conn, b.id, Uuid::new_v4())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_existing_member_cannot_accept_again() {
    let Some(fx) = fixture() else { return };
    let a = fx.user();
    let b = fx.user();
    let inv = fx.inventory(&a);
    fx.join(&a, &inv, &b);

    let second = fx
        .pantry
        .membership
        .invite_user(&fx.conn, a.id, inv.id, &InviteInput::new(b.email.clone()))
        .unwrap();
    let err = fx
        .pantry
        .membership
        .accept_invitation(&fx.conn, b.id, second.id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let still_pending = fx.pantry.membership.get_invitation(&fx.conn, a.id, second.id).unwrap();
    assert_eq!(still_pending.status, pantry::models::InvitationStatus::Pending);
}

#[test]
fn test_email_match_enforced_when_configured() {
    let config = PantryConfig {
        membership: MembershipConfig {
            require_invitee_email_match: true,
        },
        ..PantryConfig::default()
    };
    let Some(fx) = fixture_with(config) else { return };
    let a = fx.user();
    let b = fx.user();
    let c = fx.user();
    let inv = fx.inventory(&a);
    let invitation = fx
        .pantry
        .membership
        .invite_user(&fx.conn, a.id, inv.id, &InviteInput::new(b.email.to_uppercase()))
        .unwrap();

    let wrong = fx.pantry.membership.accept_invitation(&fx.conn, c.id, invitation.id);
    assert_eq!(wrong.unwrap_err().kind(), ErrorKind::Unauthorized);
    fx.pantry
        .membership
        .accept_invitation(&fx.conn, b.id, invitation.id)
        .expect("case-insensitive match accepted");
}

#[test]
fn test_removal_rules() {
    let Some(fx) = fixture() else { return };
    let owner = fx.user();
    let admin = fx.user();
    let viewer = fx.user();
    let inv = fx.inventory(&owner);
    let invitation = fx
        .pantry
        .membership
        .invite_user(
            &fx.conn,
            owner.id,
            inv.id,
            &InviteInput::new(admin.email.clone()).with_role(Role::Admin),
        )
        .unwrap();
    fx.pantry.membership.accept_invitation(&fx.conn, admin.id, invitation.id).unwrap();
    fx.join(&owner, &inv, &viewer);

    let by_admin = fx.pantry.membership.remove_member(&fx.conn, admin.id, inv.id, viewer.id);
    assert_eq!(by_admin.unwrap_err().kind(), ErrorKind::Unauthorized);

    let self_removal = fx.pantry.membership.remove_member(&fx.conn, owner.id, inv.id, owner.id);
    assert_eq!(self_removal.unwrap_err().kind(), ErrorKind::InvalidInput);

    let stranger = fx.pantry.membership.remove_member(&fx.conn, owner.id, inv.id, fx.user().id);
    assert_eq!(stranger.unwrap_err().kind(), ErrorKind::NotFound);

    fx.pantry.membership.remove_member(&fx.conn, owner.id, inv.id, viewer.id).unwrap();
    let twice = fx.pantry.membership.remove_member(&fx.conn, owner.id, inv.id, viewer.id);
    assert_eq!(twice.unwrap_err().kind(), ErrorKind::NotFound);
    assert!(!fx
        .pantry
        .membership
        .is_member_or_owner(&fx.conn, viewer.id, inv.id)
        .unwrap());
}

#[test]
fn test_invitation_hidden_from_outsiders() {
    let Some(fx) = fixture() else { return };
    let a = fx.user();
    let outsider = fx.user();
    let inv = fx.inventory(&a);
    let invitation = fx
        .pantry
        .membership
        .invite_user(&fx.conn, a.id, inv.id, &InviteInput::new(unique_email()))
        .unwrap();

    let err = fx
        .pantry
        .membership
        .get_invitation(&fx.conn, outsider.id, invitation.id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
