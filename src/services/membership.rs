//! Who may see and change an inventory, and how people join one.

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::error::PantryError;
use crate::executor::DbExecutor;
use crate::models::{inventory, membership, user};
use crate::models::{ActivityEntry, Invitation, Membership, Role};
use crate::pool::config::MembershipConfig;
use crate::raw_sql::column;
use crate::services::activity::ActivityLog;
use crate::services::{enter, normalize_email};

/// Access checks shared by every inventory-scoped service.
///
/// Checks fail closed: an unknown inventory is simply not accessible.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer;

impl Authorizer {
    /// True if the user owns the live inventory or holds an active membership in it.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures are errors; "no such inventory" is `Ok(false)`.
    pub fn is_member_or_owner(
        &self,
        db: &dyn DbExecutor,
        user_id: Uuid,
        inventory_id: Uuid,
    ) -> Result<bool, PantryError> {
        let row = db.query_opt(
            "SELECT (i.owner_user_id = $1 OR EXISTS ( \
                 SELECT 1 FROM inventory_memberships m \
                 WHERE m.inventory_id = i.id AND m.user_id = $1 AND m.removed_at IS NULL \
             )) AS allowed \
             FROM inventories i WHERE i.id = $2 AND i.deleted_at IS NULL",
            &[&user_id, &inventory_id],
        )?;
        match row {
            Some(row) => Ok(column::<bool>(&row, "allowed")?),
            None => Ok(false),
        }
    }

    /// `Unauthorized` unless the user can act on the inventory.
    pub fn require_member(
        &self,
        db: &dyn DbExecutor,
        user_id: Uuid,
        inventory_id: Uuid,
    ) -> Result<(), PantryError> {
        if self.is_member_or_owner(db, user_id, inventory_id)? {
            Ok(())
        } else {
            log::debug!("user {user_id} denied on inventory {inventory_id}");
            Err(PantryError::not_a_member())
        }
    }

    /// `NotFound(entity)` unless the user can see the inventory holding it.
    pub fn require_visible(
        &self,
        db: &dyn DbExecutor,
        user_id: Uuid,
        inventory_id: Uuid,
        entity: &str,
    ) -> Result<(), PantryError> {
        if self.is_member_or_owner(db, user_id, inventory_id)? {
            Ok(())
        } else {
            Err(PantryError::not_found(entity))
        }
    }

    pub fn membership_of(
        &self,
        db: &dyn DbExecutor,
        user_id: Uuid,
        inventory_id: Uuid,
    ) -> Result<Option<Membership>, PantryError> {
        Ok(membership::find_active(db, inventory_id, user_id)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InviteInput {
    pub email: String,
    /// Defaults to `viewer`
    pub role: Option<Role>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl InviteInput {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MembershipService {
    authz: Authorizer,
    activity: ActivityLog,
    config: MembershipConfig,
}

impl MembershipService {
    pub fn new(config: MembershipConfig) -> Self {
        Self {
            authz: Authorizer,
            activity: ActivityLog,
            config,
        }
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authz
    }

    pub fn is_member_or_owner(
        &self,
        db: &dyn DbExecutor,
        user_id: Uuid,
        inventory_id: Uuid,
    ) -> Result<bool, PantryError> {
        self.authz.is_member_or_owner(db, user_id, inventory_id)
    }

    /// Invite someone by email. Only the owner or an admin may invite.
    ///
    /// The email does not have to belong to a registered account yet.
    pub fn invite_user(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        input: &InviteInput,
    ) -> Result<Invitation, PantryError> {
        let email = normalize_email(&input.email)?;
        let role = input.role.unwrap_or_default();
        let _span = enter("membership.invite_user");

        let tx = db.begin()?;
        if !self.may_invite(&tx, actor, inventory_id)? {
            return Err(PantryError::Unauthorized(
                "only the owner or an admin may invite members".to_string(),
            ));
        }
        let invitation =
            membership::insert_invitation(&tx, inventory_id, &email, role, actor, input.expires_at)?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("invitation.created", "invitation", invitation.id)
                .in_inventory(inventory_id)
                .by(actor)
                .with_metadata(json!({ "email": invitation.email, "role": role.as_str() })),
        )?;
        tx.commit()?;

        log::info!("invitation {} created for inventory {inventory_id}", invitation.id);
        Ok(invitation)
    }

    fn may_invite(&self, db: &dyn DbExecutor, actor: Uuid, inventory_id: Uuid) -> Result<bool, PantryError> {
        let Some(inventory) = inventory::find_live(db, inventory_id)? else {
            return Ok(false);
        };
        if inventory.owner_user_id == actor {
            return Ok(true);
        }
        Ok(membership::find_active(db, inventory_id, actor)?.is_some_and(|m| m.role.can_invite()))
    }

    /// Turn a pending invitation into a membership for `user_id`.
    ///
    /// The invitation row stays locked until the scope ends, so of two
    /// concurrent accepts exactly one succeeds and the other sees `Conflict`.
    pub fn accept_invitation(
        &self,
        db: &dyn DbExecutor,
        user_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<Membership, PantryError> {
        let _span = enter("membership.accept_invitation");

        let tx = db.begin()?;
        let invitation = membership::lock_invitation(&tx, invitation_id)?
            .ok_or_else(|| PantryError::not_found("invitation"))?;
        let accepted = invitation.status.accept()?;

        if membership::find_active(&tx, invitation.inventory_id, user_id)?.is_some() {
            return Err(PantryError::Conflict(
                "user is already a member of this inventory".to_string(),
            ));
        }
        if self.config.require_invitee_email_match {
            let user = user::find_by_id(&tx, user_id)?.ok_or_else(|| PantryError::not_found("user"))?;
            if !user.email.eq_ignore_ascii_case(&invitation.email) {
                return Err(PantryError::Unauthorized(
                    "invitation was issued to a different email address".to_string(),
                ));
            }
        }

        membership::set_invitation_status(&tx, invitation.id, accepted)?;
        let member = membership::insert_membership(&tx, invitation.inventory_id, user_id, invitation.role)
            .map_err(|e| PantryError::conflict_on_duplicate(e, "user is already a member of this inventory"))?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("invitation.accepted", "invitation", invitation.id)
                .in_inventory(invitation.inventory_id)
                .by(user_id)
                .with_metadata(json!({ "membership_id": member.id, "role": member.role.as_str() })),
        )?;
        tx.commit()?;

        log::info!(
            "user {user_id} joined inventory {} as {}",
            invitation.inventory_id,
            member.role
        );
        Ok(member)
    }

    /// Visible to the inventory's members and owner only.
    pub fn get_invitation(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        invitation_id: Uuid,
    ) -> Result<Invitation, PantryError> {
        let invitation =
            membership::find_invitation(db, invitation_id)?.ok_or_else(|| PantryError::not_found("invitation"))?;
        self.authz
            .require_visible(db, actor, invitation.inventory_id, "invitation")?;
        Ok(invitation)
    }

    /// Active members in join order.
    pub fn list_members(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
    ) -> Result<Vec<Membership>, PantryError> {
        self.authz.require_member(db, actor, inventory_id)?;
        Ok(membership::list_active(db, inventory_id)?)
    }

    /// Remove a member. Only the owner may do this, and not to themself.
    pub fn remove_member(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<Membership, PantryError> {
        let _span = enter("membership.remove_member");

        let tx = db.begin()?;
        let is_owner = inventory::find_live(&tx, inventory_id)?
            .is_some_and(|inventory| inventory.owner_user_id == actor);
        if !is_owner {
            return Err(PantryError::Unauthorized(
                "only the inventory owner may remove members".to_string(),
            ));
        }
        if target_user_id == actor {
            return Err(PantryError::invalid("the owner cannot remove themself"));
        }
        let removed = membership::remove(&tx, inventory_id, target_user_id)?
            .ok_or_else(|| PantryError::not_found("membership"))?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("member.removed", "membership", removed.id)
                .in_inventory(inventory_id)
                .by(actor)
                .with_metadata(json!({ "user_id": target_user_id })),
        )?;
        tx.commit()?;

        log::info!("user {target_user_id} removed from inventory {inventory_id}");
        Ok(removed)
    }
}
