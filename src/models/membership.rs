use chrono::{DateTime, Utc};
use may_postgres::Row;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PantryError;
use crate::executor::{DbError, DbExecutor};
use crate::raw_sql::{column, fetch_all, fetch_one, fetch_optional, FromRow};

/// Role a member holds in an inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    #[default]
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    /// Admins may invite; owners may always invite regardless of role.
    pub fn can_invite(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

fn role_column(row: &Row, name: &str) -> Result<Role, DbError> {
    column::<String>(row, name)?.parse().map_err(DbError::ParseError)
}

/// Whether a membership still grants access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MembershipState {
    Active,
    Removed { at: DateTime<Utc> },
}

impl MembershipState {
    fn from_removed_at(removed_at: Option<DateTime<Utc>>) -> Self {
        match removed_at {
            None => MembershipState::Active,
            Some(at) => MembershipState::Removed { at },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Membership {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
    pub state: MembershipState,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.state == MembershipState::Active
    }
}

impl FromRow for Membership {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            inventory_id: column(row, "inventory_id")?,
            user_id: column(row, "user_id")?,
            role: role_column(row, "role")?,
            joined_at: column(row, "created_at")?,
            state: MembershipState::from_removed_at(column(row, "removed_at")?),
        })
    }
}

/// `pending --accept--> accepted`, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
        }
    }

    /// The only transition: a pending invitation becomes accepted.
    pub fn accept(self) -> Result<Self, PantryError> {
        match self {
            InvitationStatus::Pending => Ok(InvitationStatus::Accepted),
            InvitationStatus::Accepted => Err(PantryError::Conflict(
                "invitation has already been accepted".to_string(),
            )),
        }
    }
}

impl FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            other => Err(format!("unknown invitation status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invitation {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub email: String,
    pub role: Role,
    pub invited_by_user_id: Uuid,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    /// Recorded for the boundary; acceptance does not check it.
    pub expires_at: Option<DateTime<Utc>>,
}

impl FromRow for Invitation {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            inventory_id: column(row, "inventory_id")?,
            email: column(row, "email")?,
            role: role_column(row, "role")?,
            invited_by_user_id: column(row, "invited_by_user_id")?,
            status: column::<String>(row, "status")?
                .parse()
                .map_err(DbError::ParseError)?,
            created_at: column(row, "created_at")?,
            accepted_at: column(row, "accepted_at")?,
            expires_at: column(row, "expires_at")?,
        })
    }
}

const MEMBERSHIP_COLUMNS: &str = "id, inventory_id, user_id, role, created_at, removed_at";
const INVITATION_COLUMNS: &str =
    "id, inventory_id, email, role, invited_by_user_id, status, created_at, accepted_at, expires_at";

pub fn insert_membership(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    user_id: Uuid,
    role: Role,
) -> Result<Membership, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO inventory_memberships (inventory_id, user_id, role) VALUES ($1, $2, $3) \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ),
        &[&inventory_id, &user_id, &role.as_str()],
    )
}

pub fn find_active(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Membership>, DbError> {
    fetch_optional(
        db,
        &format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM inventory_memberships \
             WHERE inventory_id = $1 AND user_id = $2 AND removed_at IS NULL"
        ),
        &[&inventory_id, &user_id],
    )
}

/// Active memberships in join order
pub fn list_active(db: &dyn DbExecutor, inventory_id: Uuid) -> Result<Vec<Membership>, DbError> {
    fetch_all(
        db,
        &format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM inventory_memberships \
             WHERE inventory_id = $1 AND removed_at IS NULL ORDER BY created_at ASC, id ASC"
        ),
        &[&inventory_id],
    )
}

/// Soft-remove an active membership; returns it in its removed state if one existed
pub fn remove(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Membership>, DbError> {
    fetch_optional(
        db,
        &format!(
            "UPDATE inventory_memberships SET removed_at = now() \
             WHERE inventory_id = $1 AND user_id = $2 AND removed_at IS NULL \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ),
        &[&inventory_id, &user_id],
    )
}

pub fn insert_invitation(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    email: &str,
    role: Role,
    invited_by: Uuid,
    expires_at: Option<DateTime<Utc>>,
) -> Result<Invitation, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO invitations (inventory_id, email, role, invited_by_user_id, status, expires_at) \
             VALUES ($1, $2, $3, $4, 'pending', $5) RETURNING {INVITATION_COLUMNS}"
        ),
        &[&inventory_id, &email, &role.as_str(), &invited_by, &expires_at],
    )
}

pub fn find_invitation(db: &dyn DbExecutor, id: Uuid) -> Result<Option<Invitation>, DbError> {
    fetch_optional(
        db,
        &format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1"),
        &[&id],
    )
}

/// Read an invitation and hold its row lock until the surrounding transaction ends
pub fn lock_invitation(db: &dyn DbExecutor, id: Uuid) -> Result<Option<Invitation>, DbError> {
    fetch_optional(
        db,
        &format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1 FOR UPDATE"),
        &[&id],
    )
}

pub fn set_invitation_status(
    db: &dyn DbExecutor,
    id: Uuid,
    status: InvitationStatus,
) -> Result<Invitation, DbError> {
    fetch_one(
        db,
        &format!(
            "UPDATE invitations SET status = $2, \
             accepted_at = CASE WHEN $2 = 'accepted' THEN now() ELSE accepted_at END \
             WHERE id = $1 RETURNING {INVITATION_COLUMNS}"
        ),
        &[&id, &status.as_str()],
    )
}
