use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account role, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Buyer,
    Partner,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "BUYER",
            Role::Partner => "PARTNER",
            Role::Moderator => "MODERATOR",
        }
    }

    /// Approval state a freshly registered account of this role starts in.
    pub fn initial_approval(&self) -> ApprovalState {
        match self {
            Role::Partner => ApprovalState::Pending,
            Role::Buyer | Role::Moderator => ApprovalState::NotApplicable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUYER" => Ok(Role::Buyer),
            "PARTNER" => Ok(Role::Partner),
            "MODERATOR" => Ok(Role::Moderator),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partner approval state. Only partners ever leave `NotApplicable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    NotApplicable,
    Pending,
    Approved,
    Rejected,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::NotApplicable => "NOT_APPLICABLE",
            ApprovalState::Pending => "PENDING",
            ApprovalState::Approved => "APPROVED",
            ApprovalState::Rejected => "REJECTED",
        }
    }
}

impl FromStr for ApprovalState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_APPLICABLE" => Ok(ApprovalState::NotApplicable),
            "PENDING" => Ok(ApprovalState::Pending),
            "APPROVED" => Ok(ApprovalState::Approved),
            "REJECTED" => Ok(ApprovalState::Rejected),
            other => anyhow::bail!("unknown approval state {other:?}"),
        }
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account record in the database.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub role: Role,
    pub approval_state: ApprovalState,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub phone: String,
    #[serde(skip_serializing)]
    pub reset_code: Option<String>,
    #[serde(skip_serializing)]
    pub reset_code_expires_at: Option<OffsetDateTime>,
    pub rejected_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Row as it comes back from postgres; role and approval state are TEXT columns.
#[derive(Debug, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub approval_state: String,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub phone: String,
    pub reset_code: Option<String>,
    pub reset_code_expires_at: Option<OffsetDateTime>,
    pub rejected_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<AccountRow> for Account {
    type Error = anyhow::Error;

    fn try_from(r: AccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            role: r.role.parse()?,
            approval_state: r.approval_state.parse()?,
            company_name: r.company_name,
            company_address: r.company_address,
            phone: r.phone,
            reset_code: r.reset_code,
            reset_code_expires_at: r.reset_code_expires_at,
            rejected_at: r.rejected_at,
            created_at: r.created_at,
        })
    }
}

/// Validated registration data, ready to persist.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub phone: String,
}

impl NewAccount {
    pub fn approval_state(&self) -> ApprovalState {
        self.role.initial_approval()
    }
}
