use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{
    jwt::SessionTokens,
    repo_types::{Account, ApprovalState, Role},
    services::{Authenticated, RegisterInput},
};

/// Request body for account registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
}

impl From<RegisterRequest> for RegisterInput {
    fn from(r: RegisterRequest) -> Self {
        Self {
            email: r.email,
            password: r.password,
            // a missing role fails role parsing like any unknown one
            role: r.role.unwrap_or_default(),
            phone: r.phone,
            company_name: r.company_name,
            company_address: r.company_address,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResetRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteResetRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Public part of the account returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicAccount {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub approval_state: ApprovalState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_address: Option<String>,
    pub phone: String,
}

impl From<Account> for PublicAccount {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            email: a.email,
            role: a.role,
            approval_state: a.approval_state,
            company_name: a.company_name,
            company_address: a.company_address,
            phone: a.phone,
        }
    }
}

/// Response returned after register, login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub session: SessionTokens,
    pub account: PublicAccount,
}

impl From<Authenticated> for AuthResponse {
    fn from(a: Authenticated) -> Self {
        Self {
            session: a.session,
            account: a.account.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub status: &'static str,
}

impl Ack {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub id: Uuid,
    pub approval_state: ApprovalState,
}
