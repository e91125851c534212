use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{
    error::{IdentityError, Result},
    gate,
    jwt::{JwtKeys, SessionTokens},
    notify::{Notification, Notifier, Template},
    password::{hash_password, verify_absent, verify_password},
    repo::{AccountStore, StoreError},
    repo_types::{Account, ApprovalState, NewAccount, Role},
    reset_code::{self, ResetCodeGenerator},
};
use crate::clock::Clock;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn storage(e: StoreError) -> IdentityError {
    error!(error = %e, "account store failure");
    IdentityError::StorageUnavailable
}

fn internal(e: anyhow::Error) -> IdentityError {
    error!(error = %e, "internal failure");
    IdentityError::Internal
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub role: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
}

/// Account plus a fresh session pair.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub account: Account,
    pub session: SessionTokens,
}

/// Orchestrates the account lifecycle over its collaborators.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    keys: JwtKeys,
    reset_codes: ResetCodeGenerator,
    clock: Arc<dyn Clock>,
    min_password_len: usize,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        keys: JwtKeys,
        reset_codes: ResetCodeGenerator,
        clock: Arc<dyn Clock>,
        min_password_len: usize,
    ) -> Self {
        Self {
            store,
            notifier,
            keys,
            reset_codes,
            clock,
            min_password_len,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    fn check_password_policy(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_password_len {
            warn!("password too short");
            return Err(IdentityError::PasswordTooShort(self.min_password_len));
        }
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Account> {
        self.store
            .find_by_email(email)
            .await
            .map_err(storage)?
            .ok_or(IdentityError::AccountNotFound)
    }

    /// Creates an account and signs a session for it, whatever its approval state.
    pub async fn register(&self, input: RegisterInput) -> Result<Authenticated> {
        let email = input.email.trim().to_string();
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(IdentityError::InvalidEmail);
        }

        let role: Role = input.role.trim().parse().map_err(|e| {
            warn!(error = %e, "registration with unknown role");
            IdentityError::InvalidRole
        })?;

        let (company_name, company_address) = match role {
            Role::Partner => {
                let name = non_blank(input.company_name);
                let address = non_blank(input.company_address);
                match (name, address) {
                    (Some(name), Some(address)) => (Some(name), Some(address)),
                    _ => {
                        warn!(email = %email, "partner registration without company details");
                        return Err(IdentityError::MissingPartnerFields);
                    }
                }
            }
            Role::Buyer | Role::Moderator => (None, None),
        };

        let phone = non_blank(input.phone).ok_or(IdentityError::MissingPhone)?;
        self.check_password_policy(&input.password)?;

        if self
            .store
            .find_by_email(&email)
            .await
            .map_err(storage)?
            .is_some()
        {
            warn!(email = %email, "email already registered");
            return Err(IdentityError::DuplicateAccount);
        }

        let password_hash = hash_password(&input.password).map_err(internal)?;
        let account = self
            .store
            .insert(NewAccount {
                email,
                password_hash,
                role,
                company_name,
                company_address,
                phone,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict => {
                    warn!("email registered concurrently");
                    IdentityError::DuplicateAccount
                }
                other => storage(other),
            })?;

        let session = self.keys.sign_pair(&account).map_err(internal)?;
        info!(
            account_id = %account.id,
            role = %account.role,
            approval = %account.approval_state,
            "account registered"
        );
        Ok(Authenticated { account, session })
    }

    /// Verifies credentials, then applies the approval gate.
    pub async fn login(&self, email: &str, password: &str) -> Result<Authenticated> {
        let email = email.trim();
        let account = match self.store.find_by_email(email).await.map_err(storage)? {
            Some(a) => a,
            None => {
                verify_absent(password);
                warn!(email = %email, "login unknown email");
                return Err(IdentityError::InvalidCredentials);
            }
        };

        if !verify_password(password, &account.password_hash).map_err(internal)? {
            warn!(account_id = %account.id, "login invalid password");
            return Err(IdentityError::InvalidCredentials);
        }

        gate::check(account.role, account.approval_state).inspect_err(|_| {
            warn!(
                account_id = %account.id,
                approval = %account.approval_state,
                "login blocked by approval gate"
            );
        })?;

        let session = self.keys.sign_pair(&account).map_err(internal)?;
        info!(account_id = %account.id, role = %account.role, "account logged in");
        Ok(Authenticated { account, session })
    }

    /// Exchanges a refresh token for a new pair, re-reading the account so the
    /// approval gate sees its current state rather than the token's snapshot.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Authenticated> {
        let claims = self.keys.verify_refresh(refresh_token).map_err(|e| {
            warn!(error = %e, "refresh rejected");
            IdentityError::InvalidToken
        })?;
        let account = self
            .store
            .find_by_id(claims.sub)
            .await
            .map_err(storage)?
            .ok_or(IdentityError::InvalidToken)?;

        gate::check(account.role, account.approval_state)?;

        let session = self.keys.sign_pair(&account).map_err(internal)?;
        Ok(Authenticated { account, session })
    }

    pub async fn current_account(&self, id: Uuid) -> Result<Account> {
        self.store
            .find_by_id(id)
            .await
            .map_err(storage)?
            .ok_or(IdentityError::AccountNotFound)
    }

    /// Issues a fresh reset code (replacing any in flight) and sends it out.
    /// If the code cannot be delivered it is withdrawn again.
    pub async fn request_reset(&self, email: &str) -> Result<()> {
        let account = self.find_by_email(email.trim()).await?;
        let issued = self.reset_codes.issue(self.clock.now());

        self.store
            .set_reset_code(account.id, &issued.code, issued.expires_at)
            .await
            .map_err(storage)?;

        let notification = Notification::new(&account.email, Template::PasswordResetCode)
            .param("code", issued.code.as_str())
            .param(
                "expires_in_minutes",
                self.reset_codes.ttl().whole_minutes().to_string(),
            );

        if let Err(e) = self.notifier.dispatch(notification).await {
            warn!(account_id = %account.id, error = %e, "reset code delivery failed");
            if let Err(e) = self.store.release_reset_code(account.id, &issued.code).await {
                error!(account_id = %account.id, error = %e, "could not withdraw undelivered reset code");
            }
            return Err(IdentityError::NotificationDeliveryFailed);
        }

        info!(account_id = %account.id, expires_at = %issued.expires_at, "reset code issued");
        Ok(())
    }

    /// Read-only check of a reset code; does not consume it.
    pub async fn verify_reset(&self, email: &str, code: &str) -> Result<()> {
        let account = self.find_by_email(email.trim()).await?;
        reset_code::check(&account, code.trim(), self.clock.now())
    }

    /// Sets a new password and consumes the code.
    pub async fn complete_reset(&self, email: &str, code: &str, new_password: &str) -> Result<()> {
        let account = self.find_by_email(email.trim()).await?;
        let code = code.trim();
        let now = self.clock.now();
        reset_code::check(&account, code, now)?;
        self.check_password_policy(new_password)?;

        let password_hash = hash_password(new_password).map_err(internal)?;
        let consumed = self
            .store
            .consume_reset_code(account.id, code, now, &password_hash)
            .await
            .map_err(storage)?;
        if !consumed {
            // the pair changed after our check; report what it changed into
            warn!(account_id = %account.id, "reset code changed before consume");
            if let Some(current) = self.store.find_by_id(account.id).await.map_err(storage)? {
                reset_code::check(&current, code, self.clock.now())?;
            }
            return Err(IdentityError::NoCodeInFlight);
        }

        info!(account_id = %account.id, "password reset completed");
        Ok(())
    }

    pub async fn approve_partner(&self, id: Uuid) -> Result<Account> {
        self.set_partner_approval(id, ApprovalState::Approved).await
    }

    pub async fn reject_partner(&self, id: Uuid) -> Result<Account> {
        self.set_partner_approval(id, ApprovalState::Rejected).await
    }

    async fn set_partner_approval(&self, id: Uuid, target: ApprovalState) -> Result<Account> {
        let account = self.current_account(id).await?;
        if account.role != Role::Partner {
            warn!(account_id = %id, role = %account.role, "approval change on non-partner");
            return Err(IdentityError::NotAPartner);
        }
        if account.approval_state == target {
            return Ok(account);
        }

        let updated = self
            .store
            .set_approval(id, target, self.clock.now())
            .await
            .map_err(storage)?
            .ok_or(IdentityError::AccountNotFound)?;
        info!(
            account_id = %id,
            from = %account.approval_state,
            to = %updated.approval_state,
            "partner approval changed"
        );

        let template = match target {
            ApprovalState::Rejected => Template::PartnerRejected,
            _ => Template::PartnerApproved,
        };
        let mut notification = Notification::new(&updated.email, template);
        if let Some(company) = &updated.company_name {
            notification = notification.param("company_name", company.as_str());
        }
        if let Err(e) = self.notifier.dispatch(notification).await {
            warn!(account_id = %id, error = %e, "approval notification not delivered");
        }

        Ok(updated)
    }
}
