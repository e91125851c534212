use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Caller-visible failures of the identity service.
///
/// Storage and hashing internals never travel inside these variants; they are
/// logged where they happen and surface as `StorageUnavailable` or `Internal`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid email")]
    InvalidEmail,

    #[error("Role must be one of BUYER, PARTNER, MODERATOR")]
    InvalidRole,

    #[error("Partners must provide company name and company address")]
    MissingPartnerFields,

    #[error("Phone is required")]
    MissingPhone,

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("An account with this email already exists")]
    DuplicateAccount,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is awaiting moderator approval")]
    PendingApproval,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Moderator role required")]
    Forbidden,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Account is not a partner")]
    NotAPartner,

    #[error("No password reset in progress")]
    NoCodeInFlight,

    #[error("Reset code does not match")]
    CodeMismatch,

    #[error("Reset code expired")]
    CodeExpired,

    #[error("Could not deliver notification")]
    NotificationDeliveryFailed,

    #[error("Storage unavailable")]
    StorageUnavailable,

    #[error("Internal server error")]
    Internal,
}

impl IdentityError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            IdentityError::MalformedRequest(_) => "malformed_request",
            IdentityError::InvalidEmail => "invalid_email",
            IdentityError::InvalidRole => "invalid_role",
            IdentityError::MissingPartnerFields => "missing_partner_fields",
            IdentityError::MissingPhone => "missing_phone",
            IdentityError::PasswordTooShort(_) => "password_too_short",
            IdentityError::DuplicateAccount => "duplicate_account",
            IdentityError::InvalidCredentials => "invalid_credentials",
            IdentityError::PendingApproval => "pending_approval",
            IdentityError::InvalidToken => "invalid_token",
            IdentityError::Forbidden => "forbidden",
            IdentityError::AccountNotFound => "account_not_found",
            IdentityError::NotAPartner => "not_a_partner",
            IdentityError::NoCodeInFlight => "no_code_in_flight",
            IdentityError::CodeMismatch => "code_mismatch",
            IdentityError::CodeExpired => "code_expired",
            IdentityError::NotificationDeliveryFailed => "notification_delivery_failed",
            IdentityError::StorageUnavailable => "storage_unavailable",
            IdentityError::Internal => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            IdentityError::MalformedRequest(_)
            | IdentityError::InvalidEmail
            | IdentityError::InvalidRole
            | IdentityError::MissingPartnerFields
            | IdentityError::MissingPhone
            | IdentityError::PasswordTooShort(_)
            | IdentityError::NoCodeInFlight
            | IdentityError::CodeMismatch => StatusCode::BAD_REQUEST,
            IdentityError::CodeExpired => StatusCode::GONE,
            IdentityError::DuplicateAccount => StatusCode::CONFLICT,
            IdentityError::InvalidCredentials | IdentityError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            IdentityError::PendingApproval | IdentityError::Forbidden => StatusCode::FORBIDDEN,
            IdentityError::AccountNotFound => StatusCode::NOT_FOUND,
            IdentityError::NotAPartner => StatusCode::UNPROCESSABLE_ENTITY,
            IdentityError::NotificationDeliveryFailed => StatusCode::BAD_GATEWAY,
            IdentityError::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            IdentityError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({
                "error": self.kind(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for IdentityError {
    fn from(rejection: JsonRejection) -> Self {
        IdentityError::MalformedRequest(rejection.body_text())
    }
}

impl From<PathRejection> for IdentityError {
    fn from(rejection: PathRejection) -> Self {
        IdentityError::MalformedRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_share_one_kind() {
        assert_eq!(IdentityError::InvalidCredentials.kind(), "invalid_credentials");
        assert_ne!(
            IdentityError::PendingApproval.kind(),
            IdentityError::InvalidCredentials.kind()
        );
        assert_ne!(
            IdentityError::PendingApproval.status(),
            IdentityError::InvalidCredentials.status()
        );
    }

    #[tokio::test]
    async fn response_body_carries_kind_and_message() {
        let res = IdentityError::PasswordTooShort(8).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"], "password_too_short");
        assert_eq!(v["message"], "Password must be at least 8 characters");
    }
}
