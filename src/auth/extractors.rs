use axum::{
    async_trait,
    extract::{FromRef, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::auth::{
    error::IdentityError,
    jwt::{Claims, JwtKeys},
    repo_types::Role,
};

/// Caller identity from a valid bearer access token.
///
/// The role/approval claims are a snapshot for display; endpoints that need
/// partner access must consult the account's current state.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = IdentityError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(IdentityError::InvalidToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(IdentityError::InvalidToken)?;

        let claims = keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            IdentityError::InvalidToken
        })?;

        Ok(AuthUser(claims))
    }
}

/// An [`AuthUser`] whose token carries the moderator role.
pub struct Moderator(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for Moderator
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = IdentityError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Moderator {
            warn!(account_id = %claims.sub, role = %claims.role, "moderator route refused");
            return Err(IdentityError::Forbidden);
        }
        Ok(Moderator(claims))
    }
}

/// JSON body whose parse failures render as `malformed_request`.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = IdentityError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            warn!(error = %e.body_text(), "rejected request body");
            IdentityError::from(e)
        })?;
        Ok(ApiJson(value))
    }
}

/// Path parameters whose parse failures render as `malformed_request`.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = IdentityError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}
