use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            Ack, ApprovalResponse, AuthResponse, CompleteResetRequest, LoginRequest,
            PublicAccount, RefreshRequest, RegisterRequest, ResetRequest, VerifyResetRequest,
        },
        error::IdentityError,
        extractors::{ApiJson, ApiPath, AuthUser, Moderator},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/password-reset/request", post(request_reset))
        .route("/auth/password-reset/verify", post(verify_reset))
        .route("/auth/password-reset/complete", post(complete_reset))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/partners/:id/approve", post(approve_partner))
        .route("/admin/partners/:id/reject", post(reject_partner))
}

#[instrument(skip(state, payload), fields(email = %payload.email, role = ?payload.role))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), IdentityError> {
    let out = state.identity.register(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(out.into())))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, IdentityError> {
    let out = state
        .identity
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(out.into()))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, IdentityError> {
    let out = state.identity.refresh(&payload.refresh_token).await?;
    Ok(Json(out.into()))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn request_reset(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetRequest>,
) -> Result<Json<Ack>, IdentityError> {
    state.identity.request_reset(&payload.email).await?;
    Ok(Json(Ack::ok()))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn verify_reset(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<VerifyResetRequest>,
) -> Result<Json<Ack>, IdentityError> {
    state
        .identity
        .verify_reset(&payload.email, &payload.code)
        .await?;
    Ok(Json(Ack::ok()))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn complete_reset(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CompleteResetRequest>,
) -> Result<Json<Ack>, IdentityError> {
    state
        .identity
        .complete_reset(&payload.email, &payload.code, &payload.new_password)
        .await?;
    Ok(Json(Ack::ok()))
}

#[instrument(skip(state, claims), fields(account_id = %claims.sub))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<PublicAccount>, IdentityError> {
    let account = state.identity.current_account(claims.sub).await?;
    Ok(Json(account.into()))
}

#[instrument(skip(state, moderator), fields(moderator_id = %moderator.sub))]
pub async fn approve_partner(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApprovalResponse>, IdentityError> {
    let account = state.identity.approve_partner(id).await?;
    Ok(Json(ApprovalResponse {
        id: account.id,
        approval_state: account.approval_state,
    }))
}

#[instrument(skip(state, moderator), fields(moderator_id = %moderator.sub))]
pub async fn reject_partner(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApprovalResponse>, IdentityError> {
    let account = state.identity.reject_partner(id).await?;
    Ok(Json(ApprovalResponse {
        id: account.id,
        approval_state: account.approval_state,
    }))
}
