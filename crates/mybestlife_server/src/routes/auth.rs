//! `/api/auth` handlers.

use crate::error::ApiError;
use crate::extract::{BearerToken, ClientKey};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::warn;
use mybestlife_core::repo::SqliteUserRepository;
use mybestlife_core::service::auth_service::{AuthService, RegisterRequest};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailBody {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordBody {
    pub token: String,
    #[serde(alias = "newPassword")]
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

fn service<'a>(
    state: &'a AppState,
    conn: &'a Connection,
) -> AuthService<'a, SqliteUserRepository<'a>> {
    AuthService::new(
        SqliteUserRepository::new(conn),
        &state.security,
        state.mailer.as_ref(),
        state.clock.as_ref(),
    )
}

fn throttle(state: &AppState, client: &ClientKey) -> Result<(), ApiError> {
    state
        .limiter
        .check(&client.0, state.now_ms())
        .map_err(|retry| {
            warn!("event=rate_limit module=server status=rejected");
            ApiError::rate_limited(retry)
        })
}

pub async fn register(
    State(state): State<AppState>,
    client: ClientKey,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    throttle(&state, &client)?;
    let request = RegisterRequest {
        name: body.name,
        username: body.username,
        email: body.email,
        phone: body.phone,
        password: body.password,
    };
    let user = state.with_db(|conn| Ok(service(&state, conn).register(&request)?))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful. Please check your email to verify your account.",
            "user": user,
        })),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    client: ClientKey,
    Json(body): Json<TokenBody>,
) -> Result<Json<Value>, ApiError> {
    throttle(&state, &client)?;
    state.with_db(|conn| Ok(service(&state, conn).verify_email(&body.token)?))?;
    Ok(Json(json!({ "message": "Email verified successfully" })))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    client: ClientKey,
    Json(body): Json<EmailBody>,
) -> Result<Json<Value>, ApiError> {
    throttle(&state, &client)?;
    state.with_db(|conn| Ok(service(&state, conn).resend_verification(&body.email)?))?;
    Ok(Json(json!({ "message": "Verification email sent" })))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    client: ClientKey,
    Json(body): Json<EmailBody>,
) -> Result<Json<Value>, ApiError> {
    throttle(&state, &client)?;
    state.with_db(|conn| Ok(service(&state, conn).forgot_password(&body.email)?))?;
    Ok(Json(json!({
        "message": "If an account exists with this email, a reset link has been sent"
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    client: ClientKey,
    Json(body): Json<ResetPasswordBody>,
) -> Result<Json<Value>, ApiError> {
    throttle(&state, &client)?;
    state.with_db(|conn| {
        Ok(service(&state, conn).reset_password(&body.token, &body.password)?)
    })?;
    Ok(Json(json!({ "message": "Password reset successfully" })))
}

pub async fn login(
    State(state): State<AppState>,
    client: ClientKey,
    Json(body): Json<LoginBody>,
) -> Result<Json<Value>, ApiError> {
    throttle(&state, &client)?;
    let result = state.with_db(|conn| Ok(service(&state, conn).login(&body.email, &body.password)?))?;
    Ok(Json(json!({
        "message": "Login successful",
        "token": result.token,
        "user": result.user,
    })))
}

pub async fn me(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<Value>, ApiError> {
    let user = state.with_db(|conn| Ok(service(&state, conn).me(&token)?))?;
    Ok(Json(json!({ "user": user })))
}

pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<Value>, ApiError> {
    state.with_db(|conn| Ok(service(&state, conn).logout(&token)?))?;
    Ok(Json(json!({ "message": "Logged out successfully" })))
}
