use axum::extract::{ConnectInfo, FromRequestParts, Path, State};
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use mybestlife_core::auth::{AuthSecurity, PasswordHasher, RateLimiter};
use mybestlife_core::db::open_db_in_memory;
use mybestlife_core::mail::LogMailer;
use mybestlife_core::repo::{SqliteUserRepository, UserRepository};
use mybestlife_core::{CpByCategory, CpSyncPayload, FixedClock};
use mybestlife_server::extract::{authorize, AuthUser, BearerToken, ClientKey};
use mybestlife_server::routes::auth::{self, EmailBody, LoginBody, RegisterBody, TokenBody};
use mybestlife_server::routes::groups::{self, CreateGroupBody, MessageBody};
use mybestlife_server::routes::users;
use mybestlife_server::{ApiError, AppState};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const PASSWORD: &str = "Str0ng!pass";

fn state_with_limit(max_requests: u32) -> AppState {
    let mut security = AuthSecurity::with_secret("server-test-secret");
    security.hasher = PasswordHasher::new(1_000);
    AppState::new(
        open_db_in_memory().unwrap(),
        security,
        RateLimiter::new(Duration::from_secs(60), max_requests),
        Arc::new(LogMailer),
        Arc::new(FixedClock::on_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())),
    )
}

fn state() -> AppState {
    state_with_limit(100)
}

fn client() -> ClientKey {
    ClientKey("10.0.0.1".to_string())
}

async fn body_json(err: ApiError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn register(state: &AppState, username: &str) {
    auth::register(
        State(state.clone()),
        client(),
        Json(RegisterBody {
            name: format!("{username} name"),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            phone: None,
            password: PASSWORD.to_string(),
        }),
    )
    .await
    .unwrap();
}

async fn verified_login(state: &AppState, username: &str) -> (String, AuthUser) {
    register(state, username).await;
    let email = format!("{username}@example.com");
    let token = state
        .with_db(|conn| {
            Ok(SqliteUserRepository::new(conn)
                .find_by_email(&email)?
                .and_then(|account| account.verification_token))
        })
        .unwrap()
        .unwrap();
    auth::verify_email(State(state.clone()), client(), Json(TokenBody { token }))
        .await
        .unwrap();

    let Json(body) = auth::login(
        State(state.clone()),
        client(),
        Json(LoginBody {
            email,
            password: PASSWORD.to_string(),
        }),
    )
    .await
    .unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    let user = authorize(state, &token).unwrap();
    (token, user)
}

#[tokio::test]
async fn register_returns_created_with_public_user() {
    let state = state();
    let (status, Json(body)) = auth::register(
        State(state.clone()),
        client(),
        Json(RegisterBody {
            name: "Ada".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            password: PASSWORD.to_string(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["emailVerified"], false);
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
    let state = state();
    register(&state, "ada").await;
    let err = auth::register(
        State(state.clone()),
        client(),
        Json(RegisterBody {
            name: "Other".to_string(),
            username: "other".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            password: PASSWORD.to_string(),
        }),
    )
    .await
    .unwrap_err();

    let (status, body) = body_json(err).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "account_exists");
}

#[tokio::test]
async fn unverified_login_flags_verification() {
    let state = state();
    register(&state, "ada").await;
    let err = auth::login(
        State(state.clone()),
        client(),
        Json(LoginBody {
            email: "ada@example.com".to_string(),
            password: PASSWORD.to_string(),
        }),
    )
    .await
    .unwrap_err();

    let (status, body) = body_json(err).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["requiresVerification"], true);
}

#[tokio::test]
async fn login_me_logout_round_trip() {
    let state = state();
    let (token, user) = verified_login(&state, "ada").await;

    let Json(me) = auth::me(State(state.clone()), BearerToken(token.clone()))
        .await
        .unwrap();
    assert_eq!(me["user"]["id"], user.user_id.as_str());

    auth::logout(State(state.clone()), BearerToken(token.clone()))
        .await
        .unwrap();
    let err = auth::me(State(state.clone()), BearerToken(token.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(authorize(&state, &token).unwrap_err().status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn auth_routes_are_rate_limited() {
    let state = state_with_limit(2);
    for _ in 0..2 {
        auth::forgot_password(
            State(state.clone()),
            client(),
            Json(EmailBody {
                email: "ghost@example.com".to_string(),
            }),
        )
        .await
        .unwrap();
    }
    let err = auth::forgot_password(
        State(state.clone()),
        client(),
        Json(EmailBody {
            email: "ghost@example.com".to_string(),
        }),
    )
    .await
    .unwrap_err();

    let (status, body) = body_json(err).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["retryAfter"], 60);
}

async fn client_from_request(state: &AppState, forwarded_for: &str) -> ClientKey {
    let mut request = Request::builder()
        .uri("/api/auth/forgot-password")
        .header("x-forwarded-for", forwarded_for)
        .body(())
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 4], 52_000))));
    let (mut parts, ()) = request.into_parts();
    ClientKey::from_request_parts(&mut parts, state).await.unwrap()
}

#[tokio::test]
async fn rotating_forwarded_header_does_not_escape_rate_limit() {
    let state = state_with_limit(5);
    let mut rejected = 0;
    for n in 0..20 {
        let client = client_from_request(&state, &format!("203.0.113.{n}")).await;
        assert_eq!(client.0, "198.51.100.4");
        let result = auth::forgot_password(
            State(state.clone()),
            client,
            Json(EmailBody {
                email: "ghost@example.com".to_string(),
            }),
        )
        .await;
        if let Err(err) = result {
            assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
            rejected += 1;
        }
    }
    assert_eq!(rejected, 15);
}

#[tokio::test]
async fn trusted_proxy_hop_keys_on_forwarded_client() {
    let state = state().with_trusted_proxy_hops(1);
    let client = client_from_request(&state, "6.6.6.6, 203.0.113.50").await;
    assert_eq!(client.0, "203.0.113.50");
}

#[tokio::test]
async fn invalid_token_is_forbidden_on_protected_routes() {
    let state = state();
    let err = authorize(&state, "garbage").unwrap_err();
    assert_eq!(err.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn group_lifecycle_over_handlers() {
    let state = state();
    let (_, owner) = verified_login(&state, "owner").await;
    let (_, member) = verified_login(&state, "member").await;

    let (status, Json(group)) = groups::create(
        State(state.clone()),
        owner.clone(),
        Json(CreateGroupBody {
            name: "Runners".to_string(),
            description: "Daily 5k".to_string(),
            category: Some("body".to_string()),
            is_private: false,
            max_members: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let err = groups::messages(State(state.clone()), member.clone(), Path(group.id.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::FORBIDDEN);

    groups::join(State(state.clone()), member.clone(), Path(group.id.clone()))
        .await
        .unwrap();
    groups::send_message(
        State(state.clone()),
        member.clone(),
        Path(group.id.clone()),
        Json(MessageBody {
            content: "hello".to_string(),
        }),
    )
    .await
    .unwrap();
    let Json(messages) =
        groups::messages(State(state.clone()), owner.clone(), Path(group.id.clone()))
            .await
            .unwrap();
    assert_eq!(messages.len(), 1);

    let err = groups::leave(State(state.clone()), owner.clone(), Path(group.id.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);

    let err = groups::remove(State(state.clone()), member.clone(), Path(group.id.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::FORBIDDEN);

    let err = groups::detail(State(state.clone()), Path("missing".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cp_sync_updates_account_and_group_totals() {
    let state = state();
    let (_, owner) = verified_login(&state, "owner").await;
    let (_, Json(group)) = groups::create(
        State(state.clone()),
        owner.clone(),
        Json(CreateGroupBody {
            name: "Totals".to_string(),
            description: "CP".to_string(),
            category: None,
            is_private: false,
            max_members: None,
        }),
    )
    .await
    .unwrap();

    let payload = CpSyncPayload {
        daily_cp: 2,
        lifetime_cp: 6,
        cp_by_category: CpByCategory {
            mind: 2,
            body: 2,
            soul: 2,
        },
        days_active: 3,
        last_active_date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
    };
    users::sync_commitment_points(State(state.clone()), owner.clone(), Json(payload))
        .await
        .unwrap();

    let Json(stored) = users::commitment_points(State(state.clone()), owner.clone())
        .await
        .unwrap();
    assert_eq!(stored, payload);
    let Json(stats) = users::stats(State(state.clone()), owner.clone())
        .await
        .unwrap();
    assert_eq!(stats.average_cp, 2.0);
    let Json(summary) = groups::cp_summary(State(state.clone()), owner.clone(), Path(group.id.clone()))
        .await
        .unwrap();
    assert_eq!(summary.total_daily_cp, 2);
}

#[tokio::test]
async fn cp_sync_rolls_back_account_when_membership_update_fails() {
    let state = state();
    let (_, owner) = verified_login(&state, "owner").await;
    groups::create(
        State(state.clone()),
        owner.clone(),
        Json(CreateGroupBody {
            name: "Atomic".to_string(),
            description: "CP".to_string(),
            category: None,
            is_private: false,
            max_members: None,
        }),
    )
    .await
    .unwrap();
    state
        .with_db(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_member_cp BEFORE UPDATE ON group_members
                 BEGIN SELECT RAISE(ABORT, 'member cp locked'); END;",
            )
            .unwrap();
            Ok(())
        })
        .unwrap();

    let payload = CpSyncPayload {
        daily_cp: 4,
        lifetime_cp: 9,
        cp_by_category: CpByCategory {
            mind: 3,
            body: 3,
            soul: 3,
        },
        days_active: 2,
        last_active_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
    };
    let err = users::sync_commitment_points(State(state.clone()), owner.clone(), Json(payload))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

    let Json(stored) = users::commitment_points(State(state.clone()), owner.clone())
        .await
        .unwrap();
    assert_eq!(stored.daily_cp, 0);
    assert_eq!(stored.lifetime_cp, 0);
}

#[tokio::test]
async fn revoked_tokens_persist_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let blacklist = dir.path().join("revoked.txt");
    let db_path = dir.path().join("server.db");
    let vars = [
        ("JWT_SECRET", "persist-secret".to_string()),
        ("TOKEN_BLACKLIST_PATH", blacklist.display().to_string()),
    ];
    let config = mybestlife_server::ServerConfig::from_lookup(|name| {
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.clone())
    })
    .unwrap();

    let conn = mybestlife_core::db::open_db(&db_path).unwrap();
    let first = AppState::from_config(conn, &config).unwrap();
    first.security.blacklist.revoke("old-token");
    drop(first);

    let conn = mybestlife_core::db::open_db(&db_path).unwrap();
    let second = AppState::from_config(conn, &config).unwrap();
    assert!(second.security.blacklist.is_revoked("old-token"));
}
