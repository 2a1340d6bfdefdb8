//! `/api/groups` handlers.
//!
//! Listing, detail and stories are public; everything else needs a bearer token.

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use mybestlife_core::model::group::{
    Group, GroupCpSummary, GroupMember, GroupMessage, GroupStory, GroupSummary, GroupTask,
    MemberDetail, MyGroup,
};
use mybestlife_core::repo::SqliteGroupRepository;
use mybestlife_core::service::group_service::{
    CreateGroupInput, CreateStoryInput, CreateTaskInput, GroupResult, GroupService,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub max_members: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStoryBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default, alias = "assignedTo")]
    pub assignee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    #[serde(default)]
    pub role: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_public).post(create))
        .route("/my", get(list_mine))
        .route("/{id}", get(detail).delete(remove))
        .route("/{id}/join", post(join))
        .route("/{id}/leave", post(leave))
        .route("/{id}/stories", get(stories).post(create_story))
        .route("/{id}/messages", get(messages).post(send_message))
        .route("/{id}/tasks", get(tasks).post(create_task))
        .route("/{id}/cp", get(cp_summary))
        .route("/{id}/members", get(members))
        .route("/{id}/members/{user_id}/role", put(update_role))
        .route("/{id}/members/{user_id}", delete(remove_member))
}

fn with_groups<T>(
    state: &AppState,
    f: impl FnOnce(&GroupService<SqliteGroupRepository<'_>>) -> GroupResult<T>,
) -> Result<T, ApiError> {
    state.with_db(|conn: &Connection| Ok(f(&GroupService::new(SqliteGroupRepository::new(conn)))?))
}

pub async fn list_public(State(state): State<AppState>) -> Result<Json<Vec<GroupSummary>>, ApiError> {
    Ok(Json(with_groups(&state, |groups| groups.list_public())?))
}

pub async fn list_mine(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<MyGroup>>, ApiError> {
    Ok(Json(with_groups(&state, |groups| groups.list_mine(&user.user_id))?))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GroupSummary>, ApiError> {
    Ok(Json(with_groups(&state, |groups| groups.get(&id))?))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateGroupBody>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let input = CreateGroupInput {
        name: body.name,
        description: body.description,
        category: body.category,
        is_private: body.is_private,
        max_members: body.max_members,
    };
    let now_ms = state.now_ms();
    let group = with_groups(&state, |groups| groups.create(&user.user_id, &input, now_ms))?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn join(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let now_ms = state.now_ms();
    with_groups(&state, |groups| groups.join(&id, &user.user_id, now_ms))?;
    Ok(Json(json!({ "message": "Successfully joined group" })))
}

pub async fn leave(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    with_groups(&state, |groups| groups.leave(&id, &user.user_id))?;
    Ok(Json(json!({ "message": "Successfully left group" })))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    with_groups(&state, |groups| groups.delete(&id, &user.user_id))?;
    Ok(Json(json!({ "message": "Group deleted successfully" })))
}

pub async fn stories(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<GroupStory>>, ApiError> {
    Ok(Json(with_groups(&state, |groups| groups.stories(&id))?))
}

pub async fn create_story(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<CreateStoryBody>,
) -> Result<(StatusCode, Json<GroupStory>), ApiError> {
    let input = CreateStoryInput {
        title: body.title,
        content: body.content,
        category: body.category,
    };
    let now_ms = state.now_ms();
    let story = with_groups(&state, |groups| {
        groups.create_story(&id, &user.user_id, &input, now_ms)
    })?;
    Ok((StatusCode::CREATED, Json(story)))
}

pub async fn messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<GroupMessage>>, ApiError> {
    Ok(Json(with_groups(&state, |groups| {
        groups.messages(&id, &user.user_id)
    })?))
}

pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<MessageBody>,
) -> Result<(StatusCode, Json<GroupMessage>), ApiError> {
    let now_ms = state.now_ms();
    let message = with_groups(&state, |groups| {
        groups.send_message(&id, &user.user_id, &body.content, now_ms)
    })?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<GroupTask>>, ApiError> {
    Ok(Json(with_groups(&state, |groups| groups.tasks(&id, &user.user_id))?))
}

pub async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<CreateTaskBody>,
) -> Result<(StatusCode, Json<GroupTask>), ApiError> {
    let input = CreateTaskInput {
        title: body.title,
        description: body.description,
        category: body.category,
        due_date: body.due_date,
        assignee_id: body.assignee_id,
    };
    let now_ms = state.now_ms();
    let task = with_groups(&state, |groups| {
        groups.create_task(&id, &user.user_id, &input, now_ms)
    })?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn cp_summary(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<GroupCpSummary>, ApiError> {
    Ok(Json(with_groups(&state, |groups| {
        groups.cp_summary(&id, &user.user_id)
    })?))
}

pub async fn members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<MemberDetail>>, ApiError> {
    Ok(Json(with_groups(&state, |groups| groups.members(&id, &user.user_id))?))
}

pub async fn update_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, target)): Path<(String, String)>,
    Json(body): Json<RoleBody>,
) -> Result<Json<GroupMember>, ApiError> {
    Ok(Json(with_groups(&state, |groups| {
        groups.update_role(&id, &user.user_id, &target, &body.role)
    })?))
}

pub async fn remove_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, target)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    with_groups(&state, |groups| {
        groups.remove_member(&id, &user.user_id, &target)
    })?;
    Ok(Json(json!({ "message": "Member removed successfully" })))
}
