//! Group, membership and group-content records.
//!
//! # Invariants
//! - Every group has at least one admin: its creator.
//! - `GroupMessage::content` is trimmed and non-empty.

use crate::model::category::Category;
use crate::model::user::UserId;
use chrono::NaiveDate;
use serde::Serialize;

/// Stable group identifier (UUID v4 text).
pub type GroupId = String;

/// Default member cap for new groups.
pub const DEFAULT_MAX_MEMBERS: u32 = 50;

/// Focus area of a group; `Mixed` spans all categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupCategory {
    Mind,
    Body,
    Soul,
    Mixed,
}

impl GroupCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mind => "mind",
            Self::Body => "body",
            Self::Soul => "soul",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mixed" => Some(Self::Mixed),
            other => Category::parse(other).map(Self::from),
        }
    }
}

impl From<Category> for GroupCategory {
    fn from(value: Category) -> Self {
        match value {
            Category::Mind => Self::Mind,
            Category::Body => Self::Body,
            Category::Soul => Self::Soul,
        }
    }
}

/// Membership role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

/// Group task priority; new tasks default to `Medium`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Persisted group row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub category: GroupCategory,
    pub is_private: bool,
    pub max_members: u32,
    pub created_by: UserId,
    pub created_at: i64,
}

/// Group with member count and creator display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    #[serde(flatten)]
    pub group: Group,
    pub member_count: u32,
    pub creator_name: Option<String>,
}

/// Group as listed for one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyGroup {
    #[serde(flatten)]
    pub group: Group,
    pub role: MemberRole,
    pub joined_at: i64,
    pub member_count: u32,
}

/// Membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub joined_at: i64,
    #[serde(rename = "groupCP")]
    pub group_cp: u64,
    #[serde(rename = "dailyCP")]
    pub daily_cp: u64,
    #[serde(rename = "weeklyCP")]
    pub weekly_cp: u64,
    #[serde(rename = "monthlyCP")]
    pub monthly_cp: u64,
    pub is_active: bool,
}

/// Membership joined with account display fields (admin view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetail {
    #[serde(flatten)]
    pub member: GroupMember,
    pub name: String,
    pub username: String,
    pub profile_pic: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTask {
    pub id: String,
    pub group_id: GroupId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub created_by: UserId,
    pub assigned_to: Option<UserId>,
    pub assignee_name: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStory {
    pub id: String,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub author_name: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    pub id: String,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub content: String,
    pub sender_name: Option<String>,
    pub created_at: i64,
}

/// Summed CP over a group's active members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCpSummary {
    #[serde(rename = "totalGroupCP")]
    pub total_group_cp: u64,
    #[serde(rename = "totalDailyCP")]
    pub total_daily_cp: u64,
    #[serde(rename = "totalWeeklyCP")]
    pub total_weekly_cp: u64,
    #[serde(rename = "totalMonthlyCP")]
    pub total_monthly_cp: u64,
    pub active_members: u32,
}

#[cfg(test)]
mod tests {
    use super::{GroupCategory, MemberRole, TaskPriority};

    #[test]
    fn group_category_accepts_mixed_and_cp_categories() {
        assert_eq!(GroupCategory::parse("Mixed"), Some(GroupCategory::Mixed));
        assert_eq!(GroupCategory::parse("body"), Some(GroupCategory::Body));
        assert_eq!(GroupCategory::parse("general"), None);
    }

    #[test]
    fn role_and_priority_labels_are_strict() {
        assert_eq!(MemberRole::parse("admin"), Some(MemberRole::Admin));
        assert_eq!(MemberRole::parse("owner"), None);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
        assert_eq!(TaskPriority::parse("high"), Some(TaskPriority::High));
    }
}
