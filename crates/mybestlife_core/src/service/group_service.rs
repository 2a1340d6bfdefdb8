//! Group membership, content and admin use-cases.
//!
//! # Responsibility
//! - Enforce membership and admin rules before repository writes.
//! - Validate and normalize group content input.
//!
//! # Invariants
//! - Only members read messages, tasks and CP; stories are public.
//! - The creator cannot leave; admins cannot demote or remove themselves.
//! - Join never exceeds `max_members`.

use crate::auth::sanitize_text;
use crate::model::category::Category;
use crate::model::group::{
    Group, GroupCategory, GroupCpSummary, GroupMember, GroupMessage, GroupStory, GroupSummary,
    GroupTask, MemberDetail, MemberRole, MyGroup, TaskPriority, DEFAULT_MAX_MEMBERS,
};
use crate::repo::{GroupRepository, NewGroup, NewGroupStory, NewGroupTask, RepoError};
use chrono::NaiveDate;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum GroupServiceError {
    Validation(String),
    NotFound(&'static str),
    Forbidden(&'static str),
    Repo(RepoError),
}

impl Display for GroupServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Forbidden(message) => write!(f, "{message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GroupServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GroupServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub type GroupResult<T> = Result<T, GroupServiceError>;

/// Raw create-group input; text fields are sanitized by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateGroupInput {
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub is_private: bool,
    pub max_members: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateStoryInput {
    pub title: String,
    pub content: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTaskInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub due_date: Option<String>,
    pub assignee_id: Option<String>,
}

pub struct GroupService<R: GroupRepository> {
    repo: R,
}

impl<R: GroupRepository> GroupService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn list_public(&self) -> GroupResult<Vec<GroupSummary>> {
        Ok(self.repo.list_public_groups()?)
    }

    pub fn list_mine(&self, user_id: &str) -> GroupResult<Vec<MyGroup>> {
        Ok(self.repo.list_user_groups(user_id)?)
    }

    pub fn get(&self, group_id: &str) -> GroupResult<GroupSummary> {
        self.repo
            .get_group(group_id)?
            .ok_or(GroupServiceError::NotFound("Group"))
    }

    /// Creates a group with the caller as its admin.
    pub fn create(&self, user_id: &str, input: &CreateGroupInput, now_ms: i64) -> GroupResult<Group> {
        let name = sanitize_text(&input.name);
        let description = sanitize_text(&input.description);
        if name.is_empty() || description.is_empty() {
            return Err(GroupServiceError::Validation(
                "Name and description are required".to_string(),
            ));
        }
        let category = match input.category.as_deref().map(str::trim) {
            None | Some("") => GroupCategory::Mixed,
            Some(value) => GroupCategory::parse(value).ok_or_else(|| {
                GroupServiceError::Validation(format!("Invalid group category `{value}`"))
            })?,
        };
        let max_members = input.max_members.unwrap_or(DEFAULT_MAX_MEMBERS);
        if max_members == 0 {
            return Err(GroupServiceError::Validation(
                "maxMembers must be at least 1".to_string(),
            ));
        }

        let group = self.repo.create_group(
            &NewGroup {
                name,
                description,
                category,
                is_private: input.is_private,
                max_members,
                created_by: user_id.to_string(),
            },
            now_ms,
        )?;
        info!(
            "event=group_create module=group status=ok category={}",
            group.category.as_str()
        );
        Ok(group)
    }

    pub fn join(&self, group_id: &str, user_id: &str, now_ms: i64) -> GroupResult<()> {
        let group = self.get(group_id)?;
        if self.repo.get_member(group_id, user_id)?.is_some() {
            return Err(GroupServiceError::Validation(
                "Already a member of this group".to_string(),
            ));
        }
        if self.repo.member_count(group_id)? >= group.group.max_members {
            return Err(GroupServiceError::Validation("Group is full".to_string()));
        }
        self.repo
            .add_member(group_id, user_id, MemberRole::Member, now_ms)?;
        Ok(())
    }

    pub fn leave(&self, group_id: &str, user_id: &str) -> GroupResult<()> {
        if self.repo.get_member(group_id, user_id)?.is_none() {
            return Err(GroupServiceError::Validation(
                "Not a member of this group".to_string(),
            ));
        }
        let group = self.get(group_id)?;
        if group.group.created_by == user_id {
            return Err(GroupServiceError::Validation(
                "Group creator cannot leave. Delete the group instead.".to_string(),
            ));
        }
        self.repo.remove_member(group_id, user_id)?;
        Ok(())
    }

    pub fn delete(&self, group_id: &str, user_id: &str) -> GroupResult<()> {
        self.require_admin(group_id, user_id)?;
        self.repo.delete_group(group_id)?;
        info!("event=group_delete module=group status=ok");
        Ok(())
    }

    pub fn stories(&self, group_id: &str) -> GroupResult<Vec<GroupStory>> {
        Ok(self.repo.list_stories(group_id)?)
    }

    pub fn create_story(
        &self,
        group_id: &str,
        user_id: &str,
        input: &CreateStoryInput,
        now_ms: i64,
    ) -> GroupResult<GroupStory> {
        self.require_member(group_id, user_id, "Must be a group member to post stories")?;
        let title = sanitize_text(&input.title);
        let content = sanitize_text(&input.content);
        let category = Category::parse(&input.category);
        let (false, false, Some(category)) = (title.is_empty(), content.is_empty(), category)
        else {
            return Err(GroupServiceError::Validation(
                "Title, content, and category are required".to_string(),
            ));
        };

        Ok(self.repo.create_story(
            &NewGroupStory {
                group_id: group_id.to_string(),
                user_id: user_id.to_string(),
                title,
                content,
                category,
            },
            now_ms,
        )?)
    }

    pub fn messages(&self, group_id: &str, user_id: &str) -> GroupResult<Vec<GroupMessage>> {
        self.require_member(group_id, user_id, "Must be a group member to view messages")?;
        Ok(self.repo.list_messages(group_id)?)
    }

    pub fn send_message(
        &self,
        group_id: &str,
        user_id: &str,
        content: &str,
        now_ms: i64,
    ) -> GroupResult<GroupMessage> {
        let content = sanitize_text(content);
        if content.is_empty() {
            return Err(GroupServiceError::Validation(
                "Message content is required".to_string(),
            ));
        }
        self.require_member(group_id, user_id, "Must be a group member to send messages")?;
        Ok(self
            .repo
            .create_message(group_id, user_id, &content, now_ms)?)
    }

    pub fn tasks(&self, group_id: &str, user_id: &str) -> GroupResult<Vec<GroupTask>> {
        self.require_member(group_id, user_id, "Must be a group member to view tasks")?;
        Ok(self.repo.list_tasks(group_id)?)
    }

    pub fn create_task(
        &self,
        group_id: &str,
        user_id: &str,
        input: &CreateTaskInput,
        now_ms: i64,
    ) -> GroupResult<GroupTask> {
        let title = sanitize_text(&input.title);
        let description = sanitize_text(&input.description);
        let category = Category::parse(&input.category);
        let (false, false, Some(category)) = (title.is_empty(), description.is_empty(), category)
        else {
            return Err(GroupServiceError::Validation(
                "Title, description, and category are required".to_string(),
            ));
        };
        let due_date = parse_due_date(input.due_date.as_deref())?;
        self.require_member(group_id, user_id, "Must be a group member to create tasks")?;

        Ok(self.repo.create_task(
            &NewGroupTask {
                group_id: group_id.to_string(),
                title,
                description,
                category,
                priority: TaskPriority::default(),
                due_date,
                created_by: user_id.to_string(),
                assigned_to: input
                    .assignee_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string),
            },
            now_ms,
        )?)
    }

    pub fn cp_summary(&self, group_id: &str, user_id: &str) -> GroupResult<GroupCpSummary> {
        self.require_member(group_id, user_id, "Must be a group member to view CP")?;
        Ok(self.repo.cp_summary(group_id)?)
    }

    /// Copies a user's current daily CP into every membership row.
    pub fn mirror_daily_cp(&self, user_id: &str, daily_cp: u64) -> GroupResult<usize> {
        Ok(self.repo.set_member_daily_cp(user_id, daily_cp)?)
    }

    pub fn members(&self, group_id: &str, admin_id: &str) -> GroupResult<Vec<MemberDetail>> {
        self.require_admin(group_id, admin_id)?;
        Ok(self.repo.list_members(group_id)?)
    }

    pub fn update_role(
        &self,
        group_id: &str,
        admin_id: &str,
        target_user_id: &str,
        role: &str,
    ) -> GroupResult<GroupMember> {
        let role = MemberRole::parse(role).ok_or_else(|| {
            GroupServiceError::Validation("Invalid role. Must be admin or member".to_string())
        })?;
        self.require_admin(group_id, admin_id)?;
        if target_user_id == admin_id {
            return Err(GroupServiceError::Validation(
                "Cannot change your own role".to_string(),
            ));
        }
        match self.repo.update_member_role(group_id, target_user_id, role) {
            Ok(member) => Ok(member),
            Err(RepoError::NotFound(_)) => Err(GroupServiceError::NotFound("Member")),
            Err(err) => Err(err.into()),
        }
    }

    pub fn remove_member(
        &self,
        group_id: &str,
        admin_id: &str,
        target_user_id: &str,
    ) -> GroupResult<()> {
        self.require_admin(group_id, admin_id)?;
        if target_user_id == admin_id {
            return Err(GroupServiceError::Validation(
                "Cannot remove yourself from the group".to_string(),
            ));
        }
        match self.repo.remove_member(group_id, target_user_id) {
            Ok(()) => Ok(()),
            Err(RepoError::NotFound(_)) => Err(GroupServiceError::NotFound("Member")),
            Err(err) => Err(err.into()),
        }
    }

    fn require_member(
        &self,
        group_id: &str,
        user_id: &str,
        message: &'static str,
    ) -> GroupResult<GroupMember> {
        self.repo
            .get_member(group_id, user_id)?
            .ok_or(GroupServiceError::Forbidden(message))
    }

    fn require_admin(&self, group_id: &str, user_id: &str) -> GroupResult<GroupMember> {
        match self.repo.get_member(group_id, user_id)? {
            Some(member) if member.role == MemberRole::Admin => Ok(member),
            _ => Err(GroupServiceError::Forbidden("Admin access required")),
        }
    }
}

fn parse_due_date(value: Option<&str>) -> GroupResult<Option<NaiveDate>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => crate::clock::parse_iso_date(raw)
            .map(Some)
            .ok_or_else(|| GroupServiceError::Validation(format!("Invalid due date `{raw}`"))),
    }
}
