//! Group, membership and group-content repository.
//!
//! # Responsibility
//! - Persist groups with their creator's admin membership atomically.
//! - Serve list/detail reads joined with account display names.
//! - Aggregate member CP counters per group.
//!
//! # Invariants
//! - Deleting a group cascades to members, tasks, stories and messages.
//! - List orders are total: ties fall back to insertion order (`rowid`).

use crate::clock::format_iso_date;
use crate::model::category::Category;
use crate::model::group::{
    Group, GroupCategory, GroupCpSummary, GroupMember, GroupMessage, GroupStory, GroupSummary,
    GroupTask, MemberDetail, MemberRole, MyGroup, TaskPriority,
};
use crate::repo::{bool_to_int, int_to_bool, int_to_u64, text_to_date, u64_to_int, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const GROUP_COLUMNS: &str = "g.id, g.name, g.description, g.category, g.is_private, g.max_members,
    g.created_by, g.created_at";

const MEMBER_COLUMNS: &str = "gm.group_id, gm.user_id, gm.role, gm.joined_at, gm.group_cp,
    gm.daily_cp, gm.weekly_cp, gm.monthly_cp, gm.is_active";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub category: GroupCategory,
    pub is_private: bool,
    pub max_members: u32,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroupStory {
    pub group_id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroupTask {
    pub group_id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub created_by: String,
    pub assigned_to: Option<String>,
}

pub trait GroupRepository {
    fn list_public_groups(&self) -> RepoResult<Vec<GroupSummary>>;
    fn list_user_groups(&self, user_id: &str) -> RepoResult<Vec<MyGroup>>;
    fn get_group(&self, group_id: &str) -> RepoResult<Option<GroupSummary>>;
    /// Inserts the group and its creator as admin in one transaction.
    fn create_group(&self, group: &NewGroup, now_ms: i64) -> RepoResult<Group>;
    fn delete_group(&self, group_id: &str) -> RepoResult<()>;

    fn member_count(&self, group_id: &str) -> RepoResult<u32>;
    fn get_member(&self, group_id: &str, user_id: &str) -> RepoResult<Option<GroupMember>>;
    fn add_member(
        &self,
        group_id: &str,
        user_id: &str,
        role: MemberRole,
        now_ms: i64,
    ) -> RepoResult<()>;
    fn remove_member(&self, group_id: &str, user_id: &str) -> RepoResult<()>;
    fn update_member_role(
        &self,
        group_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> RepoResult<GroupMember>;
    fn list_members(&self, group_id: &str) -> RepoResult<Vec<MemberDetail>>;
    /// Mirrors a user's daily CP into all of their memberships; returns rows touched.
    fn set_member_daily_cp(&self, user_id: &str, daily_cp: u64) -> RepoResult<usize>;
    fn cp_summary(&self, group_id: &str) -> RepoResult<GroupCpSummary>;

    fn list_stories(&self, group_id: &str) -> RepoResult<Vec<GroupStory>>;
    fn create_story(&self, story: &NewGroupStory, now_ms: i64) -> RepoResult<GroupStory>;
    fn list_messages(&self, group_id: &str) -> RepoResult<Vec<GroupMessage>>;
    fn create_message(
        &self,
        group_id: &str,
        user_id: &str,
        content: &str,
        now_ms: i64,
    ) -> RepoResult<GroupMessage>;
    fn list_tasks(&self, group_id: &str) -> RepoResult<Vec<GroupTask>>;
    fn create_task(&self, task: &NewGroupTask, now_ms: i64) -> RepoResult<GroupTask>;
}

pub struct SqliteGroupRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGroupRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn get_story(&self, story_id: &str) -> RepoResult<GroupStory> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.group_id, s.user_id, s.title, s.content, s.category, s.created_at,
                    u.name AS author_name
             FROM group_stories s
             LEFT JOIN users u ON u.id = s.user_id
             WHERE s.id = ?1;",
        )?;
        let mut rows = stmt.query([story_id])?;
        match rows.next()? {
            Some(row) => parse_story_row(row),
            None => Err(RepoError::NotFound(format!("story {story_id}"))),
        }
    }

    fn get_message(&self, message_id: &str) -> RepoResult<GroupMessage> {
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.group_id, m.user_id, m.content, m.created_at,
                    u.name AS sender_name
             FROM group_messages m
             LEFT JOIN users u ON u.id = m.user_id
             WHERE m.id = ?1;",
        )?;
        let mut rows = stmt.query([message_id])?;
        match rows.next()? {
            Some(row) => parse_message_row(row),
            None => Err(RepoError::NotFound(format!("message {message_id}"))),
        }
    }

    fn get_task(&self, task_id: &str) -> RepoResult<GroupTask> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.group_id, t.title, t.description, t.category, t.priority,
                    t.due_date, t.created_by, t.assigned_to, t.created_at,
                    u.name AS assignee_name
             FROM group_tasks t
             LEFT JOIN users u ON u.id = t.assigned_to
             WHERE t.id = ?1;",
        )?;
        let mut rows = stmt.query([task_id])?;
        match rows.next()? {
            Some(row) => parse_task_row(row),
            None => Err(RepoError::NotFound(format!("task {task_id}"))),
        }
    }
}

impl GroupRepository for SqliteGroupRepository<'_> {
    fn list_public_groups(&self) -> RepoResult<Vec<GroupSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GROUP_COLUMNS},
                    (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id) AS member_count,
                    u.name AS creator_name
             FROM user_groups g
             LEFT JOIN users u ON u.id = g.created_by
             WHERE g.is_private = 0
             ORDER BY g.created_at DESC, g.rowid DESC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_summary_row(row)?);
        }
        Ok(groups)
    }

    fn list_user_groups(&self, user_id: &str) -> RepoResult<Vec<MyGroup>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GROUP_COLUMNS}, gm.role, gm.joined_at,
                    (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id) AS member_count
             FROM user_groups g
             INNER JOIN group_members gm ON gm.group_id = g.id
             WHERE gm.user_id = ?1
             ORDER BY g.created_at DESC, g.rowid DESC;"
        ))?;
        let mut rows = stmt.query([user_id])?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(MyGroup {
                group: parse_group_row(row)?,
                role: parse_role(&row.get::<_, String>("role")?)?,
                joined_at: row.get("joined_at")?,
                member_count: parse_count(row.get("member_count")?)?,
            });
        }
        Ok(groups)
    }

    fn get_group(&self, group_id: &str) -> RepoResult<Option<GroupSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GROUP_COLUMNS},
                    (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id) AS member_count,
                    u.name AS creator_name
             FROM user_groups g
             LEFT JOIN users u ON u.id = g.created_by
             WHERE g.id = ?1;"
        ))?;
        let mut rows = stmt.query([group_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_summary_row(row)?));
        }
        Ok(None)
    }

    fn create_group(&self, group: &NewGroup, now_ms: i64) -> RepoResult<Group> {
        let id = Uuid::new_v4().to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO user_groups (
                id, name, description, category, is_private, max_members, created_by,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
            params![
                id,
                group.name,
                group.description,
                group.category.as_str(),
                bool_to_int(group.is_private),
                group.max_members,
                group.created_by,
                now_ms,
            ],
        )?;
        tx.execute(
            "INSERT INTO group_members (group_id, user_id, role, joined_at)
             VALUES (?1, ?2, 'admin', ?3);",
            params![id, group.created_by, now_ms],
        )?;
        tx.commit()?;

        Ok(Group {
            id,
            name: group.name.clone(),
            description: group.description.clone(),
            category: group.category,
            is_private: group.is_private,
            max_members: group.max_members,
            created_by: group.created_by.clone(),
            created_at: now_ms,
        })
    }

    fn delete_group(&self, group_id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM user_groups WHERE id = ?1;", [group_id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("group {group_id}")));
        }
        Ok(())
    }

    fn member_count(&self, group_id: &str) -> RepoResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM group_members WHERE group_id = ?1;",
            [group_id],
            |row| row.get(0),
        )?;
        parse_count(count)
    }

    fn get_member(&self, group_id: &str, user_id: &str) -> RepoResult<Option<GroupMember>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS}
             FROM group_members gm
             WHERE gm.group_id = ?1 AND gm.user_id = ?2;"
        ))?;
        let mut rows = stmt.query([group_id, user_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }
        Ok(None)
    }

    fn add_member(
        &self,
        group_id: &str,
        user_id: &str,
        role: MemberRole,
        now_ms: i64,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO group_members (group_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![group_id, user_id, role.as_str(), now_ms],
        )?;
        Ok(())
    }

    fn remove_member(&self, group_id: &str, user_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2;",
            [group_id, user_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("member {user_id}")));
        }
        Ok(())
    }

    fn update_member_role(
        &self,
        group_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> RepoResult<GroupMember> {
        let changed = self.conn.execute(
            "UPDATE group_members SET role = ?3 WHERE group_id = ?1 AND user_id = ?2;",
            params![group_id, user_id, role.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("member {user_id}")));
        }
        self.get_member(group_id, user_id)?
            .ok_or_else(|| RepoError::NotFound(format!("member {user_id}")))
    }

    fn list_members(&self, group_id: &str) -> RepoResult<Vec<MemberDetail>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS}, u.name, u.username, u.profile_pic, u.email
             FROM group_members gm
             INNER JOIN users u ON u.id = gm.user_id
             WHERE gm.group_id = ?1
             ORDER BY gm.role ASC, gm.joined_at ASC, gm.rowid ASC;"
        ))?;
        let mut rows = stmt.query([group_id])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(MemberDetail {
                member: parse_member_row(row)?,
                name: row.get("name")?,
                username: row.get("username")?,
                profile_pic: row.get("profile_pic")?,
                email: row.get("email")?,
            });
        }
        Ok(members)
    }

    fn set_member_daily_cp(&self, user_id: &str, daily_cp: u64) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE group_members SET daily_cp = ?2 WHERE user_id = ?1;",
            params![user_id, u64_to_int(daily_cp)],
        )?;
        Ok(changed)
    }

    fn cp_summary(&self, group_id: &str) -> RepoResult<GroupCpSummary> {
        let summary = self
            .conn
            .query_row(
                "SELECT
                    COALESCE(SUM(group_cp), 0),
                    COALESCE(SUM(daily_cp), 0),
                    COALESCE(SUM(weekly_cp), 0),
                    COALESCE(SUM(monthly_cp), 0),
                    COUNT(*)
                 FROM group_members
                 WHERE group_id = ?1 AND is_active = 1;",
                [group_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((group_cp, daily_cp, weekly_cp, monthly_cp, active)) = summary else {
            return Ok(GroupCpSummary::default());
        };
        Ok(GroupCpSummary {
            total_group_cp: int_to_u64(group_cp, "group_members.group_cp")?,
            total_daily_cp: int_to_u64(daily_cp, "group_members.daily_cp")?,
            total_weekly_cp: int_to_u64(weekly_cp, "group_members.weekly_cp")?,
            total_monthly_cp: int_to_u64(monthly_cp, "group_members.monthly_cp")?,
            active_members: parse_count(active)?,
        })
    }

    fn list_stories(&self, group_id: &str) -> RepoResult<Vec<GroupStory>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.group_id, s.user_id, s.title, s.content, s.category, s.created_at,
                    u.name AS author_name
             FROM group_stories s
             LEFT JOIN users u ON u.id = s.user_id
             WHERE s.group_id = ?1
             ORDER BY s.created_at DESC, s.rowid DESC;",
        )?;
        let mut rows = stmt.query([group_id])?;
        let mut stories = Vec::new();
        while let Some(row) = rows.next()? {
            stories.push(parse_story_row(row)?);
        }
        Ok(stories)
    }

    fn create_story(&self, story: &NewGroupStory, now_ms: i64) -> RepoResult<GroupStory> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO group_stories (id, group_id, user_id, title, content, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id,
                story.group_id,
                story.user_id,
                story.title,
                story.content,
                story.category.as_str(),
                now_ms,
            ],
        )?;
        self.get_story(&id)
    }

    fn list_messages(&self, group_id: &str) -> RepoResult<Vec<GroupMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.group_id, m.user_id, m.content, m.created_at,
                    u.name AS sender_name
             FROM group_messages m
             LEFT JOIN users u ON u.id = m.user_id
             WHERE m.group_id = ?1
             ORDER BY m.created_at ASC, m.rowid ASC;",
        )?;
        let mut rows = stmt.query([group_id])?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            messages.push(parse_message_row(row)?);
        }
        Ok(messages)
    }

    fn create_message(
        &self,
        group_id: &str,
        user_id: &str,
        content: &str,
        now_ms: i64,
    ) -> RepoResult<GroupMessage> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO group_messages (id, group_id, user_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![id, group_id, user_id, content, now_ms],
        )?;
        self.get_message(&id)
    }

    fn list_tasks(&self, group_id: &str) -> RepoResult<Vec<GroupTask>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.group_id, t.title, t.description, t.category, t.priority,
                    t.due_date, t.created_by, t.assigned_to, t.created_at,
                    u.name AS assignee_name
             FROM group_tasks t
             LEFT JOIN users u ON u.id = t.assigned_to
             WHERE t.group_id = ?1
             ORDER BY t.due_date IS NULL ASC, t.due_date ASC, t.created_at DESC, t.rowid DESC;",
        )?;
        let mut rows = stmt.query([group_id])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn create_task(&self, task: &NewGroupTask, now_ms: i64) -> RepoResult<GroupTask> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO group_tasks (
                id, group_id, title, description, category, priority, due_date,
                created_by, assigned_to, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                id,
                task.group_id,
                task.title,
                task.description,
                task.category.as_str(),
                task.priority.as_str(),
                task.due_date.map(format_iso_date),
                task.created_by,
                task.assigned_to,
                now_ms,
            ],
        )?;
        self.get_task(&id)
    }
}

fn parse_group_row(row: &Row<'_>) -> RepoResult<Group> {
    let category: String = row.get("category")?;
    let max_members: i64 = row.get("max_members")?;
    Ok(Group {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        category: GroupCategory::parse(&category).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid category `{category}` in user_groups"))
        })?,
        is_private: int_to_bool(row.get("is_private")?, "user_groups.is_private")?,
        max_members: parse_count(max_members)?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_summary_row(row: &Row<'_>) -> RepoResult<GroupSummary> {
    Ok(GroupSummary {
        group: parse_group_row(row)?,
        member_count: parse_count(row.get("member_count")?)?,
        creator_name: row.get("creator_name")?,
    })
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<GroupMember> {
    Ok(GroupMember {
        group_id: row.get("group_id")?,
        user_id: row.get("user_id")?,
        role: parse_role(&row.get::<_, String>("role")?)?,
        joined_at: row.get("joined_at")?,
        group_cp: int_to_u64(row.get("group_cp")?, "group_members.group_cp")?,
        daily_cp: int_to_u64(row.get("daily_cp")?, "group_members.daily_cp")?,
        weekly_cp: int_to_u64(row.get("weekly_cp")?, "group_members.weekly_cp")?,
        monthly_cp: int_to_u64(row.get("monthly_cp")?, "group_members.monthly_cp")?,
        is_active: int_to_bool(row.get("is_active")?, "group_members.is_active")?,
    })
}

fn parse_story_row(row: &Row<'_>) -> RepoResult<GroupStory> {
    Ok(GroupStory {
        id: row.get("id")?,
        group_id: row.get("group_id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        category: parse_category(&row.get::<_, String>("category")?)?,
        author_name: row.get("author_name")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_message_row(row: &Row<'_>) -> RepoResult<GroupMessage> {
    Ok(GroupMessage {
        id: row.get("id")?,
        group_id: row.get("group_id")?,
        user_id: row.get("user_id")?,
        content: row.get("content")?,
        sender_name: row.get("sender_name")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<GroupTask> {
    let priority: String = row.get("priority")?;
    let due_date = match row.get::<_, Option<String>>("due_date")? {
        Some(value) => Some(text_to_date(&value, "group_tasks.due_date")?),
        None => None,
    };
    Ok(GroupTask {
        id: row.get("id")?,
        group_id: row.get("group_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category: parse_category(&row.get::<_, String>("category")?)?,
        priority: TaskPriority::parse(&priority).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid priority `{priority}` in group_tasks"))
        })?,
        due_date,
        created_by: row.get("created_by")?,
        assigned_to: row.get("assigned_to")?,
        assignee_name: row.get("assignee_name")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_role(value: &str) -> RepoResult<MemberRole> {
    MemberRole::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid role `{value}` in group_members")))
}

fn parse_category(value: &str) -> RepoResult<Category> {
    Category::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid category `{value}`")))
}

fn parse_count(value: i64) -> RepoResult<u32> {
    u32::try_from(value).map_err(|_| RepoError::InvalidData(format!("invalid count `{value}`")))
}
