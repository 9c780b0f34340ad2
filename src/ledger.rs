use crate::db::Comment;
use crate::schema::{bot_activity_log, comments};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    DecisionLike,
    DecisionComment,
    DecisionRetweet,
    Like,
    Comment,
    Retweet,
    CreatePost,
    AutoInteract,
    SchedulerRun,
    ModerationBan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TargetType {
    Post,
    Comment,
    User,
}

#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub bot_user_id: i32,
    pub action_type: ActionType,
    pub details: String,
    pub target: Option<(TargetType, i32)>,
    pub success: bool,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl ActivityEntry {
    pub fn new(bot_user_id: i32, action_type: ActionType, details: impl Into<String>) -> Self {
        Self {
            bot_user_id,
            action_type,
            details: details.into(),
            target: None,
            success: true,
            error_message: None,
            metadata: None,
        }
    }

    pub fn target(mut self, kind: TargetType, id: i32) -> Self {
        self.target = Some((kind, id));
        self
    }

    pub fn failed(mut self, error: impl ToString) -> Self {
        self.success = false;
        self.error_message = Some(error.to_string());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = bot_activity_log)]
struct NewActivityRow<'a> {
    bot_user_id: i32,
    action_type: &'a str,
    details: &'a str,
    target_type: Option<&'a str>,
    target_id: Option<i32>,
    success: bool,
    error_message: Option<&'a str>,
    metadata: Option<String>,
    created_at: i64,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = bot_activity_log)]
pub struct ActivityRow {
    pub id: i32,
    pub bot_user_id: i32,
    pub action_type: String,
    pub details: String,
    pub target_type: Option<String>,
    pub target_id: Option<i32>,
    pub success: bool,
    pub error_message: Option<String>,
    pub metadata: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedActivity {
    pub id: i32,
    pub bot_user_id: i32,
    pub action_type: String,
    pub details: String,
    pub target_type: Option<String>,
    pub target_id: Option<i32>,
    pub success: bool,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: i64,
}

impl From<ActivityRow> for LoggedActivity {
    fn from(row: ActivityRow) -> Self {
        let metadata = row.metadata.as_deref().map(|raw| {
            serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
        });
        Self {
            id: row.id,
            bot_user_id: row.bot_user_id,
            action_type: row.action_type,
            details: row.details,
            target_type: row.target_type,
            target_id: row.target_id,
            success: row.success,
            error_message: row.error_message,
            metadata,
            created_at: row.created_at,
        }
    }
}

fn try_record(conn: &mut SqliteConnection, entry: &ActivityEntry) -> QueryResult<usize> {
    let metadata = entry
        .metadata
        .as_ref()
        .and_then(|m| serde_json::to_string(m).ok());

    diesel::insert_into(bot_activity_log::table)
        .values(&NewActivityRow {
            bot_user_id: entry.bot_user_id,
            action_type: entry.action_type.as_ref(),
            details: &entry.details,
            target_type: entry.target.as_ref().map(|(kind, _)| kind.as_ref()),
            target_id: entry.target.map(|(_, id)| id),
            success: entry.success,
            error_message: entry.error_message.as_deref(),
            metadata,
            created_at: crate::db::now(),
        })
        .execute(conn)
}

/// Appends an entry to the activity log. Failures are logged and swallowed so
/// that an action which already happened is never reported as failed.
pub fn record(conn: &mut SqliteConnection, entry: ActivityEntry) {
    if let Err(e) = try_record(conn, &entry) {
        tracing::warn!(
            error = %e,
            action = %entry.action_type,
            details = %entry.details,
            "failed to write activity log entry"
        );
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub action_type: Option<ActionType>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

fn filtered(bot_id: i32, filter: &ActivityFilter) -> bot_activity_log::BoxedQuery<'static, Sqlite> {
    let mut query = bot_activity_log::table
        .filter(bot_activity_log::bot_user_id.eq(bot_id))
        .into_boxed();

    if let Some(action) = filter.action_type {
        query = query.filter(bot_activity_log::action_type.eq(action.to_string()));
    }
    if let Some(start) = filter.start {
        query = query.filter(bot_activity_log::created_at.ge(start));
    }
    if let Some(end) = filter.end {
        query = query.filter(bot_activity_log::created_at.le(end));
    }
    query
}

/// Newest entries first, together with the total number of matching rows.
pub fn recent(
    conn: &mut SqliteConnection,
    bot_id: i32,
    filter: &ActivityFilter,
) -> QueryResult<(Vec<LoggedActivity>, i64)> {
    let total: i64 = filtered(bot_id, filter).count().get_result(conn)?;

    let rows: Vec<ActivityRow> = filtered(bot_id, filter)
        .order((
            bot_activity_log::created_at.desc(),
            bot_activity_log::id.desc(),
        ))
        .limit(filter.limit)
        .offset(filter.offset)
        .select(ActivityRow::as_select())
        .load(conn)?;

    Ok((rows.into_iter().map(LoggedActivity::from).collect(), total))
}

/// The bot's own comments that people liked, most liked first.
pub fn top_comments(conn: &mut SqliteConnection, bot_id: i32, k: i64) -> QueryResult<Vec<Comment>> {
    comments::table
        .filter(comments::user_id.eq(bot_id))
        .filter(comments::is_deleted.eq(false))
        .filter(comments::likes_count.gt(0))
        .order((comments::likes_count.desc(), comments::created_at.desc()))
        .limit(k)
        .select(Comment::as_select())
        .load(conn)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionStats {
    pub success: i64,
    pub errors: i64,
}

pub fn stats(
    conn: &mut SqliteConnection,
    bot_id: i32,
    since: i64,
) -> QueryResult<BTreeMap<String, ActionStats>> {
    let rows: Vec<(String, bool, i64)> = bot_activity_log::table
        .filter(bot_activity_log::bot_user_id.eq(bot_id))
        .filter(bot_activity_log::created_at.ge(since))
        .group_by((bot_activity_log::action_type, bot_activity_log::success))
        .select((
            bot_activity_log::action_type,
            bot_activity_log::success,
            count_star(),
        ))
        .load(conn)?;

    let mut out: BTreeMap<String, ActionStats> = BTreeMap::new();
    for (action, success, count) in rows {
        let entry = out.entry(action).or_default();
        if success {
            entry.success += count;
        } else {
            entry.errors += count;
        }
    }
    Ok(out)
}

/// Successful actions per type since `since`.
pub fn interaction_counts(
    conn: &mut SqliteConnection,
    bot_id: i32,
    since: i64,
) -> QueryResult<BTreeMap<String, i64>> {
    Ok(stats(conn, bot_id, since)?
        .into_iter()
        .filter(|(_, s)| s.success > 0)
        .map(|(action, s)| (action, s.success))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::add_comment;
    use crate::testing::{seed_post, seed_user, test_pool};
    use diesel::connection::SimpleConnection;
    use std::str::FromStr;

    #[test]
    fn test_action_type_round_trips_as_snake_case() {
        assert_eq!(ActionType::DecisionLike.to_string(), "decision_like");
        assert_eq!(
            ActionType::from_str("moderation_ban").unwrap(),
            ActionType::ModerationBan
        );
        assert!(ActionType::from_str("dance").is_err());
    }

    #[test]
    fn test_record_and_filter() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        let bot = seed_user(&mut conn, "Carlbot");

        record(
            &mut conn,
            ActivityEntry::new(bot.id, ActionType::Like, "Post liked")
                .target(TargetType::Post, 3)
                .metadata(serde_json::json!({ "score": 4.5 })),
        );
        record(
            &mut conn,
            ActivityEntry::new(bot.id, ActionType::Comment, "comment failed").failed("model down"),
        );

        let all = ActivityFilter {
            limit: 10,
            ..Default::default()
        };
        let (entries, total) = recent(&mut conn, bot.id, &all).unwrap();
        assert_eq!(total, 2);
        assert_eq!(entries.len(), 2);

        let likes_only = ActivityFilter {
            action_type: Some(ActionType::Like),
            limit: 10,
            ..Default::default()
        };
        let (entries, total) = recent(&mut conn, bot.id, &likes_only).unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].target_type.as_deref(), Some("post"));
        assert_eq!(entries[0].target_id, Some(3));
        assert_eq!(entries[0].metadata.as_ref().unwrap()["score"], 4.5);
    }

    #[test]
    fn test_pagination_and_date_range() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        let bot = seed_user(&mut conn, "Carlbot");
        for i in 0..5 {
            record(
                &mut conn,
                ActivityEntry::new(bot.id, ActionType::Like, format!("like {i}")),
            );
        }

        let page = ActivityFilter {
            limit: 2,
            offset: 4,
            ..Default::default()
        };
        let (entries, total) = recent(&mut conn, bot.id, &page).unwrap();
        assert_eq!(total, 5);
        assert_eq!(entries.len(), 1);

        let future = ActivityFilter {
            start: Some(crate::db::now() + 3600),
            limit: 10,
            ..Default::default()
        };
        let (entries, total) = recent(&mut conn, bot.id, &future).unwrap();
        assert_eq!(total, 0);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_record_swallows_failures() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        conn.batch_execute("DROP TABLE bot_activity_log;").unwrap();

        record(
            &mut conn,
            ActivityEntry::new(1, ActionType::Like, "nobody will see this"),
        );
    }

    #[test]
    fn test_stats_split_success_and_errors() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        let bot = seed_user(&mut conn, "Carlbot");

        record(&mut conn, ActivityEntry::new(bot.id, ActionType::Like, "ok"));
        record(&mut conn, ActivityEntry::new(bot.id, ActionType::Like, "ok"));
        record(
            &mut conn,
            ActivityEntry::new(bot.id, ActionType::Like, "bad").failed("db locked"),
        );
        record(
            &mut conn,
            ActivityEntry::new(bot.id, ActionType::Retweet, "bad").failed("gone"),
        );

        let stats = stats(&mut conn, bot.id, 0).unwrap();
        assert_eq!(
            stats["like"],
            ActionStats {
                success: 2,
                errors: 1
            }
        );
        assert_eq!(stats["retweet"].errors, 1);

        let counts = interaction_counts(&mut conn, bot.id, 0).unwrap();
        assert_eq!(counts.get("like"), Some(&2));
        assert!(!counts.contains_key("retweet"));
    }

    #[test]
    fn test_top_comments_only_liked_best_first() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        let author = seed_user(&mut conn, "alice");
        let bot = seed_user(&mut conn, "Carlbot");
        let post = seed_post(&mut conn, author.id, "rate my loadout");

        let meh = add_comment(&mut conn, post.id, bot.id, "mid", None).unwrap();
        let good = add_comment(&mut conn, post.id, bot.id, "that smg slaps", None).unwrap();
        add_comment(&mut conn, post.id, bot.id, "ignored", None).unwrap();

        for (id, likes) in [(meh.id, 1), (good.id, 5)] {
            diesel::update(comments::table.find(id))
                .set(comments::likes_count.eq(likes))
                .execute(&mut conn)
                .unwrap();
        }

        let top = top_comments(&mut conn, bot.id, 3).unwrap();
        let texts: Vec<&str> = top.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["that smg slaps", "mid"]);
    }
}
