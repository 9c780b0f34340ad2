use crate::schema::{comments, posts, users};
use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PoolError};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde::Serialize;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Clone, Copy)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        configure_connection(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn establish_pool(database_url: &str, max_size: u32) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
}

pub fn configure_connection(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute("PRAGMA busy_timeout = 2000;")?;
    conn.batch_execute("PRAGMA journal_mode = WAL;")?;
    conn.batch_execute("PRAGMA synchronous = NORMAL;")?;
    conn.batch_execute("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

pub fn run_migrations(conn: &mut SqliteConnection) -> anyhow::Result<usize> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;
    Ok(applied.len())
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

#[derive(Queryable, Selectable, Debug, Clone, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub display_name: Option<String>,
    pub is_bot: bool,
    pub created_at: i64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub display_name: Option<String>,
    pub is_bot: bool,
    pub created_at: i64,
}

#[derive(Queryable, Selectable, Debug, Clone, Serialize)]
#[diesel(table_name = posts)]
pub struct Post {
    pub id: i32,
    pub user_id: i32,
    pub content: String,
    pub game_id: Option<String>,
    pub community_id: Option<i32>,
    pub likes_count: i32,
    pub comments_count: i32,
    pub retweets_count: i32,
    pub shares_count: i32,
    pub is_public: bool,
    pub is_deleted: bool,
    pub deleted_reason: Option<String>,
    pub created_at: i64,
    pub edited_at: Option<i64>,
}

impl Post {
    /// Likes, comments, retweets and shares together.
    pub fn total_engagement(&self) -> i32 {
        self.likes_count + self.comments_count + self.retweets_count + self.shares_count
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub user_id: i32,
    pub content: String,
    pub game_id: Option<String>,
    pub community_id: Option<i32>,
    pub is_public: bool,
    pub created_at: i64,
}

impl NewPost {
    pub fn public(user_id: i32, content: impl Into<String>) -> Self {
        Self {
            user_id,
            content: content.into(),
            game_id: None,
            community_id: None,
            is_public: true,
            created_at: now(),
        }
    }
}

#[derive(Queryable, Selectable, Debug, Clone, Serialize)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub parent_comment_id: Option<i32>,
    pub user_id: i32,
    pub content: String,
    pub likes_count: i32,
    pub is_deleted: bool,
    pub created_at: i64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub post_id: i32,
    pub parent_comment_id: Option<i32>,
    pub user_id: i32,
    pub content: String,
    pub created_at: i64,
}

pub fn get_user(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Option<User>> {
    users::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn insert_user(conn: &mut SqliteConnection, new_user: &NewUser) -> QueryResult<User> {
    diesel::insert_into(users::table)
        .values(new_user)
        .returning(User::as_returning())
        .get_result(conn)
}

/// Inserts the user unless the username is taken; either way returns the stored row.
pub fn ensure_user(conn: &mut SqliteConnection, new_user: &NewUser) -> QueryResult<User> {
    diesel::insert_or_ignore_into(users::table)
        .values(new_user)
        .execute(conn)?;
    users::table
        .filter(users::username.eq(&new_user.username))
        .select(User::as_select())
        .first(conn)
}

pub fn get_post(conn: &mut SqliteConnection, post_id: i32) -> QueryResult<Option<Post>> {
    posts::table
        .find(post_id)
        .select(Post::as_select())
        .first(conn)
        .optional()
}

/// Returns the post only if it is visible: public and not soft-deleted.
pub fn get_visible_post(conn: &mut SqliteConnection, post_id: i32) -> QueryResult<Option<Post>> {
    posts::table
        .find(post_id)
        .filter(posts::is_public.eq(true))
        .filter(posts::is_deleted.eq(false))
        .select(Post::as_select())
        .first(conn)
        .optional()
}

pub fn insert_post(conn: &mut SqliteConnection, new_post: &NewPost) -> QueryResult<Post> {
    diesel::insert_into(posts::table)
        .values(new_post)
        .returning(Post::as_returning())
        .get_result(conn)
}

pub fn get_post_author(conn: &mut SqliteConnection, post: &Post) -> QueryResult<Option<String>> {
    users::table
        .find(post.user_id)
        .select(users::username)
        .first(conn)
        .optional()
}

pub fn recent_post_texts(
    conn: &mut SqliteConnection,
    author_id: i32,
    limit: i64,
) -> QueryResult<Vec<String>> {
    posts::table
        .filter(posts::user_id.eq(author_id))
        .filter(posts::is_deleted.eq(false))
        .order(posts::created_at.desc())
        .limit(limit)
        .select(posts::content)
        .load(conn)
}

pub fn comment_texts_for_post(
    conn: &mut SqliteConnection,
    post_id: i32,
    limit: i64,
) -> QueryResult<Vec<String>> {
    comments::table
        .filter(comments::post_id.eq(post_id))
        .filter(comments::is_deleted.eq(false))
        .order(comments::created_at.asc())
        .limit(limit)
        .select(comments::content)
        .load(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_post, seed_user, test_pool};

    #[test]
    fn test_migrations_are_idempotent() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        assert_eq!(run_migrations(&mut conn).unwrap(), 0);
    }

    #[test]
    fn test_ensure_user_does_not_duplicate() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        let new_user = NewUser {
            username: "Carlbot".into(),
            display_name: None,
            is_bot: true,
            created_at: now(),
        };
        let first = ensure_user(&mut conn, &new_user).unwrap();
        let second = ensure_user(&mut conn, &new_user).unwrap();
        assert_eq!(first.id, second.id);

        let count: i64 = users::table.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_visible_post_hides_deleted() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        let author = seed_user(&mut conn, "alice");
        let post = seed_post(&mut conn, author.id, "gg everyone");

        assert!(get_visible_post(&mut conn, post.id).unwrap().is_some());

        diesel::update(posts::table.find(post.id))
            .set((
                posts::is_deleted.eq(true),
                posts::deleted_reason.eq(Some("spam")),
            ))
            .execute(&mut conn)
            .unwrap();

        assert!(get_visible_post(&mut conn, post.id).unwrap().is_none());
        assert!(get_post(&mut conn, post.id).unwrap().is_some());
    }
}
