use crate::db::{self, Comment, NewComment, Post};
use crate::schema::{comments, likes, posts, retweets};
use crate::settings::{settings, EngagementWeights};
use diesel::dsl::{not, sql};
use diesel::expression::SqlLiteral;
use diesel::prelude::*;
use diesel::sql_types::Double;
use diesel::sqlite::SqliteConnection;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionOutcome {
    Created,
    AlreadyExists,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = likes)]
struct NewLike {
    post_id: i32,
    user_id: i32,
    created_at: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = retweets)]
struct NewRetweet {
    post_id: i32,
    user_id: i32,
    created_at: i64,
}

/// Likes a post at most once per user. The join row and the counter move together.
pub fn like_post(
    conn: &mut SqliteConnection,
    post_id: i32,
    user_id: i32,
) -> QueryResult<InteractionOutcome> {
    conn.transaction(|conn| {
        let inserted = diesel::insert_or_ignore_into(likes::table)
            .values(&NewLike {
                post_id,
                user_id,
                created_at: db::now(),
            })
            .execute(conn)?;

        if inserted == 0 {
            return Ok(InteractionOutcome::AlreadyExists);
        }

        diesel::update(posts::table.find(post_id))
            .set(posts::likes_count.eq(posts::likes_count + 1))
            .execute(conn)?;
        Ok(InteractionOutcome::Created)
    })
}

pub fn retweet_post(
    conn: &mut SqliteConnection,
    post_id: i32,
    user_id: i32,
) -> QueryResult<InteractionOutcome> {
    conn.transaction(|conn| {
        let inserted = diesel::insert_or_ignore_into(retweets::table)
            .values(&NewRetweet {
                post_id,
                user_id,
                created_at: db::now(),
            })
            .execute(conn)?;

        if inserted == 0 {
            return Ok(InteractionOutcome::AlreadyExists);
        }

        diesel::update(posts::table.find(post_id))
            .set(posts::retweets_count.eq(posts::retweets_count + 1))
            .execute(conn)?;
        Ok(InteractionOutcome::Created)
    })
}

pub fn add_comment(
    conn: &mut SqliteConnection,
    post_id: i32,
    user_id: i32,
    content: &str,
    parent_comment_id: Option<i32>,
) -> QueryResult<Comment> {
    conn.transaction(|conn| {
        let comment = diesel::insert_into(comments::table)
            .values(&NewComment {
                post_id,
                parent_comment_id,
                user_id,
                content: content.to_string(),
                created_at: db::now(),
            })
            .returning(Comment::as_returning())
            .get_result(conn)?;

        diesel::update(posts::table.find(post_id))
            .set(posts::comments_count.eq(posts::comments_count + 1))
            .execute(conn)?;
        Ok(comment)
    })
}

pub fn engagement_score(post: &Post, weights: &EngagementWeights) -> f32 {
    post.likes_count as f32 * weights.like
        + post.comments_count as f32 * weights.comment
        + post.retweets_count as f32 * weights.retweet
}

#[derive(Debug, Default, Clone)]
pub struct BotInteractions {
    pub liked: HashSet<i32>,
    pub commented: HashSet<i32>,
    pub retweeted: HashSet<i32>,
}

impl BotInteractions {
    pub fn load(conn: &mut SqliteConnection, bot_id: i32, post_ids: &[i32]) -> QueryResult<Self> {
        if post_ids.is_empty() {
            return Ok(Self::default());
        }

        let liked: Vec<i32> = likes::table
            .filter(likes::user_id.eq(bot_id))
            .filter(likes::post_id.eq_any(post_ids))
            .select(likes::post_id)
            .load(conn)?;

        let commented: Vec<i32> = comments::table
            .filter(comments::user_id.eq(bot_id))
            .filter(comments::is_deleted.eq(false))
            .filter(comments::post_id.eq_any(post_ids))
            .select(comments::post_id)
            .distinct()
            .load(conn)?;

        let retweeted: Vec<i32> = retweets::table
            .filter(retweets::user_id.eq(bot_id))
            .filter(retweets::post_id.eq_any(post_ids))
            .select(retweets::post_id)
            .load(conn)?;

        Ok(Self {
            liked: liked.into_iter().collect(),
            commented: commented.into_iter().collect(),
            retweeted: retweeted.into_iter().collect(),
        })
    }

    pub fn fully_interacted(&self, post_id: i32) -> bool {
        self.liked.contains(&post_id)
            && self.commented.contains(&post_id)
            && self.retweeted.contains(&post_id)
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub post: Post,
    pub score: f32,
    pub liked: bool,
    pub commented: bool,
    pub retweeted: bool,
}

fn score_expr(weights: &EngagementWeights) -> SqlLiteral<Double> {
    let w = |v: f32| if v.is_finite() { f64::from(v) } else { 0.0 };
    sql::<Double>(&format!(
        "(posts.likes_count * {} + posts.comments_count * {} + posts.retweets_count * {})",
        w(weights.like),
        w(weights.comment),
        w(weights.retweet),
    ))
}

/// Trending posts the bot has not yet fully engaged with, best first.
///
/// The whole trending window is ranked in SQL so a popular older post is never
/// crowded out by a burst of fresh ones.
pub fn trending_candidates(
    conn: &mut SqliteConnection,
    bot_id: i32,
    limit: usize,
) -> QueryResult<Vec<Candidate>> {
    let s = settings();
    let since = db::now() - s.engagement.trending_window_hours * 3600;
    let weights = &s.engagement.weights;

    let liked = likes::table
        .filter(likes::user_id.eq(bot_id))
        .select(likes::post_id);
    let commented = comments::table
        .filter(comments::user_id.eq(bot_id))
        .filter(comments::is_deleted.eq(false))
        .select(comments::post_id);
    let retweeted = retweets::table
        .filter(retweets::user_id.eq(bot_id))
        .select(retweets::post_id);

    let ranked: Vec<Post> = posts::table
        .filter(posts::is_public.eq(true))
        .filter(posts::is_deleted.eq(false))
        .filter(posts::user_id.ne(bot_id))
        .filter(posts::created_at.ge(since))
        .filter(not(posts::id
            .eq_any(liked)
            .and(posts::id.eq_any(commented))
            .and(posts::id.eq_any(retweeted))))
        .order((
            score_expr(weights).desc(),
            posts::created_at.desc(),
            posts::id.desc(),
        ))
        .limit(i64::try_from(limit).unwrap_or(i64::MAX))
        .select(Post::as_select())
        .load(conn)?;

    let ids: Vec<i32> = ranked.iter().map(|p| p.id).collect();
    let done = BotInteractions::load(conn, bot_id, &ids)?;

    Ok(ranked
        .into_iter()
        .map(|post| Candidate {
            score: engagement_score(&post, weights),
            liked: done.liked.contains(&post.id),
            commented: done.commented.contains(&post.id),
            retweeted: done.retweeted.contains(&post.id),
            post,
        })
        .collect())
}
