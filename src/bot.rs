use crate::account::ServiceAccount;
use crate::db::{self, Comment, DbPool, NewPost, Post};
use crate::decision::{Decision, DecisionGate, InteractionType};
use crate::engagement::{self, InteractionOutcome};
use crate::error::CarlError;
use crate::generator::{self, CommentContext, ContentGenerator, PostRequest};
use crate::ledger::{self, ActionType, ActivityEntry, TargetType};
use crate::llm::LanguageModel;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: &'static str,
    #[serde(skip)]
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResult {
    pub success: bool,
    pub comment: Comment,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostResult {
    pub success: bool,
    pub post: Post,
}

/// Everything the bot can do to the platform, always as its service account.
#[derive(Clone)]
pub struct Bot {
    pool: DbPool,
    account: ServiceAccount,
    gate: DecisionGate,
    generator: ContentGenerator,
}

impl Bot {
    pub fn new(pool: DbPool, account: ServiceAccount, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            pool,
            account,
            gate: DecisionGate::new(model.clone()),
            generator: ContentGenerator::new(model),
        }
    }

    pub fn id(&self) -> i32 {
        self.account.id
    }

    pub fn account(&self) -> &ServiceAccount {
        &self.account
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn visible_post(&self, post_id: i32) -> Result<Post, CarlError> {
        let mut conn = self.pool.get()?;
        db::get_visible_post(&mut conn, post_id)?.ok_or(CarlError::not_found("post", post_id))
    }

    fn log(&self, entry: ActivityEntry) {
        match self.pool.get() {
            Ok(mut conn) => ledger::record(&mut conn, entry),
            Err(e) => tracing::warn!(error = %e, action = %entry.action_type, "no connection for activity log"),
        }
    }

    pub async fn like(&self, post_id: i32) -> Result<ActionResult, CarlError> {
        let post = self.visible_post(post_id)?;
        self.like_post(&post, None)
    }

    pub async fn retweet(&self, post_id: i32) -> Result<ActionResult, CarlError> {
        let post = self.visible_post(post_id)?;
        self.retweet_post(&post, None)
    }

    pub async fn comment(&self, post_id: i32) -> Result<CommentResult, CarlError> {
        let post = self.visible_post(post_id)?;
        self.comment_on(&post, None).await
    }

    fn like_post(&self, post: &Post, decision: Option<&Decision>) -> Result<ActionResult, CarlError> {
        let outcome = {
            let mut conn = self.pool.get()?;
            engagement::like_post(&mut conn, post.id, self.id())
        };

        let result = match outcome {
            Ok(InteractionOutcome::Created) => ActionResult {
                success: true,
                message: "Post liked",
                created: true,
            },
            Ok(InteractionOutcome::AlreadyExists) => ActionResult {
                success: true,
                message: "Already liked",
                created: false,
            },
            Err(e) => {
                self.log(
                    ActivityEntry::new(self.id(), ActionType::Like, "Like failed")
                        .target(TargetType::Post, post.id)
                        .failed(&e),
                );
                return Err(e.into());
            }
        };

        let entry = ActivityEntry::new(self.id(), ActionType::Like, result.message)
            .target(TargetType::Post, post.id);
        self.log(with_decision(entry, json!({}), decision));
        Ok(result)
    }

    fn retweet_post(&self, post: &Post, decision: Option<&Decision>) -> Result<ActionResult, CarlError> {
        let outcome = {
            let mut conn = self.pool.get()?;
            engagement::retweet_post(&mut conn, post.id, self.id())
        };

        let result = match outcome {
            Ok(InteractionOutcome::Created) => ActionResult {
                success: true,
                message: "Post retweeted",
                created: true,
            },
            Ok(InteractionOutcome::AlreadyExists) => ActionResult {
                success: true,
                message: "Already retweeted",
                created: false,
            },
            Err(e) => {
                self.log(
                    ActivityEntry::new(self.id(), ActionType::Retweet, "Retweet failed")
                        .target(TargetType::Post, post.id)
                        .failed(&e),
                );
                return Err(e.into());
            }
        };

        let entry = ActivityEntry::new(self.id(), ActionType::Retweet, result.message)
            .target(TargetType::Post, post.id);
        self.log(with_decision(entry, json!({}), decision));
        Ok(result)
    }

    async fn comment_on(
        &self,
        post: &Post,
        decision: Option<&Decision>,
    ) -> Result<CommentResult, CarlError> {
        let ctx = {
            let mut conn = self.pool.get()?;
            CommentContext::gather(&mut conn, post, self.id())?
        };

        let text = self.generator.comment(post, &ctx).await;
        let saved = {
            let mut conn = self.pool.get()?;
            engagement::add_comment(&mut conn, post.id, self.id(), &text, None)
        };

        match saved {
            Ok(comment) => {
                let entry = ActivityEntry::new(self.id(), ActionType::Comment, text)
                    .target(TargetType::Post, post.id);
                self.log(with_decision(
                    entry,
                    json!({ "comment_id": comment.id }),
                    decision,
                ));
                Ok(CommentResult {
                    success: true,
                    comment,
                })
            }
            Err(e) => {
                self.log(
                    ActivityEntry::new(self.id(), ActionType::Comment, "Comment failed")
                        .target(TargetType::Post, post.id)
                        .failed(&e),
                );
                Err(e.into())
            }
        }
    }

    pub async fn create_post(&self, request: PostRequest) -> Result<PostResult, CarlError> {
        let recent = {
            let mut conn = self.pool.get()?;
            generator::recent_posts(&mut conn, self.id())?
        };

        let content = self.generator.post(&request, &recent).await;
        let new_post = NewPost {
            game_id: request.game_id.clone(),
            community_id: request.community_id,
            ..NewPost::public(self.id(), content)
        };

        let saved = {
            let mut conn = self.pool.get()?;
            db::insert_post(&mut conn, &new_post)
        };

        match saved {
            Ok(post) => {
                self.log(
                    ActivityEntry::new(self.id(), ActionType::CreatePost, &post.content)
                        .target(TargetType::Post, post.id)
                        .metadata(json!({
                            "topic": request.topic,
                            "game_id": request.game_id,
                            "community_id": request.community_id,
                        })),
                );
                Ok(PostResult {
                    success: true,
                    post,
                })
            }
            Err(e) => {
                self.log(
                    ActivityEntry::new(self.id(), ActionType::CreatePost, "Post creation failed")
                        .failed(&e),
                );
                Err(e.into())
            }
        }
    }

    /// Runs the decision gate without recording anything.
    pub async fn should_interact(
        &self,
        post_id: i32,
        kind: InteractionType,
    ) -> Result<Decision, CarlError> {
        let post = self.visible_post(post_id)?;
        Ok(self.assess(&post, kind).await)
    }

    pub async fn assess(&self, post: &Post, kind: InteractionType) -> Decision {
        self.gate.decide(&self.pool, post, kind, self.id()).await
    }

    /// Logs a declined or failed decision as its own `decision_*` row.
    pub fn record_decision(&self, post: &Post, kind: InteractionType, decision: &Decision) {
        let mut entry = ActivityEntry::new(self.id(), kind.decision_action(), &decision.reason)
            .target(TargetType::Post, post.id);
        match &decision.metadata {
            Some(meta) => {
                entry = entry.metadata(json!(meta));
            }
            None => {
                entry = entry.failed("decision unavailable");
            }
        }
        self.log(entry);
    }

    /// Carries out an approved interaction. The action row carries the decision
    /// that allowed it. Returns whether anything new was persisted.
    pub async fn act(
        &self,
        post: &Post,
        kind: InteractionType,
        decision: &Decision,
    ) -> Result<bool, CarlError> {
        let post = self.visible_post(post.id)?;
        match kind {
            InteractionType::Like => Ok(self.like_post(&post, Some(decision))?.created),
            InteractionType::Retweet => Ok(self.retweet_post(&post, Some(decision))?.created),
            InteractionType::Comment => {
                self.comment_on(&post, Some(decision)).await?;
                Ok(true)
            }
        }
    }
}

fn with_decision(
    entry: ActivityEntry,
    mut metadata: serde_json::Value,
    decision: Option<&Decision>,
) -> ActivityEntry {
    if let Some(meta) = decision.and_then(|d| d.metadata.as_ref()) {
        metadata["decision"] = json!(meta);
    }
    match metadata.as_object() {
        Some(map) if map.is_empty() => entry,
        _ => entry.metadata(metadata),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{bot_activity_log, likes, posts};
    use crate::testing::{seed_post, seed_user, test_pool, ScriptedModel};
    use diesel::connection::SimpleConnection;
    use diesel::prelude::*;

    fn bot_for(pool: &DbPool, model: ScriptedModel) -> Bot {
        let mut conn = pool.get().unwrap();
        let user = seed_user(&mut conn, "Carlbot");
        let account = ServiceAccount {
            id: user.id,
            username: user.username,
        };
        Bot::new(pool.clone(), account, Arc::new(model))
    }

    #[tokio::test]
    async fn test_like_is_idempotent() {
        let (_dir, pool) = test_pool();
        let bot = bot_for(&pool, ScriptedModel::always("YES"));
        let post = {
            let mut conn = pool.get().unwrap();
            let author = seed_user(&mut conn, "alice");
            seed_post(&mut conn, author.id, "first ace of the season")
        };

        assert_eq!(bot.like(post.id).await.unwrap().message, "Post liked");
        assert_eq!(bot.like(post.id).await.unwrap().message, "Already liked");

        let mut conn = pool.get().unwrap();
        let count: i32 = posts::table
            .find(post.id)
            .select(posts::likes_count)
            .first(&mut conn)
            .unwrap();
        assert_eq!(count, 1);
        let rows: i64 = likes::table.count().get_result(&mut conn).unwrap();
        assert_eq!(rows, 1);
        let logged: i64 = bot_activity_log::table.count().get_result(&mut conn).unwrap();
        assert_eq!(logged, 2);
    }

    #[tokio::test]
    async fn test_like_survives_missing_activity_log() {
        let (_dir, pool) = test_pool();
        let bot = bot_for(&pool, ScriptedModel::always("YES"));
        let post = {
            let mut conn = pool.get().unwrap();
            let author = seed_user(&mut conn, "alice");
            let post = seed_post(&mut conn, author.id, "new crosshair who dis");
            conn.batch_execute("DROP TABLE bot_activity_log;").unwrap();
            post
        };

        let result = bot.like(post.id).await.unwrap();
        assert!(result.success);
        assert_eq!(result.message, "Post liked");
    }

    #[tokio::test]
    async fn test_unknown_post_is_not_found() {
        let (_dir, pool) = test_pool();
        let bot = bot_for(&pool, ScriptedModel::always("YES"));

        let err = bot.retweet(404).await.unwrap_err();
        assert!(matches!(err, CarlError::NotFound { what: "post", id: 404 }));
    }

    #[tokio::test]
    async fn test_comment_persists_generated_text() {
        let (_dir, pool) = test_pool();
        let bot = bot_for(&pool, ScriptedModel::always("hold the angle, don't peek"));
        let post = {
            let mut conn = pool.get().unwrap();
            let author = seed_user(&mut conn, "alice");
            seed_post(&mut conn, author.id, "how do I stop dying on b site")
        };

        let result = bot.comment(post.id).await.unwrap();
        assert_eq!(result.comment.content, "hold the angle, don't peek");
        assert_eq!(result.comment.user_id, bot.id());

        let mut conn = pool.get().unwrap();
        let refreshed = db::get_post(&mut conn, post.id).unwrap().unwrap();
        assert_eq!(refreshed.comments_count, 1);
    }

    #[tokio::test]
    async fn test_create_post_keeps_game_tag() {
        let (_dir, pool) = test_pool();
        let bot = bot_for(&pool, ScriptedModel::always("ranked apex is just third parties now"));

        let result = bot
            .create_post(PostRequest {
                topic: None,
                game_id: Some("apex".into()),
                community_id: None,
            })
            .await
            .unwrap();
        assert_eq!(result.post.user_id, bot.id());
        assert_eq!(result.post.game_id.as_deref(), Some("apex"));
        assert!(result.post.is_public);
    }

    #[tokio::test]
    async fn test_should_interact_writes_nothing() {
        let (_dir, pool) = test_pool();
        let bot = bot_for(&pool, ScriptedModel::always("YES"));
        let post = {
            let mut conn = pool.get().unwrap();
            let author = seed_user(&mut conn, "alice");
            seed_post(&mut conn, author.id, "valorant night")
        };

        let decision = bot.should_interact(post.id, InteractionType::Like).await.unwrap();
        assert!(decision.should_interact);

        let mut conn = pool.get().unwrap();
        let logged: i64 = bot_activity_log::table.count().get_result(&mut conn).unwrap();
        assert_eq!(logged, 0);
    }

    #[tokio::test]
    async fn test_record_decision_logs_failed_row() {
        let (_dir, pool) = test_pool();
        let bot = bot_for(&pool, ScriptedModel::failing());
        let post = {
            let mut conn = pool.get().unwrap();
            let author = seed_user(&mut conn, "alice");
            seed_post(&mut conn, author.id, "valorant night")
        };

        let decision = bot.assess(&post, InteractionType::Retweet).await;
        assert!(!decision.should_interact);
        bot.record_decision(&post, InteractionType::Retweet, &decision);

        let mut conn = pool.get().unwrap();
        let (action, success): (String, bool) = bot_activity_log::table
            .select((bot_activity_log::action_type, bot_activity_log::success))
            .first(&mut conn)
            .unwrap();
        assert_eq!(action, "decision_retweet");
        assert!(!success);
    }

    #[tokio::test]
    async fn test_act_attaches_decision_to_action_row() {
        let (_dir, pool) = test_pool();
        let bot = bot_for(&pool, ScriptedModel::always("YES"));
        let post = {
            let mut conn = pool.get().unwrap();
            let author = seed_user(&mut conn, "alice");
            seed_post(&mut conn, author.id, "valorant night")
        };

        let decision = bot.assess(&post, InteractionType::Like).await;
        assert!(decision.should_interact);
        assert!(bot.act(&post, InteractionType::Like, &decision).await.unwrap());
        assert!(!bot.act(&post, InteractionType::Like, &decision).await.unwrap());

        let mut conn = pool.get().unwrap();
        let rows: Vec<(String, Option<String>)> = bot_activity_log::table
            .order(bot_activity_log::id.asc())
            .select((bot_activity_log::action_type, bot_activity_log::metadata))
            .load(&mut conn)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "like");
        let meta: serde_json::Value =
            serde_json::from_str(rows[0].1.as_deref().unwrap()).unwrap();
        assert!(meta.get("decision").is_some());
    }
}
