pub mod games;
pub mod policy;
pub mod signals;

use crate::db::{self, DbPool, Post};
use crate::ledger::{self, ActionType};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::settings::{settings, Settings};
use diesel::sqlite::SqliteConnection;
use games::GameInfo;
use policy::{Heuristics, ModelVerdict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::{Display, EnumString};

const SNIPPET_CHARS: usize = 100;

const DECISION_SYSTEM: &str = "You are Carl, a regular on a gaming social network. \
You are ACTIVE: you engage with most gaming content, help people who ask questions \
and hype good plays. Only pass on spam, off-topic or irrelevant posts. \
Answer YES or NO first, then at most one short sentence.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Like,
    Comment,
    Retweet,
}

impl InteractionType {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::Comment => "COMMENT",
            Self::Retweet => "RETWEET",
        }
    }

    pub fn decision_action(self) -> ActionType {
        match self {
            Self::Like => ActionType::DecisionLike,
            Self::Comment => ActionType::DecisionComment,
            Self::Retweet => ActionType::DecisionRetweet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionMetadata {
    pub post_id: i32,
    pub interaction_type: InteractionType,
    pub content_snippet: String,
    pub author: String,
    pub game: Option<String>,
    pub likes: i32,
    pub comments: i32,
    pub retweets: i32,
    pub model_output: String,
    pub verdict: ModelVerdict,
    pub spam_flag: Option<String>,
    pub heuristics: Heuristics,
    pub final_decision: bool,
    pub override_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub should_interact: bool,
    pub reason: String,
    pub metadata: Option<DecisionMetadata>,
}

impl Decision {
    pub fn error() -> Self {
        Self {
            should_interact: false,
            reason: "Error".to_string(),
            metadata: None,
        }
    }
}

/// What the gate knows about the post and about the bot's own history.
#[derive(Debug, Clone, Default)]
pub struct DecisionContext {
    pub author: String,
    pub examples: Vec<String>,
    pub recent_counts: BTreeMap<String, i64>,
}

impl DecisionContext {
    pub fn gather(
        conn: &mut SqliteConnection,
        post: &Post,
        bot_id: i32,
        learning_examples: i64,
    ) -> diesel::QueryResult<Self> {
        let author = db::get_post_author(conn, post)?.unwrap_or_else(|| "unknown".to_string());
        let examples = ledger::top_comments(conn, bot_id, learning_examples)?
            .into_iter()
            .map(|c| c.content)
            .collect();
        let recent_counts = ledger::interaction_counts(conn, bot_id, db::now() - 86400)?;

        Ok(Self {
            author,
            examples,
            recent_counts,
        })
    }
}

pub fn build_prompt(
    post: &Post,
    kind: InteractionType,
    game: Option<&GameInfo>,
    ctx: &DecisionContext,
) -> String {
    let mut prompt = format!(
        "Should you {} this post?\n\nPost by @{}:\n\"{}\"\n\nEngagement: {} likes, {} comments, {} retweets\n",
        kind,
        ctx.author,
        post.content,
        post.likes_count,
        post.comments_count,
        post.retweets_count,
    );

    if let Some(game) = game {
        prompt.push_str(&format!(
            "\nGame: {} ({})\nContext: {}\n",
            game.name, game.genre, game.context
        ));
    }

    if !ctx.examples.is_empty() {
        prompt.push_str("\nComments of yours that people liked:\n");
        for example in &ctx.examples {
            prompt.push_str(&format!("- {example}\n"));
        }
    }

    if !ctx.recent_counts.is_empty() {
        let counts: Vec<String> = ctx
            .recent_counts
            .iter()
            .map(|(action, n)| format!("{action}: {n}"))
            .collect();
        prompt.push_str(&format!("\nYour activity in the last 24h: {}\n", counts.join(", ")));
    }

    prompt.push_str("\nReply YES or NO.");
    prompt
}

/// Pure part of the gate: same post, context and reply always give the same decision.
pub fn evaluate(
    post: &Post,
    kind: InteractionType,
    ctx: &DecisionContext,
    reply: &str,
    config: &crate::settings::Decision,
) -> Decision {
    let game = games::detect_game(&post.content, post.game_id.as_deref());
    let verdict = ModelVerdict::parse(reply, kind);
    let spam = signals::spam_flag(reply, &config.spam_markers);
    let heuristics = Heuristics {
        game_match: game.is_some(),
        has_engagement: post.total_engagement() > 0,
        is_question: signals::is_question(&post.content, &config.question_openers),
        gaming_keyword: signals::gaming_keyword(&post.content, &config.gaming_keywords).is_some(),
    };
    let outcome = policy::decide(verdict, spam, heuristics);

    Decision {
        should_interact: outcome.should_interact,
        reason: outcome.reason,
        metadata: Some(DecisionMetadata {
            post_id: post.id,
            interaction_type: kind,
            content_snippet: post.content.chars().take(SNIPPET_CHARS).collect(),
            author: ctx.author.clone(),
            game: game.map(|g| g.name.to_string()),
            likes: post.likes_count,
            comments: post.comments_count,
            retweets: post.retweets_count,
            model_output: reply.to_string(),
            verdict,
            spam_flag: spam.map(str::to_string),
            heuristics,
            final_decision: outcome.should_interact,
            override_applied: outcome.override_applied,
        }),
    }
}

#[derive(Clone)]
pub struct DecisionGate {
    model: Arc<dyn LanguageModel>,
}

impl DecisionGate {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Never fails; any database or model error becomes a "no".
    pub async fn decide(
        &self,
        pool: &DbPool,
        post: &Post,
        kind: InteractionType,
        bot_id: i32,
    ) -> Decision {
        let s = settings();
        let ctx = match pool.get().map_err(|e| e.to_string()).and_then(|mut conn| {
            DecisionContext::gather(&mut conn, post, bot_id, s.decision.learning_examples)
                .map_err(|e| e.to_string())
        }) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(post_id = post.id, %kind, error = %e, "could not gather decision context");
                return Decision::error();
            }
        };

        self.decide_with_context(post, kind, &ctx, &s).await
    }

    pub async fn decide_with_context(
        &self,
        post: &Post,
        kind: InteractionType,
        ctx: &DecisionContext,
        s: &Settings,
    ) -> Decision {
        let game = games::detect_game(&post.content, post.game_id.as_deref());
        let request = CompletionRequest {
            system: DECISION_SYSTEM.to_string(),
            prompt: build_prompt(post, kind, game, ctx),
            max_tokens: s.llm.decision_max_tokens,
            temperature: s.llm.decision_temperature,
        };

        match self.model.complete(request).await {
            Ok(reply) => {
                let decision = evaluate(post, kind, ctx, &reply, &s.decision);
                tracing::debug!(
                    post_id = post.id,
                    %kind,
                    should_interact = decision.should_interact,
                    reason = %decision.reason,
                    "decision made"
                );
                decision
            }
            Err(e) => {
                tracing::warn!(post_id = post.id, %kind, error = %e, "decision model call failed");
                Decision::error()
            }
        }
    }
}
