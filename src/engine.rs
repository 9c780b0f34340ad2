use crate::bot::Bot;
use crate::bot_config::BotConfig;
use crate::db::{self, Post};
use crate::decision::{signals, InteractionType};
use crate::engagement::{self, Candidate};
use crate::error::CarlError;
use crate::settings::settings;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Duration;

/// Source of the probabilistic gates in a run.
pub trait Chance: Send + Sync {
    fn roll(&mut self, probability: f64) -> bool;
}

impl Chance for StdRng {
    fn roll(&mut self, probability: f64) -> bool {
        self.random_bool(probability.clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub comments: usize,
    pub likes: usize,
    pub retweets: usize,
    pub skipped: bool,
    pub errors: usize,
    pub started_at: i64,
    pub finished_at: i64,
}

pub struct EngagementLoop {
    bot: Bot,
    chance: Box<dyn Chance>,
}

impl EngagementLoop {
    pub fn new(bot: Bot, chance: impl Chance + 'static) -> Self {
        Self {
            bot,
            chance: Box::new(chance),
        }
    }

    pub fn seeded_from_os(bot: Bot) -> Self {
        Self::new(bot, StdRng::from_os_rng())
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub async fn run(&mut self, limit: usize) -> Result<RunSummary, CarlError> {
        let mut summary = RunSummary {
            started_at: db::now(),
            ..Default::default()
        };

        let (config, candidates) = {
            let mut conn = self.bot.pool().get()?;
            let config = BotConfig::load(&mut conn)?;
            if !config.auto_interact_enabled {
                tracing::info!("auto interaction disabled, skipping run");
                summary.skipped = true;
                summary.finished_at = db::now();
                return Ok(summary);
            }
            let take = limit.min(config.max_interactions_per_run);
            let candidates = engagement::trending_candidates(&mut conn, self.bot.id(), take)?;
            (config, candidates)
        };

        tracing::info!(candidates = candidates.len(), limit, "engagement run started");

        for (i, candidate) in candidates.iter().enumerate() {
            if i > 0 && config.post_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(config.post_delay_ms)).await;
            }

            summary.processed += 1;
            if let Err(e) = self.engage(candidate, &config, &mut summary).await {
                summary.errors += 1;
                tracing::warn!(post_id = candidate.post.id, error = %e, "engagement failed for post");
            }
        }

        summary.finished_at = db::now();
        Ok(summary)
    }

    /// Tries comment, like and retweet in that order and stops at the first one
    /// that persists, so a post gets at most one new interaction per run. Each
    /// attempt passes its own probability gate and then the decision gate.
    async fn engage(
        &mut self,
        candidate: &Candidate,
        config: &BotConfig,
        summary: &mut RunSummary,
    ) -> Result<(), CarlError> {
        let post = &candidate.post;

        if !candidate.commented {
            let question = signals::is_question(&post.content, &settings().decision.question_openers);
            let forced = question || post.comments_count < config.low_comment_threshold;
            if (forced || self.chance.roll(config.comment_probability))
                && self.attempt(post, InteractionType::Comment, summary).await?
            {
                return Ok(());
            }
        }

        if !candidate.liked
            && self.chance.roll(config.like_probability)
            && self.attempt(post, InteractionType::Like, summary).await?
        {
            return Ok(());
        }

        if !candidate.retweeted
            && post.total_engagement() > config.retweet_min_engagement
            && self.chance.roll(config.retweet_probability)
        {
            self.attempt(post, InteractionType::Retweet, summary).await?;
        }

        Ok(())
    }

    /// One ledger row per attempt: the action row when approved, the decision
    /// row when declined.
    async fn attempt(
        &self,
        post: &Post,
        kind: InteractionType,
        summary: &mut RunSummary,
    ) -> Result<bool, CarlError> {
        let decision = self.bot.assess(post, kind).await;
        if !decision.should_interact {
            self.bot.record_decision(post, kind, &decision);
            return Ok(false);
        }

        let persisted = self.bot.act(post, kind, &decision).await?;
        if persisted {
            match kind {
                InteractionType::Comment => summary.comments += 1,
                InteractionType::Like => summary.likes += 1,
                InteractionType::Retweet => summary.retweets += 1,
            }
        }
        Ok(persisted)
    }
}
