use crate::db::{self, Post};
use crate::decision::games::{self, GameInfo};
use crate::ledger;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::settings::settings;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

pub const COMMENT_FALLBACK: &str = "Interesting post!";
pub const POST_FALLBACK: &str = "Grinding ranked tonight. Who's queuing up?";

const RECENT_POSTS: i64 = 5;

const PERSONA: &str = "You are Carl, a brutally honest tactical gamer on a gaming social network. \
You have thousands of hours across shooters, MOBAs and battle royales, you know the meta, \
and you say what you think about plays, patches and builds.";

const STYLE_RULES: &str = "Talk like a human, not an assistant. \
No greetings, no hashtags, no emoji spam, no \"Great question!\". \
Lowercase is fine. Be specific, be short, and never explain that you are an AI.";

#[derive(Debug, Clone, Default)]
pub struct CommentContext {
    pub author: String,
    pub game: Option<&'static GameInfo>,
    pub examples: Vec<String>,
    pub existing: Vec<String>,
}

impl CommentContext {
    pub fn gather(conn: &mut SqliteConnection, post: &Post, bot_id: i32) -> diesel::QueryResult<Self> {
        let s = settings();
        Ok(Self {
            author: db::get_post_author(conn, post)?.unwrap_or_else(|| "unknown".to_string()),
            game: games::detect_game(&post.content, post.game_id.as_deref()),
            examples: ledger::top_comments(conn, bot_id, s.decision.learning_examples)?
                .into_iter()
                .map(|c| c.content)
                .collect(),
            existing: db::comment_texts_for_post(conn, post.id, s.engagement.max_existing_comments)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostRequest {
    pub topic: Option<String>,
    pub game_id: Option<String>,
    pub community_id: Option<i32>,
}

/// Trims, strips wrapping quotes and cuts to `max_words`. Empty output is `None`.
pub fn tidy(text: &str, max_words: usize) -> Option<String> {
    let trimmed = text
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '\u{201C}' || c == '\u{201D}')
        .trim();

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    if words.len() <= max_words {
        return Some(trimmed.to_string());
    }
    Some(words[..max_words].join(" "))
}

fn comment_prompt(post: &Post, ctx: &CommentContext, max_words: usize) -> String {
    let mut prompt = format!(
        "Write a comment on this post by @{}:\n\"{}\"\n",
        ctx.author, post.content
    );

    if let Some(game) = ctx.game {
        prompt.push_str(&format!("\nGame: {}. {}\n", game.name, game.context));
    }

    if !ctx.examples.is_empty() {
        prompt.push_str("\nComments of yours that people liked, match this voice:\n");
        for example in &ctx.examples {
            prompt.push_str(&format!("- {example}\n"));
        }
    }

    if !ctx.existing.is_empty() {
        prompt.push_str("\nOther people already said this, say something different:\n");
        for comment in &ctx.existing {
            prompt.push_str(&format!("- {comment}\n"));
        }
    }

    prompt.push_str(&format!("\nMax {max_words} words. Only the comment text."));
    prompt
}

fn post_prompt(request: &PostRequest, recent: &[String], max_words: usize) -> String {
    let mut prompt = String::from("Write a new post for your feed.\n");

    if let Some(topic) = request.topic.as_deref().filter(|t| !t.trim().is_empty()) {
        prompt.push_str(&format!("Topic: {topic}\n"));
    }
    match request.game_id.as_deref() {
        Some(id) => match games::find_game(id) {
            Some(game) => prompt.push_str(&format!("Game: {}. {}\n", game.name, game.context)),
            None => prompt.push_str(&format!("Game: {id}\n")),
        },
        None => prompt.push_str("Pick any game you have an opinion about.\n"),
    }
    if let Some(community) = request.community_id {
        prompt.push_str(&format!("It goes to community #{community}, keep it on topic.\n"));
    }

    if !recent.is_empty() {
        prompt.push_str("\nYour recent posts, don't repeat them:\n");
        for text in recent {
            prompt.push_str(&format!("- {text}\n"));
        }
    }

    prompt.push_str(&format!("\nMax {max_words} words. Only the post text."));
    prompt
}

fn system_prompt() -> String {
    format!("{PERSONA}\n\n{STYLE_RULES}")
}

#[derive(Clone)]
pub struct ContentGenerator {
    model: Arc<dyn LanguageModel>,
}

impl ContentGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn comment(&self, post: &Post, ctx: &CommentContext) -> String {
        let s = settings();
        let llm = &s.llm;
        let request = CompletionRequest {
            system: system_prompt(),
            prompt: comment_prompt(post, ctx, llm.comment_max_words),
            max_tokens: (llm.comment_max_words * 2) as u32,
            temperature: llm.comment_temperature,
        };

        match self.model.complete(request).await {
            Ok(text) => tidy(&text, llm.comment_max_words).unwrap_or_else(|| COMMENT_FALLBACK.to_string()),
            Err(e) => {
                tracing::warn!(post_id = post.id, error = %e, "comment generation failed");
                COMMENT_FALLBACK.to_string()
            }
        }
    }

    pub async fn post(&self, request: &PostRequest, recent: &[String]) -> String {
        let s = settings();
        let llm = &s.llm;
        let completion = CompletionRequest {
            system: system_prompt(),
            prompt: post_prompt(request, recent, llm.post_max_words),
            max_tokens: (llm.post_max_words * 2) as u32,
            temperature: llm.post_temperature,
        };

        match self.model.complete(completion).await {
            Ok(text) => tidy(&text, llm.post_max_words).unwrap_or_else(|| POST_FALLBACK.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "post generation failed");
                POST_FALLBACK.to_string()
            }
        }
    }
}

pub fn recent_posts(conn: &mut SqliteConnection, bot_id: i32) -> diesel::QueryResult<Vec<String>> {
    db::recent_post_texts(conn, bot_id, RECENT_POSTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::add_comment;
    use crate::testing::{seed_post, seed_user, test_pool, ScriptedModel};

    #[test]
    fn test_tidy() {
        assert_eq!(tidy("  \"nice clutch\"  ", 50).as_deref(), Some("nice clutch"));
        assert_eq!(tidy("one two three four", 2).as_deref(), Some("one two"));
        assert_eq!(tidy("   ", 10), None);
        assert_eq!(tidy("\"\"", 10), None);
    }

    #[tokio::test]
    async fn test_comment_lists_existing_comments() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        let author = seed_user(&mut conn, "alice");
        let bob = seed_user(&mut conn, "bob");
        let bot = seed_user(&mut conn, "Carlbot");
        let post = seed_post(&mut conn, author.id, "Jett updraft is so underrated in valorant");
        add_comment(&mut conn, post.id, bob.id, "agreed, free angles", None).unwrap();

        let ctx = CommentContext::gather(&mut conn, &post, bot.id).unwrap();
        assert_eq!(ctx.author, "alice");
        assert_eq!(ctx.existing, vec!["agreed, free angles".to_string()]);
        assert_eq!(ctx.game.map(|g| g.id), Some("valorant"));

        let model = Arc::new(ScriptedModel::always("\"updraft into op angle, every time\""));
        let generator = ContentGenerator::new(model.clone());
        let text = generator.comment(&post, &ctx).await;
        assert_eq!(text, "updraft into op angle, every time");

        let calls = model.calls();
        assert!(calls[0].prompt.contains("say something different"));
        assert!(calls[0].prompt.contains("agreed, free angles"));
        assert_eq!(calls[0].temperature, 0.8);
    }

    #[tokio::test]
    async fn test_failures_fall_back() {
        let generator = ContentGenerator::new(Arc::new(ScriptedModel::failing()));
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        let author = seed_user(&mut conn, "alice");
        let post = seed_post(&mut conn, author.id, "gg");

        assert_eq!(
            generator.comment(&post, &CommentContext::default()).await,
            COMMENT_FALLBACK
        );
        assert_eq!(generator.post(&PostRequest::default(), &[]).await, POST_FALLBACK);

        let generator = ContentGenerator::new(Arc::new(ScriptedModel::always("   ")));
        assert_eq!(
            generator.comment(&post, &CommentContext::default()).await,
            COMMENT_FALLBACK
        );
    }

    #[tokio::test]
    async fn test_post_prompt_avoids_repeats() {
        let model = Arc::new(ScriptedModel::always("elden ring second playthrough hits different"));
        let generator = ContentGenerator::new(model.clone());
        let request = PostRequest {
            topic: Some("replaying games".into()),
            game_id: Some("elden_ring".into()),
            community_id: Some(7),
        };

        let text = generator
            .post(&request, &["first post about malenia".to_string()])
            .await;
        assert_eq!(text, "elden ring second playthrough hits different");

        let prompt = &model.calls()[0].prompt;
        assert!(prompt.contains("Elden Ring"));
        assert!(prompt.contains("community #7"));
        assert!(prompt.contains("first post about malenia"));
    }
}
