use arc_swap::ArcSwap;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{Arc, LazyLock};

const DEFAULT_PATH: &str = "settings.default.ron";
const OVERRIDE_PATH: &str = "settings.ron";

static SETTINGS: LazyLock<ArcSwap<Settings>> =
    LazyLock::new(|| ArcSwap::from_pointee(Settings::load_from_files()));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: Server,
    pub llm: Llm,
    pub bot: Bot,
    pub scheduler: Scheduler,
    pub engagement: Engagement,
    pub decision: Decision,
    pub ledger: Ledger,
    pub admin: Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Llm {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub decision_max_tokens: u32,
    pub decision_temperature: f32,
    pub comment_max_words: usize,
    pub comment_temperature: f32,
    pub post_max_words: usize,
    pub post_temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bot {
    pub username: String,
    pub display_name: String,
    pub account_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub enabled: bool,
    pub interval_minutes: u32,
    pub candidate_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Engagement {
    pub weights: EngagementWeights,
    pub trending_window_hours: i64,
    pub max_existing_comments: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementWeights {
    pub like: f32,
    pub comment: f32,
    pub retweet: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Decision {
    pub learning_examples: i64,
    pub gaming_keywords: Vec<String>,
    pub spam_markers: Vec<String>,
    pub question_openers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Admin {
    pub token: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_url: "carl.db".to_string(),
            pool_size: 5,
        }
    }
}

impl Default for Llm {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: 30,
            decision_max_tokens: 50,
            decision_temperature: 0.3,
            comment_max_words: 50,
            comment_temperature: 0.8,
            post_max_words: 150,
            post_temperature: 0.9,
        }
    }
}

impl Default for Bot {
    fn default() -> Self {
        Self {
            username: "Carlbot".to_string(),
            display_name: "Carl".to_string(),
            account_id: None,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
            candidate_limit: 5,
        }
    }
}

impl Default for Engagement {
    fn default() -> Self {
        Self {
            weights: EngagementWeights::default(),
            trending_window_hours: 24,
            max_existing_comments: 10,
        }
    }
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            like: 1.0,
            comment: 2.0,
            retweet: 1.5,
        }
    }
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            learning_examples: 3,
            gaming_keywords: vec![
                "game".into(),
                "games".into(),
                "gaming".into(),
                "gamer".into(),
                "play".into(),
                "playing".into(),
                "ranked".into(),
                "rank".into(),
                "clutch".into(),
                "meta".into(),
                "build".into(),
                "loadout".into(),
                "patch".into(),
                "nerf".into(),
                "buff".into(),
                "fps".into(),
                "moba".into(),
                "rpg".into(),
                "esports".into(),
                "tournament".into(),
                "aim".into(),
                "headshot".into(),
                "squad".into(),
                "raid".into(),
                "boss".into(),
                "speedrun".into(),
                "strat".into(),
                "strats".into(),
                "gg".into(),
                "console".into(),
                "controller".into(),
                "steam".into(),
            ],
            spam_markers: vec![
                "SPAM".into(),
                "OFF-TOPIC".into(),
                "NOT GAMING".into(),
                "IRRELEVANT".into(),
            ],
            question_openers: vec![
                "anyone".into(),
                "how".into(),
                "what".into(),
                "which".into(),
                "why".into(),
                "should".into(),
                "does".into(),
                "is".into(),
                "can".into(),
                "who".into(),
                "when".into(),
                "where".into(),
            ],
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 200,
        }
    }
}

impl Settings {
    pub fn load_from_files() -> Settings {
        let default_path = Path::new(DEFAULT_PATH);
        let override_path = Path::new(OVERRIDE_PATH);

        let mut settings = if default_path.exists() {
            fs::read_to_string(default_path)
                .ok()
                .and_then(|content| ron::from_str(&content).ok())
                .unwrap_or_default()
        } else {
            Settings::default()
        };

        if override_path.exists() {
            match fs::read_to_string(override_path).map(|c| ron::from_str::<Settings>(&c)) {
                Ok(Ok(overrides)) => settings = overrides,
                Ok(Err(e)) => tracing::warn!(error = %e, "ignoring malformed {OVERRIDE_PATH}"),
                Err(e) => tracing::warn!(error = %e, "could not read {OVERRIDE_PATH}"),
            }
        }

        settings.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Settings {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.server.database_url = url;
        }
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            self.admin.token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(id) = std::env::var("CARLBOT_ACCOUNT_ID")
            .ok()
            .and_then(|id| id.parse().ok())
        {
            self.bot.account_id = Some(id);
        }
        self
    }
}

pub fn settings() -> Arc<Settings> {
    SETTINGS.load_full()
}

pub fn reload() -> Arc<Settings> {
    SETTINGS.store(Arc::new(Settings::load_from_files()));
    settings()
}

/// Reloads settings whenever `settings.ron` or `settings.default.ron` changes.
/// The returned watcher must be kept alive for the reloads to continue.
pub fn watch() -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(|res: notify::Result<notify::Event>| {
        let Ok(event) = res else {
            return;
        };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }
        let touched = event.paths.iter().any(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n == DEFAULT_PATH || n == OVERRIDE_PATH)
        });
        if touched {
            let s = reload();
            tracing::info!(
                interval_minutes = s.scheduler.interval_minutes,
                model = %s.llm.model,
                "settings reloaded"
            );
        }
    })?;
    watcher.watch(Path::new("."), RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engagement_weights() {
        let s = Settings::default();
        assert_eq!(s.engagement.weights.like, 1.0);
        assert_eq!(s.engagement.weights.comment, 2.0);
        assert_eq!(s.engagement.weights.retweet, 1.5);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let parsed: Settings = ron::from_str("(scheduler: (interval_minutes: 10))").unwrap();
        assert_eq!(parsed.scheduler.interval_minutes, 10);
        assert!(parsed.scheduler.enabled);
        assert_eq!(parsed.bot.username, "Carlbot");
        assert_eq!(parsed.llm.decision_max_tokens, 50);
    }

    #[test]
    fn test_spam_markers_cover_override_exceptions() {
        let s = Settings::default();
        for marker in ["SPAM", "OFF-TOPIC", "NOT GAMING", "IRRELEVANT"] {
            assert!(s.decision.spam_markers.iter().any(|m| m == marker));
        }
    }
}
