use crate::schema::bot_config;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

pub const AUTO_INTERACT_ENABLED: &str = "auto_interact_enabled";
pub const MAX_INTERACTIONS_PER_RUN: &str = "max_interactions_per_run";
pub const COMMENT_PROBABILITY: &str = "comment_probability";
pub const LIKE_PROBABILITY: &str = "like_probability";
pub const RETWEET_PROBABILITY: &str = "retweet_probability";
pub const RETWEET_MIN_ENGAGEMENT: &str = "retweet_min_engagement";
pub const LOW_COMMENT_THRESHOLD: &str = "low_comment_threshold";
pub const POST_DELAY_MS: &str = "post_delay_ms";

/// Tunables stored in the `bot_config` table. Loaded fresh for every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotConfig {
    pub auto_interact_enabled: bool,
    pub max_interactions_per_run: usize,
    pub comment_probability: f64,
    pub like_probability: f64,
    pub retweet_probability: f64,
    pub retweet_min_engagement: i32,
    pub low_comment_threshold: i32,
    pub post_delay_ms: u64,
    pub extra: BTreeMap<String, String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            auto_interact_enabled: true,
            max_interactions_per_run: 10,
            comment_probability: 0.6,
            like_probability: 0.7,
            retweet_probability: 0.4,
            retweet_min_engagement: 3,
            low_comment_threshold: 2,
            post_delay_ms: 500,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, Serialize)]
#[diesel(table_name = bot_config)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value '{value}' for {key}"))
}

fn parse_probability(key: &str, value: &str) -> Result<f64, String> {
    let p: f64 = parse(key, value)?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("{key} must be between 0 and 1"))
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("invalid value '{value}' for {key}")),
    }
}

impl BotConfig {
    pub fn load(conn: &mut SqliteConnection) -> QueryResult<Self> {
        let mut config = Self::default();
        for entry in entries(conn)? {
            if let Err(e) = config.apply(&entry.key, &entry.value) {
                tracing::warn!(key = %entry.key, error = %e, "using default for bot config value");
            }
        }
        Ok(config)
    }

    /// Checks a value without storing it. Unknown keys are accepted.
    pub fn validate(key: &str, value: &str) -> Result<(), String> {
        Self::default().apply(key, value)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            AUTO_INTERACT_ENABLED => self.auto_interact_enabled = parse_flag(key, value)?,
            MAX_INTERACTIONS_PER_RUN => self.max_interactions_per_run = parse(key, value)?,
            COMMENT_PROBABILITY => self.comment_probability = parse_probability(key, value)?,
            LIKE_PROBABILITY => self.like_probability = parse_probability(key, value)?,
            RETWEET_PROBABILITY => self.retweet_probability = parse_probability(key, value)?,
            RETWEET_MIN_ENGAGEMENT => self.retweet_min_engagement = parse(key, value)?,
            LOW_COMMENT_THRESHOLD => self.low_comment_threshold = parse(key, value)?,
            POST_DELAY_MS => self.post_delay_ms = parse(key, value)?,
            _ => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

pub fn entries(conn: &mut SqliteConnection) -> QueryResult<Vec<ConfigEntry>> {
    bot_config::table
        .order(bot_config::key.asc())
        .select(ConfigEntry::as_select())
        .load(conn)
}

pub fn set(conn: &mut SqliteConnection, key: &str, value: &str) -> QueryResult<ConfigEntry> {
    let entry = ConfigEntry {
        key: key.to_string(),
        value: value.to_string(),
        updated_at: crate::db::now(),
    };

    diesel::insert_into(bot_config::table)
        .values(&entry)
        .on_conflict(bot_config::key)
        .do_update()
        .set(&entry)
        .execute(conn)?;

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_pool;

    #[test]
    fn test_defaults_when_empty() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();
        assert_eq!(BotConfig::load(&mut conn).unwrap(), BotConfig::default());
    }

    #[test]
    fn test_values_are_read_fresh() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();

        set(&mut conn, LIKE_PROBABILITY, "0.25").unwrap();
        set(&mut conn, AUTO_INTERACT_ENABLED, "false").unwrap();
        let config = BotConfig::load(&mut conn).unwrap();
        assert_eq!(config.like_probability, 0.25);
        assert!(!config.auto_interact_enabled);

        set(&mut conn, LIKE_PROBABILITY, "0.9").unwrap();
        let config = BotConfig::load(&mut conn).unwrap();
        assert_eq!(config.like_probability, 0.9);
        assert_eq!(entries(&mut conn).unwrap().len(), 2);
    }

    #[test]
    fn test_bad_values_fall_back_to_defaults() {
        let (_dir, pool) = test_pool();
        let mut conn = pool.get().unwrap();

        set(&mut conn, POST_DELAY_MS, "soon").unwrap();
        set(&mut conn, "favorite_game", "valorant").unwrap();
        let config = BotConfig::load(&mut conn).unwrap();
        assert_eq!(config.post_delay_ms, 500);
        assert_eq!(config.extra.get("favorite_game").map(String::as_str), Some("valorant"));
    }

    #[test]
    fn test_validate() {
        assert!(BotConfig::validate(COMMENT_PROBABILITY, "0.5").is_ok());
        assert!(BotConfig::validate(COMMENT_PROBABILITY, "1.5").is_err());
        assert!(BotConfig::validate(AUTO_INTERACT_ENABLED, "maybe").is_err());
        assert!(BotConfig::validate("anything_else", "whatever").is_ok());
    }
}
