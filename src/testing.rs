use crate::db::{self, DbPool, NewPost, NewUser, Post, User};
use crate::engine::Chance;
use crate::llm::{CompletionRequest, LanguageModel, ModelError};
use async_trait::async_trait;
use diesel::sqlite::SqliteConnection;
use std::sync::Mutex;
use tempfile::TempDir;

pub fn test_pool() -> (TempDir, DbPool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("carl-test.db");
    let pool = db::establish_pool(path.to_str().unwrap(), 4).unwrap();
    {
        let mut conn = pool.get().unwrap();
        db::run_migrations(&mut conn).unwrap();
    }
    (dir, pool)
}

pub fn seed_user(conn: &mut SqliteConnection, username: &str) -> User {
    db::insert_user(
        conn,
        &NewUser {
            username: username.to_string(),
            display_name: None,
            is_bot: false,
            created_at: db::now(),
        },
    )
    .unwrap()
}

pub fn seed_post(conn: &mut SqliteConnection, author_id: i32, content: &str) -> Post {
    db::insert_post(conn, &NewPost::public(author_id, content)).unwrap()
}

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, ModelError> + Send + Sync>;

pub struct ScriptedModel {
    respond: Responder,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(
        respond: impl Fn(&CompletionRequest) -> Result<String, ModelError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    pub fn failing() -> Self {
        Self::new(|_| {
            Err(ModelError::Provider {
                status: 503,
                message: "upstream unavailable".into(),
            })
        })
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let reply = (self.respond)(&request);
        self.calls.lock().unwrap().push(request);
        reply
    }
}

pub struct AlwaysChance;

impl Chance for AlwaysChance {
    fn roll(&mut self, _probability: f64) -> bool {
        true
    }
}

pub struct NeverChance;

impl Chance for NeverChance {
    fn roll(&mut self, _probability: f64) -> bool {
        false
    }
}
