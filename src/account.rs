use crate::db::{self, NewUser};
use crate::settings::Bot;
use diesel::sqlite::SqliteConnection;

/// The platform user the bot acts as. Resolved once at startup and passed around
/// by id; nothing looks the bot up by name afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub id: i32,
    pub username: String,
}

impl ServiceAccount {
    pub fn resolve(conn: &mut SqliteConnection, config: &Bot) -> anyhow::Result<Self> {
        if let Some(id) = config.account_id {
            let user = db::get_user(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("configured bot account {id} does not exist"))?;
            if !user.is_bot {
                tracing::warn!(id, username = %user.username, "configured bot account is not flagged as a bot");
            }
            return Ok(Self {
                id: user.id,
                username: user.username,
            });
        }

        let user = db::ensure_user(
            conn,
            &NewUser {
                username: config.username.clone(),
                display_name: Some(config.display_name.clone()),
                is_bot: true,
                created_at: db::now(),
            },
        )?;

        Ok(Self {
            id: user.id,
            username: user.username,
        })
    }
}
