use actix_web::{middleware, web, App, HttpServer};
use anyhow::Result;
use carlbot::account::ServiceAccount;
use carlbot::api::{self, AppState};
use carlbot::bot::Bot;
use carlbot::db::{establish_pool, run_migrations};
use carlbot::engine::EngagementLoop;
use carlbot::llm::{LanguageModel, OpenAiClient};
use carlbot::scheduler::Scheduler;
use carlbot::settings::{self, settings};
use carlbot::utils::{
    log_account_ready, log_db_ready, log_db_status, log_scheduler_started, log_server_starting,
    log_startup_config,
};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("carlbot=info".parse()?)
                .add_directive("actix_web=info".parse()?),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        );
    // try_init also bridges `log` records from actix middleware
    subscriber
        .try_init()
        .expect("Failed to set tracing subscriber");

    let s = settings();
    let _watcher = match settings::watch() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "settings hot reload unavailable");
            None
        }
    };

    let client = OpenAiClient::new(&s.llm)?;
    log_startup_config(
        &s.server.database_url,
        &s.llm.model,
        client.is_configured(),
        s.scheduler.interval_minutes,
        s.scheduler.enabled,
        s.admin.token.is_some(),
    );

    log_db_status("Initializing SQLite connection pool...");
    let pool = establish_pool(&s.server.database_url, s.server.pool_size)?;
    let account = {
        let mut conn = pool.get()?;
        let applied = run_migrations(&mut conn)?;
        log_db_ready(applied);
        ServiceAccount::resolve(&mut conn, &s.bot)?
    };
    log_account_ready(&account);

    let model: Arc<dyn LanguageModel> = Arc::new(client);
    let bot = Bot::new(pool, account, model);
    let scheduler = Arc::new(Scheduler::new(EngagementLoop::seeded_from_os(bot.clone())));
    if s.scheduler.enabled && scheduler.start() {
        log_scheduler_started(s.scheduler.interval_minutes);
    }

    let state = web::Data::new(AppState {
        bot,
        scheduler: scheduler.clone(),
        admin_token: s.admin.token.clone(),
    });

    log_server_starting(&s.server.host, s.server.port);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(api::config)
    })
    .bind((s.server.host.as_str(), s.server.port))?
    .run()
    .await?;

    scheduler.stop();
    Ok(())
}
