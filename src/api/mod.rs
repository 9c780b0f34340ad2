mod admin;
mod bot;

use crate::bot::Bot;
use crate::scheduler::Scheduler;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use std::sync::Arc;

pub struct AppState {
    pub bot: Bot,
    pub scheduler: Arc<Scheduler>,
    pub admin_token: Option<String>,
}

/// Checks the `Authorization: Bearer` header against the configured admin token.
fn validate_token(state: &web::Data<AppState>, req: &HttpRequest) -> Result<(), HttpResponse> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(HttpResponse::ServiceUnavailable()
            .json(json!({ "error": "Bot endpoints are disabled: ADMIN_TOKEN is not set" })));
    };

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim);

    match token {
        None => Err(HttpResponse::Unauthorized()
            .json(json!({ "error": "No authorization token provided" }))),
        Some(t) if t == expected => Ok(()),
        Some(_) => Err(HttpResponse::Unauthorized().json(json!({ "error": "Invalid token" }))),
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/health", web::get().to(health));
    bot::config(cfg);
    admin::config(cfg);
}


#[cfg(test)]
mod tests {
    use super::test_support::{bearer, state, TOKEN};
    use super::*;
    use crate::testing::{seed_post, seed_user, test_pool, ScriptedModel};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_needs_no_token() {
        let (_dir, pool) = test_pool();
        let app = test::init_service(
            App::new()
                .app_data(state(&pool, ScriptedModel::always("YES"), Some(TOKEN)))
                .configure(config),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
    }

    #[actix_web::test]
    async fn test_token_checks() {
        let (_dir, pool) = test_pool();
        let post_id = {
            let mut conn = pool.get().unwrap();
            let author = seed_user(&mut conn, "alice");
            seed_post(&mut conn, author.id, "gg").id
        };
        let app = test::init_service(
            App::new()
                .app_data(state(&pool, ScriptedModel::always("YES"), Some(TOKEN)))
                .configure(config),
        )
        .await;
        let uri = format!("/api/bot/like/{post_id}");

        let req = test::TestRequest::post().uri(&uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header(("Authorization", "Bearer nope"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/admin/scheduler/status")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_missing_admin_token_disables_endpoints() {
        let (_dir, pool) = test_pool();
        let app = test::init_service(
            App::new()
                .app_data(state(&pool, ScriptedModel::always("YES"), None))
                .configure(config),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/admin/activity")
            .insert_header(bearer())
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
