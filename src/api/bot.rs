use super::{validate_token, AppState};
use crate::decision::InteractionType;
use crate::error::CarlError;
use crate::generator::PostRequest;
use crate::scheduler::RunTrigger;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
struct AutoInteractRequest {
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct CreatePostRequest {
    topic: Option<String>,
    game_id: Option<String>,
    community_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ShouldInteractRequest {
    interaction_type: InteractionType,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/bot")
            .route("/like/{post_id}", web::post().to(like))
            .route("/comment/{post_id}", web::post().to(comment))
            .route("/retweet/{post_id}", web::post().to(retweet))
            .route("/auto-interact", web::post().to(auto_interact))
            .route("/create-post", web::post().to(create_post))
            .route("/should-interact/{post_id}", web::post().to(should_interact)),
    );
}

async fn like(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let result = state.bot.like(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn retweet(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let result = state.bot.retweet(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn comment(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let result = state.bot.comment(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn auto_interact(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<AutoInteractRequest>>,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let limit = body
        .and_then(|b| b.limit)
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);

    tracing::info!(limit, "auto-interact requested");
    let summary = state.scheduler.trigger(limit, RunTrigger::Api).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "summary": summary })))
}

async fn create_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<CreatePostRequest>>,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let result = state
        .bot
        .create_post(PostRequest {
            topic: body.topic,
            game_id: body.game_id,
            community_id: body.community_id,
        })
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn should_interact(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i32>,
    body: web::Json<ShouldInteractRequest>,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let decision = state
        .bot
        .should_interact(path.into_inner(), body.interaction_type)
        .await?;
    Ok(HttpResponse::Ok().json(decision))
}

#[cfg(test)]
mod tests {
    use crate::api::config as api_config;
    use crate::api::test_support::{bearer, state, TOKEN};
    use crate::schema::posts;
    use crate::testing::{seed_post, seed_user, test_pool, ScriptedModel};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use diesel::prelude::*;
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_like_twice_over_http() {
        let (_dir, pool) = test_pool();
        let post_id = {
            let mut conn = pool.get().unwrap();
            let author = seed_user(&mut conn, "alice");
            seed_post(&mut conn, author.id, "Anyone have Valorant Jett tips?").id
        };
        let app = test::init_service(
            App::new()
                .app_data(state(&pool, ScriptedModel::always("YES"), Some(TOKEN)))
                .configure(api_config),
        )
        .await;

        let uri = format!("/api/bot/like/{post_id}");
        let req = test::TestRequest::post().uri(&uri).insert_header(bearer()).to_request();
        let first: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(first, json!({ "success": true, "message": "Post liked" }));

        let req = test::TestRequest::post().uri(&uri).insert_header(bearer()).to_request();
        let second: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(second, json!({ "success": true, "message": "Already liked" }));

        let mut conn = pool.get().unwrap();
        let likes: i32 = posts::table
            .find(post_id)
            .select(posts::likes_count)
            .first(&mut conn)
            .unwrap();
        assert_eq!(likes, 1);
    }

    #[actix_web::test]
    async fn test_unknown_post_is_404() {
        let (_dir, pool) = test_pool();
        let app = test::init_service(
            App::new()
                .app_data(state(&pool, ScriptedModel::always("YES"), Some(TOKEN)))
                .configure(api_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/bot/retweet/9999")
            .insert_header(bearer())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "post 9999 not found");
    }

    #[actix_web::test]
    async fn test_auto_interact_with_limit() {
        let (_dir, pool) = test_pool();
        let post_id = {
            let mut conn = pool.get().unwrap();
            let author = seed_user(&mut conn, "alice");
            seed_post(&mut conn, author.id, "Anyone have Valorant Jett tips?").id
        };
        let app = test::init_service(
            App::new()
                .app_data(state(&pool, ScriptedModel::always("YES"), Some(TOKEN)))
                .configure(api_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/bot/auto-interact")
            .insert_header(bearer())
            .set_json(json!({ "limit": 1 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["summary"]["processed"], 1);
        assert_eq!(body["summary"]["comments"], 1);
        assert_eq!(body["summary"]["likes"], 0);
        assert_eq!(body["summary"]["retweets"], 0);

        let mut conn = pool.get().unwrap();
        let (likes, comments, retweets): (i32, i32, i32) = posts::table
            .find(post_id)
            .select((posts::likes_count, posts::comments_count, posts::retweets_count))
            .first(&mut conn)
            .unwrap();
        assert_eq!((likes, comments, retweets), (0, 1, 0));
    }

    #[actix_web::test]
    async fn test_should_interact_preview() {
        let (_dir, pool) = test_pool();
        let post_id = {
            let mut conn = pool.get().unwrap();
            let author = seed_user(&mut conn, "alice");
            seed_post(&mut conn, author.id, "Anyone have Valorant Jett tips?").id
        };
        let app = test::init_service(
            App::new()
                .app_data(state(&pool, ScriptedModel::always("NO thanks"), Some(TOKEN)))
                .configure(api_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/bot/should-interact/{post_id}"))
            .insert_header(bearer())
            .set_json(json!({ "interaction_type": "comment" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["should_interact"], true);
        assert_eq!(body["metadata"]["override_applied"], true);

        let req = test::TestRequest::post()
            .uri(&format!("/api/bot/should-interact/{post_id}"))
            .insert_header(bearer())
            .set_json(json!({ "interaction_type": "dance" }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[actix_web::test]
    async fn test_create_post_without_body() {
        let (_dir, pool) = test_pool();
        let app = test::init_service(
            App::new()
                .app_data(state(&pool, ScriptedModel::always("tier lists are cope"), Some(TOKEN)))
                .configure(api_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/bot/create-post")
            .insert_header(bearer())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["post"]["content"], "tier lists are cope");
    }
}
