use super::{validate_token, AppState};
use crate::bot_config::{self, BotConfig};
use crate::db;
use crate::error::CarlError;
use crate::ledger::{self, ActionType, ActivityFilter};
use crate::scheduler::RunTrigger;
use crate::settings::settings;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

#[derive(Debug, Default, Deserialize)]
struct ActivityQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    action_type: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigUpdate {
    key: String,
    value: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            .route("/scheduler/status", web::get().to(scheduler_status))
            .route("/scheduler/trigger", web::post().to(scheduler_trigger))
            .route("/activity", web::get().to(activity))
            .route("/activity/stats", web::get().to(activity_stats))
            .route("/bot-config", web::get().to(get_bot_config))
            .route("/bot-config", web::put().to(update_bot_config)),
    );
}

/// Accepts unix seconds, RFC 3339, or a plain `YYYY-MM-DD` date. A plain date
/// used as an end bound covers the whole day.
fn parse_date(value: &str, end_of_day: bool) -> Result<i64, CarlError> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return Ok(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(t) = time {
            return Ok(t.and_utc().timestamp());
        }
    }
    Err(CarlError::invalid(format!("invalid date '{value}'")))
}

fn activity_filter(query: ActivityQuery) -> Result<ActivityFilter, CarlError> {
    let s = settings();
    let paging = &s.ledger;
    let action_type = query
        .action_type
        .as_deref()
        .filter(|a| !a.is_empty())
        .map(|a| ActionType::from_str(a).map_err(|_| CarlError::invalid(format!("unknown action type '{a}'"))))
        .transpose()?;

    Ok(ActivityFilter {
        action_type,
        start: query.start_date.as_deref().map(|d| parse_date(d, false)).transpose()?,
        end: query.end_date.as_deref().map(|d| parse_date(d, true)).transpose()?,
        limit: query
            .limit
            .unwrap_or(paging.default_page_size)
            .clamp(1, paging.max_page_size),
        offset: query.offset.unwrap_or(0).max(0),
    })
}

async fn scheduler_status(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    Ok(HttpResponse::Ok().json(state.scheduler.status()?))
}

async fn scheduler_trigger(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let limit = settings().scheduler.candidate_limit;
    let summary = state.scheduler.trigger(limit, RunTrigger::Admin).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "summary": summary })))
}

async fn activity(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ActivityQuery>,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let filter = activity_filter(query.into_inner())?;
    let mut conn = state.bot.pool().get()?;
    let (activities, total) = ledger::recent(&mut conn, state.bot.id(), &filter)?;

    Ok(HttpResponse::Ok().json(json!({
        "activities": activities,
        "total": total,
        "limit": filter.limit,
        "offset": filter.offset,
    })))
}

async fn activity_stats(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let now = db::now();
    let mut conn = state.bot.pool().get()?;
    let last_24h = ledger::stats(&mut conn, state.bot.id(), now - 86400)?;
    let last_7d = ledger::stats(&mut conn, state.bot.id(), now - 7 * 86400)?;

    Ok(HttpResponse::Ok().json(json!({ "last_24h": last_24h, "last_7d": last_7d })))
}

async fn get_bot_config(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let mut conn = state.bot.pool().get()?;
    let config = BotConfig::load(&mut conn)?;
    let entries = bot_config::entries(&mut conn)?;

    Ok(HttpResponse::Ok().json(json!({ "config": config, "entries": entries })))
}

async fn update_bot_config(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ConfigUpdate>,
) -> Result<HttpResponse, CarlError> {
    if let Err(resp) = validate_token(&state, &req) {
        return Ok(resp);
    }
    let ConfigUpdate { key, value } = body.into_inner();
    if key.trim().is_empty() {
        return Err(CarlError::invalid("key is required"));
    }
    BotConfig::validate(&key, &value).map_err(CarlError::invalid)?;

    let mut conn = state.bot.pool().get()?;
    let entry = bot_config::set(&mut conn, &key, &value)?;
    tracing::info!(key = %entry.key, value = %entry.value, "bot config updated");

    Ok(HttpResponse::Ok().json(json!({ "success": true, "entry": entry })))
}
