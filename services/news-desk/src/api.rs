//! News API
//!
//! Endpoints:
//! - GET    /api/news             paginated list, newest first
//! - POST   /api/news             create; generates content when none is supplied
//! - GET    /api/news/{id}        single document
//! - PUT    /api/news/{id}        partial update, optional AI edit via `instructions`
//! - DELETE /api/news/{id}        remove
//! - POST   /api/news/generate    generate or rewrite content without storing it
//!
//! Every generation call goes through the shared `KeyRotator`.

use std::future::Future;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use news_store::{NewNews, NewsUpdate};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::error::AppError;
use crate::prompts::{self, FormatOptions, NewsFormat, StoryBrief};
use crate::service::AppState;

const DEFAULT_PAGE_SIZE: usize = 10;

/// Routes under `/api/news`, to be merged into the main router.
pub fn news_router() -> Router<AppState> {
    Router::new()
        .route("/api/news", get(list_news).post(create_news))
        .route("/api/news/generate", post(generate))
        .route(
            "/api/news/{id}",
            get(get_news).put(update_news).delete(delete_news),
        )
}

/// Run a handler body, recording counters, duration and error responses.
async fn observed<T, F>(state: &AppState, route: &'static str, body: F) -> Response
where
    T: IntoResponse,
    F: Future<Output = Result<T, AppError>>,
{
    let _in_flight = state.metrics.begin();
    let started = Instant::now();

    let response = match body.await {
        Ok(value) => value.into_response(),
        Err(err) => {
            state.metrics.record_error();
            err.into_response()
        }
    };

    let status = response.status().as_u16();
    crate::metrics::record_request(route, status, started.elapsed().as_secs_f64());
    debug!(route, status, "request completed");
    response
}

/// Query parameters are parsed leniently: anything unparsable falls back to the default.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    page: Option<String>,
    page_size: Option<String>,
}

fn parse_positive(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .map(|v| v.max(1) as usize)
        .unwrap_or(default)
}

/// Blank strings count as absent.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

async fn list_news(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    observed(&state, "news.list", async {
        let page = parse_positive(query.page.as_deref(), 1);
        let page_size = parse_positive(query.page_size.as_deref(), DEFAULT_PAGE_SIZE);
        let result = state.store.list(page, page_size).await?;
        Ok(Json(result))
    })
    .await
}

#[derive(Debug, Default, Deserialize)]
struct CreateNewsRequest {
    title: Option<String>,
    category: Option<String>,
    location: Option<String>,
    brief: Option<String>,
    content: Option<String>,
}

async fn create_news(
    State(state): State<AppState>,
    Json(body): Json<CreateNewsRequest>,
) -> Response {
    observed(&state, "news.create", async {
        let title = prompts::safe_title(body.title.as_deref());

        let provided = body.content.as_deref().map(str::trim).unwrap_or("");
        let content = if provided.is_empty() {
            let story = StoryBrief {
                title: &title,
                category: body.category.as_deref(),
                location: body.location.as_deref(),
                brief: body.brief.as_deref(),
            };
            state
                .rotator
                .generate(&prompts::article_messages(&story))
                .await?
        } else {
            provided.to_owned()
        };

        let doc = state
            .store
            .insert(NewNews {
                title: prompts::derive_title(&content, &title),
                category: body.category,
                location: body.location,
                brief: body.brief,
                content,
            })
            .await?;

        info!(id = %doc.id, "news created");
        Ok((StatusCode::CREATED, Json(doc)))
    })
    .await
}

async fn get_news(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    observed(&state, "news.get", async {
        let doc = state.store.get(&id).await?.ok_or(AppError::NotFound)?;
        Ok(Json(doc))
    })
    .await
}

async fn delete_news(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    observed(&state, "news.delete", async {
        state.store.delete(&id).await?;
        info!(id, "news deleted");
        Ok(Json(serde_json::json!({ "ok": true })))
    })
    .await
}

#[derive(Debug, Default, Deserialize)]
struct UpdateNewsRequest {
    title: Option<String>,
    category: Option<String>,
    location: Option<String>,
    brief: Option<String>,
    /// Edit instructions for the model; the stored content is rewritten.
    instructions: Option<String>,
}

async fn update_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateNewsRequest>,
) -> Response {
    observed(&state, "news.update", async {
        let content = match non_blank(&body.instructions) {
            Some(instructions) => {
                let existing = state.store.get(&id).await?.ok_or(AppError::NotFound)?;
                let messages = prompts::edit_messages(&existing.content, instructions);
                Some(state.rotator.generate(&messages).await?)
            }
            None => None,
        };

        // A heading in edited content wins over the submitted title.
        let title = content
            .as_deref()
            .and_then(prompts::first_heading)
            .map(str::to_owned)
            .or(body.title)
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());

        let update = NewsUpdate {
            title,
            category: body.category,
            location: body.location,
            brief: body.brief,
            content,
        };

        let doc = state
            .store
            .update(&id, update)
            .await?
            .ok_or(AppError::NotFound)?;
        info!(id, "news updated");
        Ok(Json(doc))
    })
    .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_format")]
    format: Option<NewsFormat>,
    category: Option<String>,
    location: Option<String>,
    brief: Option<String>,
    base_content: Option<String>,
    instructions: Option<String>,
    #[serde(default)]
    options: FormatOptions,
}

/// Unrecognised formats fall back to the generic article prompt.
fn lenient_format<'de, D>(deserializer: D) -> Result<Option<NewsFormat>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        serde_json::from_value(value.clone())
            .inspect_err(|_| debug!(format = %value, "unknown format, using article prompt"))
            .ok()
    }))
}

async fn generate(State(state): State<AppState>, Json(body): Json<GenerateRequest>) -> Response {
    observed(&state, "news.generate", async {
        let title = prompts::safe_title(body.title.as_deref());
        let story = StoryBrief {
            title: &title,
            category: body.category.as_deref(),
            location: body.location.as_deref(),
            brief: body.brief.as_deref(),
        };

        let base_content = non_blank(&body.base_content);
        let instructions = non_blank(&body.instructions);

        let content = if base_content.is_some() || instructions.is_some() {
            debug!("rewrite flow");
            let messages = prompts::rewrite_messages(&story, base_content, instructions);
            state.rotator.generate(&messages).await?
        } else {
            debug!(format = ?body.format, "format flow");
            let messages = prompts::format_messages(&story, body.format, &body.options);
            let content = state.rotator.generate(&messages).await?;
            prompts::post_process(body.format, content)
        };

        Ok(Json(serde_json::json!({ "content": content })))
    })
    .await
}
