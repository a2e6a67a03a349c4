//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{protocol::ChapterSummary, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use quillify_core::{format_word_count, story_word_count};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_chapters_handler,
        story_stats_handler,
    ),
    components(
        schemas(ChapterSummary, StoryStatsResponse)
    ),
    tags(
        (name = "Quillify API", description = "Chapter listings and story statistics for the story editor.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// Aggregate statistics shown next to a story in the catalog.
#[derive(Serialize, ToSchema)]
pub struct StoryStatsResponse {
    pub story_id: Uuid,
    pub chapter_count: usize,
    pub word_count: usize,
    pub word_count_label: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The service is up"))
)]
pub async fn health_handler() -> &'static str {
    "ok"
}

/// List a story's chapters in reading order, with per-chapter word counts.
#[utoipa::path(
    get,
    path = "/stories/{story_id}/chapters",
    responses(
        (status = 200, description = "Chapters sorted by order index", body = [ChapterSummary]),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("story_id" = Uuid, Path, description = "The unique ID of the story.")
    )
)]
pub async fn list_chapters_handler(
    State(app_state): State<Arc<AppState>>,
    Path(story_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let chapters = app_state.chapters.list_chapters(story_id).await.map_err(|e| {
        error!("Failed to list chapters for story {}: {:?}", story_id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load chapters".to_string(),
        )
    })?;

    let summaries: Vec<ChapterSummary> = chapters.iter().map(ChapterSummary::from).collect();
    Ok(Json(summaries))
}

/// Total word count of a story across all of its chapters.
#[utoipa::path(
    get,
    path = "/stories/{story_id}/stats",
    responses(
        (status = 200, description = "Aggregate story statistics", body = StoryStatsResponse),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("story_id" = Uuid, Path, description = "The unique ID of the story.")
    )
)]
pub async fn story_stats_handler(
    State(app_state): State<Arc<AppState>>,
    Path(story_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let chapters = app_state.chapters.list_chapters(story_id).await.map_err(|e| {
        error!("Failed to compute stats for story {}: {:?}", story_id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load chapters".to_string(),
        )
    })?;

    let word_count = story_word_count(&chapters);
    Ok(Json(StoryStatsResponse {
        story_id,
        chapter_count: chapters.len(),
        word_count,
        word_count_label: format_word_count(word_count),
    }))
}
