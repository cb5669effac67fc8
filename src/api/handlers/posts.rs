//! Posts, replies and their likes

use crate::api::handlers::stacks::LikeResponse;
use crate::api::state::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::error::Result;
use crate::types::{NewPost, Post, PostId, PostReply, PostThread, ReplyId, StackId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

pub async fn list_posts(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(stack): Path<StackId>,
) -> Result<Json<Vec<PostThread>>> {
    let threads = state
        .community()
        .threads(stack, viewer.map(|u| u.id))
        .await?;
    Ok(Json(threads))
}

pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(stack): Path<StackId>,
    Json(input): Json<NewPost>,
) -> Result<(StatusCode, Json<Post>)> {
    let post = state
        .community()
        .create_post(user.id, stack, input, Utc::now().date_naive())
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<PostId>,
) -> Result<StatusCode> {
    state.community().delete_post(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub content: String,
}

pub async fn reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<PostId>,
    Json(request): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<PostReply>)> {
    let reply = state.community().reply(user.id, id, &request.content).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<PostId>,
) -> Result<Json<LikeResponse>> {
    let liked = state.community().toggle_post_like(user.id, id).await?;
    Ok(Json(LikeResponse { liked }))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<ReplyId>,
) -> Result<StatusCode> {
    state.community().delete_reply(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<ReplyId>,
) -> Result<Json<LikeResponse>> {
    let liked = state.community().toggle_reply_like(user.id, id).await?;
    Ok(Json(LikeResponse { liked }))
}
