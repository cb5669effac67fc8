//! Stack pages and stack/item mutations

use crate::api::state::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::error::{Result, StackShareError};
use crate::insights::{AnalyticsRange, CategoryGroup, DailyStats};
use crate::services::ImageUpload;
use crate::types::{
    ActiveStack, DailyLog, ItemFields, ItemId, ItemType, LogEntry, NewStack, Stack, StackCard,
    StackDetail, StackId, StackItem, StackUpdate,
};
use crate::utils::string::blank_to_none;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Form, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

fn stack_page(id: StackId) -> Redirect {
    Redirect::to(&format!("/dashboard/stacks/{}", id))
}

#[derive(Debug, Deserialize)]
pub struct CreateStackForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Form post from the "new stack" dialog; redirects to the new stack
pub async fn create_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CreateStackForm>,
) -> Result<Redirect> {
    let stack = state
        .stacks()
        .create_stack(
            &user,
            NewStack {
                name: form.name.unwrap_or_default(),
                description: form.description,
                purpose: None,
                is_public: false,
            },
        )
        .await?;
    state.cache.revalidate_stacks();
    Ok(stack_page(stack.id))
}

pub async fn delete_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<StackId>,
) -> Result<impl IntoResponse> {
    state.stacks().delete_stack(user.id, id).await?;
    // logs that referenced the stack are detached, so both pages change
    state.cache.revalidate_logs();
    Ok((StatusCode::OK, "OK"))
}

/// Multipart item form with an optional `image` file
pub async fn add_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<StackId>,
    mut multipart: Multipart,
) -> Result<Redirect> {
    let mut item_type = None;
    let mut name = None;
    let mut description = None;
    let mut dosage = None;
    let mut frequency = None;
    let mut timing = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StackShareError::Validation(format!("Invalid form: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        if field_name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| StackShareError::Validation(format!("Invalid image: {}", e)))?;
            if !bytes.is_empty() {
                image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| StackShareError::Validation(format!("Invalid form: {}", e)))?;
        let value = blank_to_none(Some(value));
        match field_name.as_str() {
            "type" => item_type = value,
            "name" => name = value,
            "description" => description = value,
            "dosage" => dosage = value,
            "frequency" => frequency = value,
            "timing" => timing = value,
            _ => {}
        }
    }

    let (Some(item_type), Some(name)) = (item_type, name) else {
        return Err(StackShareError::Validation(
            "Type and name are required".to_string(),
        ));
    };

    let fields = ItemFields {
        item_type: item_type.parse::<ItemType>()?,
        name,
        description,
        dosage,
        frequency,
        timing,
    };
    state.stacks().add_item(user.id, id, fields, image).await?;
    state.cache.revalidate_stacks();
    Ok(stack_page(id))
}

pub async fn stack_detail(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<StackId>,
) -> Result<Json<StackDetail>> {
    let detail = state.stacks().detail(id, viewer.map(|u| u.id)).await?;
    Ok(Json(detail))
}

pub async fn update_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<StackId>,
    Json(update): Json<StackUpdate>,
) -> Result<Json<Stack>> {
    let stack = state.stacks().update_stack(user.id, id, update).await?;
    state.cache.revalidate_stacks();
    Ok(Json(stack))
}

#[derive(Debug, Serialize)]
pub struct ForkResponse {
    pub id: StackId,
}

pub async fn fork_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<StackId>,
) -> Result<Json<ForkResponse>> {
    let fork = state.stacks().fork_stack(&user, id).await?;
    state.cache.revalidate_stacks();
    info!("User {} forked stack {} into {}", user.id, id, fork.id);
    Ok(Json(ForkResponse { id: fork.id }))
}

pub async fn activate_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<StackId>,
) -> Result<Json<ActiveStack>> {
    Ok(Json(state.stacks().activate(user.id, id).await?))
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
}

pub async fn like_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<StackId>,
) -> Result<Json<LikeResponse>> {
    let liked = state.stacks().toggle_like(user.id, id).await?;
    state.cache.revalidate_stacks();
    Ok(Json(LikeResponse { liked }))
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub saved: bool,
}

pub async fn save_stack(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<StackId>,
) -> Result<Json<SaveResponse>> {
    let saved = state.stacks().toggle_save(user.id, id).await?;
    Ok(Json(SaveResponse { saved }))
}

/// The user's bookmarked stacks
pub async fn saved_stacks(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<StackCard>>> {
    Ok(Json(state.stacks().saved(user.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default)]
    pub range: Option<String>,
}

pub async fn stack_analytics(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<StackId>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<Vec<DailyStats>>> {
    let range = match params.range.as_deref() {
        Some(r) => r.parse::<AnalyticsRange>()?,
        None => AnalyticsRange::default(),
    };
    let stats = state
        .stacks()
        .analytics(
            id,
            viewer.map(|u| u.id),
            range,
            Utc::now().date_naive(),
            state.retry,
        )
        .await?;
    Ok(Json(stats))
}

pub async fn check_in(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<StackId>,
    Json(entry): Json<LogEntry>,
) -> Result<Json<DailyLog>> {
    let log = state
        .journal()
        .check_in(user.id, id, entry, Utc::now().date_naive())
        .await?;
    state.cache.revalidate_logs();
    Ok(Json(log))
}

pub async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, item_id)): Path<(StackId, ItemId)>,
    Json(fields): Json<ItemFields>,
) -> Result<Json<StackItem>> {
    let item = state.stacks().update_item(user.id, id, item_id, fields).await?;
    state.cache.revalidate_stacks();
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, item_id)): Path<(StackId, ItemId)>,
) -> Result<Redirect> {
    state.stacks().delete_item(user.id, id, item_id).await?;
    state.cache.revalidate_stacks();
    Ok(stack_page(id))
}

#[derive(Debug, Serialize)]
pub struct MyStacks {
    pub groups: Vec<CategoryGroup>,
    pub active_stack_id: Option<StackId>,
}

pub async fn my_stacks(State(state): State<AppState>, user: CurrentUser) -> Result<Json<MyStacks>> {
    let stacks = state.stacks();
    let groups = stacks.organized(user.id, Utc::now()).await?;
    let active_stack_id = stacks.active_stack(user.id).await?.map(|a| a.stack_id);
    Ok(Json(MyStacks {
        groups,
        active_stack_id,
    }))
}

pub async fn active_stack(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Option<ActiveStack>>> {
    Ok(Json(state.stacks().active_stack(user.id).await?))
}

pub async fn untrack(State(state): State<AppState>, user: CurrentUser) -> Result<StatusCode> {
    if state.stacks().untrack(user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StackShareError::NotFound("No active stack".to_string()))
    }
}
