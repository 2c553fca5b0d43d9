//! Interest message endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::broadcast::MessageBroadcaster;
use crate::error::{AppError, Result};
use crate::interest::InterestId;
use crate::server::AppState;
use crate::store::{InterestStore, MessagePage, MessageStore, StoredMessage};
use crate::websocket::ServerMessage;

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub interest_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: String,
    pub data: StoredMessage,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub success: bool,
    pub data: MessagePage,
}

/// POST /api/messages - Post a message into an interest room
#[tracing::instrument(name = "api.send_message", skip(state, auth, payload), fields(user_id = %auth.user_id))]
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: std::result::Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SendMessageResponse>)> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let (Some(raw_id), Some(text)) = (
        request.interest_id.filter(|s| !s.is_empty()),
        request.message.filter(|s| !s.trim().is_empty()),
    ) else {
        return Err(AppError::Validation(
            "interestId and message are required".to_string(),
        ));
    };

    let interest_id = parse_interest_id(&raw_id)?;

    let interest = state
        .interests
        .find_interest_by_id(&interest_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Interest not found".to_string()))?;

    if !interest.has_member(&auth.user_id) {
        return Err(AppError::Forbidden(
            "User is not a member of this interest".to_string(),
        ));
    }

    let stored = state
        .messages
        .persist_message(&interest_id, &auth.user_id, &text)
        .await?;

    let delivery = state
        .broadcaster
        .broadcast(&interest_id, ServerMessage::new_message(&stored))
        .await;

    tracing::info!(
        interest_id = %interest_id,
        message_id = %stored.id,
        delivered = delivery.delivered_to,
        "Message sent"
    );

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            success: true,
            message: "Message sent successfully".to_string(),
            data: stored,
        }),
    ))
}

/// GET /api/messages/{interest_id} - Page through an interest's history, newest first
pub async fn list_messages(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(raw_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<MessageListResponse>> {
    let interest_id = parse_interest_id(&raw_id)?;

    if state.interests.find_interest_by_id(&interest_id).await?.is_none() {
        return Err(AppError::NotFound("Interest not found".to_string()));
    }

    let page = query.page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let data = state.messages.list_messages(&interest_id, page, limit).await?;

    Ok(Json(MessageListResponse {
        success: true,
        data,
    }))
}

fn parse_interest_id(raw: &str) -> Result<InterestId> {
    InterestId::parse(raw).map_err(|e| AppError::Validation(e.to_string()))
}
