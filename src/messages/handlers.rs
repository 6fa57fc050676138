use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{repo::User, services::AuthUser},
    error::{Ack, ApiError},
    messages::{
        dto::{
            AcceptStatusResponse, ListMessagesResponse, MessageItem, SendMessageRequest,
            UpdateAcceptResponse,
        },
        repo::Message,
        services::{parse_accept_flag, validate_message_content},
    },
    state::AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/messages/send", post(send_message))
}

pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/messages", get(list_messages))
        .route("/messages/:id", delete(delete_message))
        .route(
            "/messages/accept",
            get(accept_status).post(update_accept),
        )
}

#[instrument(skip(state, payload))]
pub async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<Ack>, ApiError> {
    let user = User::find_by_username(&state.db, &payload.username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if !user.is_accepting_messages {
        warn!(username = %user.username, "recipient not accepting messages");
        return Err(ApiError::NotAccepting);
    }

    if let Err(msg) = validate_message_content(&payload.content) {
        return Err(ApiError::InvalidInput(msg.into()));
    }

    let message = Message::append(&state.db, user.id, &payload.content).await?;
    info!(user_id = %user.id, message_id = %message.id, "message delivered");
    Ok(Json(Ack::ok("Message sent successfully")))
}

#[instrument(skip(state))]
pub async fn accept_status(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<AcceptStatusResponse>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(AcceptStatusResponse {
        success: true,
        is_accepting_messages: user.is_accepting_messages,
    }))
}

#[instrument(skip(state, body))]
pub async fn update_accept(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<UpdateAcceptResponse>, ApiError> {
    let accepting = parse_accept_flag(&body)?;

    let user = User::set_accepting(&state.db, claims.sub, accepting)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %user.id, accepting, "acceptance flag updated");
    Ok(Json(UpdateAcceptResponse {
        success: true,
        message: "Message acceptance status updated successfully".into(),
        is_accepting_messages: user.is_accepting_messages,
    }))
}

#[instrument(skip(state))]
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ListMessagesResponse>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let messages = Message::list_for_user(&state.db, user.id)
        .await?
        .into_iter()
        .map(|m| MessageItem {
            id: m.id,
            content: m.content,
            created_at: m.created_at,
        })
        .collect();

    Ok(Json(ListMessagesResponse {
        success: true,
        messages,
    }))
}

#[instrument(skip(state))]
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ack>, ApiError> {
    let removed = Message::delete_owned(&state.db, claims.sub, id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound(
            "Message not found or already deleted".into(),
        ));
    }

    info!(user_id = %claims.sub, message_id = %id, "message deleted");
    Ok(Json(Ack::ok("Message deleted successfully")))
}
