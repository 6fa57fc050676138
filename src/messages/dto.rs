use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Body posted by an anonymous sender.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub username: String,
    pub content: String,
}

/// Single inbox entry returned to the owner.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageItem {
    pub id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct ListMessagesResponse {
    pub success: bool,
    pub messages: Vec<MessageItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptStatusResponse {
    pub success: bool,
    pub is_accepting_messages: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAcceptResponse {
    pub success: bool,
    pub message: String,
    pub is_accepting_messages: bool,
}
