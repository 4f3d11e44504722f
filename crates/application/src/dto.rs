//! 面向客户端的数据传输对象。
//!
//! 字段名统一使用 camelCase，与实时事件表和 REST 接口保持一致。

use std::collections::HashMap;

use domain::{DirectMessage, Room, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub created_at: Timestamp,
    pub is_read: bool,
}

impl From<&DirectMessage> for MessageDto {
    fn from(message: &DirectMessage) -> Self {
        Self {
            id: message.id.as_str().to_owned(),
            sender_id: Uuid::from(message.sender_id),
            receiver_id: Uuid::from(message.receiver_id),
            text: message.text.clone(),
            file_url: message.attachment.as_ref().map(|a| a.url.clone()),
            file_name: message.attachment.as_ref().map(|a| a.name.clone()),
            file_type: message.attachment.as_ref().map(|a| a.mime_type.clone()),
            created_at: message.created_at,
            is_read: message.is_read,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDto {
    pub id: Uuid,
    pub name: String,
    pub employer_id: Uuid,
    pub freelancer_id: Uuid,
    pub created_at: Timestamp,
}

impl From<&Room> for RoomDto {
    fn from(room: &Room) -> Self {
        Self {
            id: Uuid::from(room.id),
            name: room.name.clone(),
            employer_id: Uuid::from(room.employer_id),
            freelancer_id: Uuid::from(room.freelancer_id),
            created_at: room.created_at,
        }
    }
}

/// 自由职业者房间列表项：房间 + 雇主展示信息 + 当前未读数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummaryDto {
    #[serde(flatten)]
    pub room: RoomDto,
    pub employer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employer_avatar_url: Option<String>,
    pub unread_count: u64,
}

/// 活跃会话摘要：对端信息 + 最后一条消息 + 未读数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummaryDto {
    pub peer_id: Uuid,
    pub peer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_avatar_url: Option<String>,
    pub last_message: MessageDto,
    pub unread_count: u64,
}

/// 未读计数快照：对端 ID → 未读条数。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnreadSnapshot(pub HashMap<Uuid, u64>);
