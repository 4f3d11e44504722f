//! 实时通道事件定义。
//!
//! 客户端与服务端之间的所有实时事件都用带标签的枚举表达，
//! 在连接边界完成一次反序列化校验后再进入分发逻辑，
//! 取代原系统里无类型的事件总线负载。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::MessageDto;

/// 客户端 → 服务端事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// 发送消息；`id` 是客户端生成的幂等键
    #[serde(rename_all = "camelCase")]
    SendMessage {
        id: String,
        sender_id: Uuid,
        receiver_id: Uuid,
        #[serde(default)]
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_type: Option<String>,
    },
    /// 阅读回执：reader（= receiverId）已读完 senderId 发来的消息
    #[serde(rename_all = "camelCase")]
    MarkAsRead { sender_id: Uuid, receiver_id: Uuid },
    /// 正在输入
    #[serde(rename_all = "camelCase")]
    Typing { receiver_id: Uuid },
    /// 停止输入
    #[serde(rename_all = "camelCase")]
    StopTyping { receiver_id: Uuid },
    /// 进入会话房间（聚焦信号）
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: Uuid },
    /// 请求在线用户快照并订阅后续上下线推送
    RequestOnlineUsers,
}

/// 服务端 → 客户端事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// 完整的已持久化消息，含服务端分配的时间戳
    ReceiveMessage {
        #[serde(flatten)]
        message: MessageDto,
    },
    /// 阅读回执推送给原发送者；负载与 markAsRead 请求一致
    #[serde(rename_all = "camelCase")]
    MessagesRead { sender_id: Uuid, receiver_id: Uuid },
    /// 对端正在输入
    #[serde(rename_all = "camelCase")]
    Typing { sender_id: Uuid },
    /// 对端停止输入
    #[serde(rename_all = "camelCase")]
    StopTyping { sender_id: Uuid },
    /// 上线通知
    #[serde(rename_all = "camelCase")]
    UserOnline { user_id: Uuid },
    /// 下线通知
    #[serde(rename_all = "camelCase")]
    UserOffline { user_id: Uuid },
    /// 在线用户快照（对 requestOnlineUsers 的应答）
    #[serde(rename_all = "camelCase")]
    OnlineUsers { user_ids: Vec<Uuid> },
    /// 请求级错误，发回给产生请求的连接
    Error { code: String, message: String },
}

impl ServerEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}
