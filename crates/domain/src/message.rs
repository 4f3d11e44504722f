use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{MessageId, Timestamp, UserId};

/// 文件附件引用。
///
/// 二进制内容存放在外部对象存储，这里只保存返回的 URL 和展示信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub url: String,
    pub name: String,
    pub mime_type: String,
}

/// 两个参与者之间的一条私信。
///
/// 入库后除 `is_read` 外不可变；`is_read` 只允许 false→true 单向翻转。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    pub attachment: Option<FileAttachment>,
    pub created_at: Timestamp,
    pub is_read: bool,
}

impl DirectMessage {
    pub fn new(
        id: MessageId,
        sender_id: UserId,
        receiver_id: UserId,
        text: impl Into<String>,
        attachment: Option<FileAttachment>,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        if sender_id == receiver_id {
            return Err(DomainError::SelfAddressed);
        }

        let text = text.into();
        // 文本可以为空，但此时必须带附件
        if text.trim().is_empty() && attachment.is_none() {
            return Err(DomainError::EmptyMessage);
        }

        Ok(Self {
            id,
            sender_id,
            receiver_id,
            text,
            attachment,
            created_at,
            is_read: false,
        })
    }

    /// 标记为已读。单向且幂等：已读消息不会被翻回未读。
    pub fn mark_read(&mut self) {
        self.is_read = true;
    }
}
