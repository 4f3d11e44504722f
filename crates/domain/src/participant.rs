use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

/// 市场平台中的账号角色。
///
/// 会话发起权限与在线状态播报都依赖这个区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Employer,
    Freelancer,
}

/// 聊天参与者。
///
/// 账号数据（注册、凭证）由外部账号系统持有，聊天核心只读取
/// 身份、展示信息和角色。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub role: ParticipantRole,
}

impl Participant {
    pub fn is_employer(&self) -> bool {
        matches!(self.role, ParticipantRole::Employer)
    }

    pub fn is_freelancer(&self) -> bool {
        matches!(self.role, ParticipantRole::Freelancer)
    }
}
