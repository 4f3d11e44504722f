//! 领域模型错误定义。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// 空消息：既没有文本也没有附件
    #[error("message has no text and no attachment")]
    EmptyMessage,

    /// 发送者和接收者相同
    #[error("sender and receiver must be different participants")]
    SelfAddressed,

    /// 参数验证失败
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 参与者不存在
    #[error("participant not found")]
    ParticipantNotFound,

    /// 房间不存在
    #[error("room not found")]
    RoomNotFound,

    /// 只有雇主可以发起会话
    #[error("only an employer may create a room")]
    NotAnEmployer,

    /// 房间的另一方必须是自由职业者
    #[error("room counterpart must be a freelancer")]
    NotAFreelancer,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 存储层错误类型，由仓储实现返回。
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// 底层存储失败
    #[error("storage error: {0}")]
    Storage(String),

    /// 记录不存在
    #[error("record not found")]
    NotFound,
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
