//! 应用层错误定义。

use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::storage::StorageError;

/// 应用层错误类型
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 领域层错误（验证失败、权限不足、资源不存在）
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// 存储层错误
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 外部文件存储错误
    #[error("file storage error: {0}")]
    Storage(#[from] StorageError),

    /// 持久化或账号查询超出时限
    #[error("operation timed out: {0}")]
    Timeout(&'static str),

    /// 基础设施错误
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure(message.into())
    }
}

/// 应用层结果类型
pub type ApplicationResult<T> = Result<T, ApplicationError>;
