//! 外部文件存储接口。
//!
//! 二进制内容交给外部对象存储（上传后返回 URL），聊天核心
//! 只保留返回的附件引用。

use async_trait::async_trait;
use domain::FileAttachment;
use thiserror::Error;

/// 待上传的文件。
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    Upload(String),
}

impl StorageError {
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// 上传文件并返回可分发的附件引用。
    async fn store(&self, upload: UploadRequest) -> Result<FileAttachment, StorageError>;
}
