//! 外部对象存储适配器。
//!
//! 文件内容通过 HTTP 转发给托管的上传端点（预设签名方式），
//! 返回的 URL 作为附件引用随消息分发。

use application::storage::{FileStorage, StorageError, UploadRequest};
use async_trait::async_trait;
use domain::FileAttachment;
use serde::Deserialize;

pub struct HttpFileStorage {
    client: reqwest::Client,
    upload_url: String,
    upload_preset: String,
}

impl HttpFileStorage {
    pub fn new(upload_url: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: upload_url.into(),
            upload_preset: upload_preset.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[async_trait]
impl FileStorage for HttpFileStorage {
    async fn store(&self, upload: UploadRequest) -> Result<FileAttachment, StorageError> {
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|err| StorageError::upload(err.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .part("file", part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| StorageError::upload(err.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::upload(format!(
                "upload endpoint returned {}",
                response.status()
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|err| StorageError::upload(err.to_string()))?;

        tracing::debug!(file_name = %upload.file_name, url = %body.secure_url, "文件上传完成");

        Ok(FileAttachment {
            url: body.secure_url,
            name: upload.file_name,
            mime_type: upload.content_type,
        })
    }
}
