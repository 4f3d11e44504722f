//! 统一配置中心。
//!
//! 提供应用的全局配置管理，包括：
//! - 数据库连接
//! - JWT 认证
//! - 实时连接参数（队列容量、心跳、操作超时）
//! - 外部文件存储
//! - 服务监听地址

use serde::{Deserialize, Serialize};
use std::env;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub realtime: RealtimeConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// JWT 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

/// 实时连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// 每个连接的发送队列上限；写满即断开该连接，不阻塞其他连接
    pub send_queue_capacity: usize,
    /// 空闲超过该秒数的连接由服务端主动关闭
    pub heartbeat_timeout_secs: u64,
    /// 持久化与账号查询的超时上限（毫秒）
    pub operation_timeout_ms: u64,
}

/// 外部文件存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 对象存储上传端点（Cloudinary 风格的 multipart 接口）
    pub upload_url: String,
    pub upload_preset: Option<String>,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// 从环境变量加载配置。
    ///
    /// 关键安全配置（DATABASE_URL, JWT_SECRET）缺失时直接 panic，
    /// 避免生产环境落入不安全的默认值。
    pub fn from_env() -> Self {
        Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .expect("DATABASE_URL environment variable is required"),
                max_connections: env_parse("DB_MAX_CONNECTIONS", 5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").expect("JWT_SECRET environment variable is required"),
                expiration_hours: env_parse("JWT_EXPIRATION_HOURS", 24),
            },
            realtime: RealtimeConfig {
                send_queue_capacity: env_parse("SEND_QUEUE_CAPACITY", 64),
                heartbeat_timeout_secs: env_parse("HEARTBEAT_TIMEOUT_SECS", 60),
                operation_timeout_ms: env_parse("OPERATION_TIMEOUT_MS", 5_000),
            },
            storage: StorageConfig {
                upload_url: env::var("FILE_UPLOAD_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:9000/upload".to_string()),
                upload_preset: env::var("FILE_UPLOAD_PRESET").ok(),
            },
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parse("PORT", 8080),
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
