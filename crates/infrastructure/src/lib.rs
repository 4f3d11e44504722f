//! 基础设施层实现。
//!
//! 提供数据库仓储和外部文件存储适配器，实现应用层定义的接口。

pub mod migrations;
pub mod repository;
pub mod storage;

pub use migrations::MIGRATOR;
pub use repository::{
    create_pg_pool, PgMessageRepository, PgParticipantRepository, PgRoomRepository, PgStorage,
};
pub use storage::HttpFileStorage;
