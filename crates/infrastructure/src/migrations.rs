use sqlx::migrate::Migrator;

/// 内嵌的数据库迁移，启动时由主程序执行。
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");
