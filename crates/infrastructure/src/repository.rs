//! Postgres 仓储实现。
//!
//! `messages.seq` 是持久化顺序列：所有历史查询都按它排序，
//! 保证读出的顺序与写入顺序一致。幂等写入靠主键冲突时的
//! `DO NOTHING` + 回读实现。

use std::sync::Arc;

use application::repository::{
    InsertOutcome, MessageRepository, ParticipantRepository, RoomRepository, UnreadRow,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    DirectMessage, FileAttachment, MessageId, Participant, ParticipantRole, RepositoryError, Room,
    RoomId, UserId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct ParticipantRecord {
    id: Uuid,
    username: String,
    avatar_url: Option<String>,
    role: String,
}

impl TryFrom<ParticipantRecord> for Participant {
    type Error = RepositoryError;

    fn try_from(value: ParticipantRecord) -> Result<Self, Self::Error> {
        let role = match value.role.as_str() {
            "employer" => ParticipantRole::Employer,
            "freelancer" => ParticipantRole::Freelancer,
            other => return Err(invalid_data(format!("unknown participant role: {other}"))),
        };

        Ok(Participant {
            id: UserId::from(value.id),
            username: value.username,
            avatar_url: value.avatar_url,
            role,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: String,
    sender_id: Uuid,
    receiver_id: Uuid,
    text: String,
    file_url: Option<String>,
    file_name: Option<String>,
    file_type: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for DirectMessage {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let id = MessageId::parse(value.id).map_err(|err| invalid_data(err.to_string()))?;
        let attachment = value.file_url.map(|url| FileAttachment {
            url,
            name: value.file_name.unwrap_or_default(),
            mime_type: value.file_type.unwrap_or_default(),
        });

        Ok(DirectMessage {
            id,
            sender_id: UserId::from(value.sender_id),
            receiver_id: UserId::from(value.receiver_id),
            text: value.text,
            attachment,
            created_at: value.created_at,
            is_read: value.is_read,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoomRecord {
    id: Uuid,
    name: String,
    employer_id: Uuid,
    freelancer_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<RoomRecord> for Room {
    fn from(value: RoomRecord) -> Self {
        Room {
            id: RoomId::from(value.id),
            name: value.name,
            employer_id: UserId::from(value.employer_id),
            freelancer_id: UserId::from(value.freelancer_id),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct UnreadRecord {
    receiver_id: Uuid,
    sender_id: Uuid,
    count: i64,
}

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, text, file_url, file_name, file_type, is_read, created_at";

#[derive(Clone)]
pub struct PgParticipantRepository {
    pool: PgPool,
}

impl PgParticipantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantRepository for PgParticipantRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Participant>, RepositoryError> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            "SELECT id, username, avatar_url, role FROM participants WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Participant::try_from).transpose()
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(&self, message: DirectMessage) -> Result<InsertOutcome, RepositoryError> {
        let (file_url, file_name, file_type) = match &message.attachment {
            Some(attachment) => (
                Some(attachment.url.as_str()),
                Some(attachment.name.as_str()),
                Some(attachment.mime_type.as_str()),
            ),
            None => (None, None, None),
        };

        let inserted = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, text, file_url, file_name, file_type, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(message.id.as_str())
        .bind(Uuid::from(message.sender_id))
        .bind(Uuid::from(message.receiver_id))
        .bind(&message.text)
        .bind(file_url)
        .bind(file_name)
        .bind(file_type)
        .bind(message.is_read)
        .bind(message.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if let Some(record) = inserted {
            return Ok(InsertOutcome::Inserted(DirectMessage::try_from(record)?));
        }

        // 幂等键冲突：回读库中的规范记录
        let existing = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(message.id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(InsertOutcome::Duplicate(DirectMessage::try_from(existing)?))
    }

    async fn conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<DirectMessage>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY seq
            "#
        ))
        .bind(Uuid::from(user_a))
        .bind(Uuid::from(user_b))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(DirectMessage::try_from).collect()
    }

    async fn mark_read(&self, reader: UserId, peer: UserId) -> Result<u64, RepositoryError> {
        // 单条 UPDATE 即是原子批量翻转；已读行不受影响
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE WHERE receiver_id = $1 AND sender_id = $2 AND NOT is_read",
        )
        .bind(Uuid::from(reader))
        .bind(Uuid::from(peer))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(result.rows_affected())
    }

    async fn unread_totals(&self) -> Result<Vec<UnreadRow>, RepositoryError> {
        let records = sqlx::query_as::<_, UnreadRecord>(
            r#"
            SELECT receiver_id, sender_id, COUNT(*) AS count
            FROM messages
            WHERE NOT is_read
            GROUP BY receiver_id, sender_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records
            .into_iter()
            .map(|record| UnreadRow {
                receiver_id: UserId::from(record.receiver_id),
                sender_id: UserId::from(record.sender_id),
                count: record.count.max(0) as u64,
            })
            .collect())
    }

    async fn latest_per_peer(
        &self,
        user: UserId,
    ) -> Result<Vec<(UserId, DirectMessage)>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            SELECT DISTINCT ON (CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END)
                   {MESSAGE_COLUMNS}
            FROM messages
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END, seq DESC
            "#
        ))
        .bind(Uuid::from(user))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records
            .into_iter()
            .map(|record| {
                let message = DirectMessage::try_from(record)?;
                let peer = if message.sender_id == user {
                    message.receiver_id
                } else {
                    message.sender_id
                };
                Ok((peer, message))
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn create_or_get(&self, room: Room) -> Result<Room, RepositoryError> {
        let inserted = sqlx::query_as::<_, RoomRecord>(
            r#"
            INSERT INTO rooms (id, name, employer_id, freelancer_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (employer_id, freelancer_id) DO NOTHING
            RETURNING id, name, employer_id, freelancer_id, created_at
            "#,
        )
        .bind(Uuid::from(room.id))
        .bind(&room.name)
        .bind(Uuid::from(room.employer_id))
        .bind(Uuid::from(room.freelancer_id))
        .bind(room.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if let Some(record) = inserted {
            return Ok(Room::from(record));
        }

        // 同一对参与者的房间已存在，返回既有记录
        let existing = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, name, employer_id, freelancer_id, created_at
            FROM rooms WHERE employer_id = $1 AND freelancer_id = $2
            "#,
        )
        .bind(Uuid::from(room.employer_id))
        .bind(Uuid::from(room.freelancer_id))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(Room::from(existing))
    }

    async fn list_for_freelancer(
        &self,
        freelancer_id: UserId,
    ) -> Result<Vec<Room>, RepositoryError> {
        let records = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, name, employer_id, freelancer_id, created_at
            FROM rooms WHERE freelancer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(Uuid::from(freelancer_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Room::from).collect())
    }
}

pub struct PgStorage {
    pub pool: PgPool,
    pub participant_repository: Arc<PgParticipantRepository>,
    pub message_repository: Arc<PgMessageRepository>,
    pub room_repository: Arc<PgRoomRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            participant_repository: Arc::new(PgParticipantRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            room_repository: Arc::new(PgRoomRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
