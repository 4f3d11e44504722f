//! 仓储接口定义。
//!
//! 消息存储与账号查询都是外部协作者，应用层只依赖这些抽象。
//! `memory` 子模块提供内存实现，供单元测试使用。

use async_trait::async_trait;
use domain::{DirectMessage, Participant, RepositoryError, Room, UserId};

/// 幂等写入的结果：首次入库，或命中已有幂等键。
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// 消息首次持久化
    Inserted(DirectMessage),
    /// 幂等键已存在，返回库中的规范记录
    Duplicate(DirectMessage),
}

impl InsertOutcome {
    pub fn into_message(self) -> DirectMessage {
        match self {
            Self::Inserted(message) | Self::Duplicate(message) => message,
        }
    }
}

/// 启动时未读计数重建用的聚合行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadRow {
    pub receiver_id: UserId,
    pub sender_id: UserId,
    pub count: u64,
}

#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Participant>, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 按幂等键写入消息。同一键的重试返回 `Duplicate`，绝不重复入库。
    async fn insert(&self, message: DirectMessage) -> Result<InsertOutcome, RepositoryError>;

    /// 两名参与者之间的完整历史，按持久化顺序排列。
    async fn conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<DirectMessage>, RepositoryError>;

    /// 把 peer 发给 reader 的所有未读消息原子地标记为已读，
    /// 返回实际翻转的条数。已读消息不受影响（单向转换）。
    async fn mark_read(&self, reader: UserId, peer: UserId) -> Result<u64, RepositoryError>;

    /// 全表未读行聚合，按 (receiver, sender) 分组，用于启动播种。
    async fn unread_totals(&self) -> Result<Vec<UnreadRow>, RepositoryError>;

    /// 该用户参与的每个会话的最后一条消息，按对端分组。
    async fn latest_per_peer(
        &self,
        user: UserId,
    ) -> Result<Vec<(UserId, DirectMessage)>, RepositoryError>;
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// 按 (employer, freelancer) 对幂等创建：已存在时返回既有房间。
    async fn create_or_get(&self, room: Room) -> Result<Room, RepositoryError>;

    /// 自由职业者参与的全部房间。
    async fn list_for_freelancer(
        &self,
        freelancer_id: UserId,
    ) -> Result<Vec<Room>, RepositoryError>;
}

/// 内存实现，用于测试。
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct MemoryParticipantRepository {
        participants: RwLock<HashMap<UserId, Participant>>,
    }

    impl MemoryParticipantRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn add(&self, participant: Participant) {
            let mut participants = self.participants.write().await;
            participants.insert(participant.id, participant);
        }
    }

    #[async_trait]
    impl ParticipantRepository for MemoryParticipantRepository {
        async fn find_by_id(&self, id: UserId) -> Result<Option<Participant>, RepositoryError> {
            let participants = self.participants.read().await;
            Ok(participants.get(&id).cloned())
        }
    }

    /// Vec 的插入顺序即持久化顺序，与数据库里的序列号列等价。
    #[derive(Default)]
    pub struct MemoryMessageRepository {
        messages: RwLock<Vec<DirectMessage>>,
    }

    impl MemoryMessageRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl MessageRepository for MemoryMessageRepository {
        async fn insert(&self, message: DirectMessage) -> Result<InsertOutcome, RepositoryError> {
            let mut messages = self.messages.write().await;
            if let Some(existing) = messages.iter().find(|m| m.id == message.id) {
                return Ok(InsertOutcome::Duplicate(existing.clone()));
            }
            messages.push(message.clone());
            Ok(InsertOutcome::Inserted(message))
        }

        async fn conversation(
            &self,
            user_a: UserId,
            user_b: UserId,
        ) -> Result<Vec<DirectMessage>, RepositoryError> {
            let messages = self.messages.read().await;
            Ok(messages
                .iter()
                .filter(|m| {
                    (m.sender_id == user_a && m.receiver_id == user_b)
                        || (m.sender_id == user_b && m.receiver_id == user_a)
                })
                .cloned()
                .collect())
        }

        async fn mark_read(&self, reader: UserId, peer: UserId) -> Result<u64, RepositoryError> {
            let mut messages = self.messages.write().await;
            let mut flipped = 0;
            for message in messages.iter_mut() {
                if message.receiver_id == reader && message.sender_id == peer && !message.is_read {
                    message.mark_read();
                    flipped += 1;
                }
            }
            Ok(flipped)
        }

        async fn unread_totals(&self) -> Result<Vec<UnreadRow>, RepositoryError> {
            let messages = self.messages.read().await;
            let mut totals: HashMap<(UserId, UserId), u64> = HashMap::new();
            for message in messages.iter().filter(|m| !m.is_read) {
                *totals
                    .entry((message.receiver_id, message.sender_id))
                    .or_insert(0) += 1;
            }
            Ok(totals
                .into_iter()
                .map(|((receiver_id, sender_id), count)| UnreadRow {
                    receiver_id,
                    sender_id,
                    count,
                })
                .collect())
        }

        async fn latest_per_peer(
            &self,
            user: UserId,
        ) -> Result<Vec<(UserId, DirectMessage)>, RepositoryError> {
            let messages = self.messages.read().await;
            let mut latest: HashMap<UserId, DirectMessage> = HashMap::new();
            for message in messages.iter() {
                let peer = if message.sender_id == user {
                    message.receiver_id
                } else if message.receiver_id == user {
                    message.sender_id
                } else {
                    continue;
                };
                // 后写入的覆盖先写入的：保留每个对端最新一条
                latest.insert(peer, message.clone());
            }
            Ok(latest.into_iter().collect())
        }
    }

    #[derive(Default)]
    pub struct MemoryRoomRepository {
        rooms: RwLock<Vec<Room>>,
    }

    impl MemoryRoomRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl RoomRepository for MemoryRoomRepository {
        async fn create_or_get(&self, room: Room) -> Result<Room, RepositoryError> {
            let mut rooms = self.rooms.write().await;
            if let Some(existing) = rooms.iter().find(|r| {
                r.employer_id == room.employer_id && r.freelancer_id == room.freelancer_id
            }) {
                return Ok(existing.clone());
            }
            rooms.push(room.clone());
            Ok(room)
        }

        async fn list_for_freelancer(
            &self,
            freelancer_id: UserId,
        ) -> Result<Vec<Room>, RepositoryError> {
            let rooms = self.rooms.read().await;
            Ok(rooms
                .iter()
                .filter(|r| r.freelancer_id == freelancer_id)
                .cloned()
                .collect())
        }
    }
}
