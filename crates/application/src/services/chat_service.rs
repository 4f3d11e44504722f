//! 消息分发管道与阅读回执协调。
//!
//! 发送路径：校验参与者 → 按幂等键持久化 → 递增未读计数 →
//! 推送给发送方和接收方的全部连接。持久化失败时整条发送中止，
//! 不产生任何扇出；扇出的局部失败只影响实时时延，消息仍可从
//! 历史查询取回。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domain::{DirectMessage, DomainError, FileAttachment, MessageId, RepositoryError, UserId};
use uuid::Uuid;

use crate::clock::Clock;
use crate::dto::{ConversationSummaryDto, MessageDto, UnreadSnapshot};
use crate::error::{ApplicationError, ApplicationResult};
use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;
use crate::repository::{InsertOutcome, MessageRepository, ParticipantRepository};
use crate::unread::UnreadCounts;

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    /// 客户端生成的幂等键
    pub message_id: String,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: String,
    pub attachment: Option<FileAttachment>,
}

pub struct ChatServiceDependencies {
    pub participants: Arc<dyn ParticipantRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub registry: Arc<ConnectionRegistry>,
    pub unread: Arc<UnreadCounts>,
    pub clock: Arc<dyn Clock>,
    /// 持久化与账号查询的超时上限
    pub operation_timeout: Duration,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 带超时地执行仓储调用。网络内推送从不等待，只有外部
    /// 协作者的调用需要超时保护。
    async fn with_timeout<T>(
        &self,
        label: &'static str,
        fut: impl Future<Output = Result<T, RepositoryError>>,
    ) -> ApplicationResult<T> {
        match tokio::time::timeout(self.deps.operation_timeout, fut).await {
            Ok(result) => result.map_err(ApplicationError::from),
            Err(_) => Err(ApplicationError::Timeout(label)),
        }
    }

    async fn require_participant(&self, id: UserId) -> ApplicationResult<()> {
        self.with_timeout("participant lookup", self.deps.participants.find_by_id(id))
            .await?
            .ok_or(DomainError::ParticipantNotFound)?;
        Ok(())
    }

    /// 发送一条消息。
    ///
    /// 同一幂等键的重试返回库中的规范记录，不会二次入库、
    /// 二次计数或二次推送（至多一次存储语义）。
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> ApplicationResult<DirectMessage> {
        let sender_id = UserId::from(request.sender_id);
        let receiver_id = UserId::from(request.receiver_id);

        self.require_participant(sender_id).await?;
        self.require_participant(receiver_id).await?;

        let message = DirectMessage::new(
            MessageId::parse(request.message_id)?,
            sender_id,
            receiver_id,
            request.text,
            request.attachment,
            self.deps.clock.now(),
        )?;

        let outcome = self
            .with_timeout("message insert", self.deps.messages.insert(message))
            .await?;

        let stored = match outcome {
            InsertOutcome::Inserted(stored) => stored,
            InsertOutcome::Duplicate(stored) => {
                tracing::debug!(
                    message_id = %stored.id,
                    sender_id = %sender_id,
                    "幂等键命中，返回既有记录"
                );
                return Ok(stored);
            }
        };

        // 先计数后推送：接收方连接收到消息时，未读快照已经一致
        self.deps.unread.increment(receiver_id, sender_id).await;

        let event = ServerEvent::ReceiveMessage {
            message: MessageDto::from(&stored),
        };
        let to_receiver = self
            .deps
            .registry
            .send_to_user(receiver_id, event.clone())
            .await;
        let to_sender = self.deps.registry.send_to_user(sender_id, event).await;

        tracing::info!(
            message_id = %stored.id,
            sender_id = %sender_id,
            receiver_id = %receiver_id,
            to_sender,
            to_receiver,
            "消息已持久化并分发"
        );

        Ok(stored)
    }

    /// 阅读回执：reader 已读完 peer 发来的全部消息。
    ///
    /// 原子地翻转持久化的未读行，清零未读计数，并把回执推送给
    /// peer 的全部连接。没有未读消息时是无操作，不算错误。
    pub async fn mark_read(&self, reader: Uuid, peer: Uuid) -> ApplicationResult<u64> {
        let reader_id = UserId::from(reader);
        let peer_id = UserId::from(peer);

        let flipped = self
            .with_timeout("mark read", self.deps.messages.mark_read(reader_id, peer_id))
            .await?;

        if flipped == 0 {
            return Ok(0);
        }

        self.deps.unread.reset(reader_id, peer_id).await;

        // 负载方向与 markAsRead 请求一致：senderId 是消息作者（peer）
        let event = ServerEvent::MessagesRead {
            sender_id: peer,
            receiver_id: reader,
        };
        self.deps.registry.send_to_user(peer_id, event).await;

        tracing::info!(
            reader_id = %reader_id,
            peer_id = %peer_id,
            flipped,
            "阅读回执已处理"
        );
        Ok(flipped)
    }

    /// 两名参与者之间的历史消息，按持久化顺序。
    pub async fn conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> ApplicationResult<Vec<MessageDto>> {
        if user_a == user_b {
            return Err(DomainError::invalid_argument(
                "user_id",
                "cannot fetch a conversation with oneself",
            )
            .into());
        }

        let a = UserId::from(user_a);
        let b = UserId::from(user_b);
        self.require_participant(a).await?;
        self.require_participant(b).await?;

        let messages = self
            .with_timeout("conversation history", self.deps.messages.conversation(a, b))
            .await?;
        Ok(messages.iter().map(MessageDto::from).collect())
    }

    /// 未读计数快照，供客户端初始水合。
    pub async fn unread_snapshot(&self, user: Uuid) -> UnreadSnapshot {
        let counts = self.deps.unread.snapshot(UserId::from(user)).await;
        UnreadSnapshot(
            counts
                .into_iter()
                .map(|(peer, count)| (Uuid::from(peer), count))
                .collect(),
        )
    }

    /// 活跃会话摘要：每个对端的最后一条消息、未读数和展示信息。
    pub async fn active_chats(&self, user: Uuid) -> ApplicationResult<Vec<ConversationSummaryDto>> {
        let user_id = UserId::from(user);
        self.require_participant(user_id).await?;

        let latest = self
            .with_timeout("active chats", self.deps.messages.latest_per_peer(user_id))
            .await?;
        let unread = self.deps.unread.snapshot(user_id).await;

        let mut summaries = Vec::with_capacity(latest.len());
        for (peer_id, last_message) in latest {
            let peer = match self
                .with_timeout("participant lookup", self.deps.participants.find_by_id(peer_id))
                .await?
            {
                Some(peer) => peer,
                None => {
                    // 对端账号已被外部系统移除；跳过而不是让整个列表失败
                    tracing::warn!(peer_id = %peer_id, "会话对端不存在，跳过");
                    continue;
                }
            };

            summaries.push(ConversationSummaryDto {
                peer_id: Uuid::from(peer_id),
                peer_name: peer.username,
                peer_avatar_url: peer.avatar_url,
                last_message: MessageDto::from(&last_message),
                unread_count: unread.get(&peer_id).copied().unwrap_or(0),
            });
        }

        // 最近活跃的会话排在前面
        summaries.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));
        Ok(summaries)
    }

    /// 输入指示：纯扇出，不持久化，丢了也无需恢复。
    pub async fn notify_typing(&self, sender: Uuid, receiver: Uuid) {
        self.deps
            .registry
            .send_to_user(UserId::from(receiver), ServerEvent::Typing { sender_id: sender })
            .await;
    }

    pub async fn notify_stop_typing(&self, sender: Uuid, receiver: Uuid) {
        self.deps
            .registry
            .send_to_user(
                UserId::from(receiver),
                ServerEvent::StopTyping { sender_id: sender },
            )
            .await;
    }
}
